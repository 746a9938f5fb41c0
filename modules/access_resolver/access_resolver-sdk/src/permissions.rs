//! Permission vocabulary.
//!
//! Every permission string the engine can grant lives here as a compile-time
//! constant, grouped by the resource type it applies to. Named sets bundle the
//! grants that always travel together (e.g. reviewing a submission needs both
//! the record and its files).

use serde::{Deserialize, Serialize};

/// Resource types that carry their own permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Form,
    Submission,
}

/// Form-level permissions.
pub mod form {
    pub const VIEW: &str = "form.view";
    pub const DESIGN: &str = "form.design";
}

/// Submission-level permissions.
pub mod submission {
    pub const CREATE: &str = "submission.create";
    pub const VIEW: &str = "submission.view";
    pub const EDIT: &str = "submission.edit";
    pub const FILE_UPLOAD: &str = "submission.file.upload";
    pub const FILE_DELETE: &str = "submission.file.delete";
    pub const FILE_VIEW: &str = "submission.file.view";
    pub const EXPORT: &str = "submission.export";
}

/// RBAC permission names reported by the identity collaborator.
///
/// These are not grants produced by the engine; they are inputs it checks.
pub mod rbac {
    pub const FORMS_VIEW: &str = "forms.view";
}

/// Role names that mark an identity as an administrator.
pub mod roles {
    pub const ADMIN: &str = "Admin";
    pub const PLATFORM_ADMIN: &str = "PlatformAdmin";
}

const ALL_FORM: &[&str] = &[form::VIEW, form::DESIGN];

const ALL_SUBMISSION: &[&str] = &[
    submission::CREATE,
    submission::VIEW,
    submission::EDIT,
    submission::FILE_UPLOAD,
    submission::FILE_DELETE,
    submission::FILE_VIEW,
    submission::EXPORT,
];

/// Read a submission and its attached files.
pub const REVIEW_SUBMISSION_SET: &[&str] = &[submission::VIEW, submission::FILE_VIEW];

/// Modify a submission and manage its files.
pub const EDIT_SUBMISSION_SET: &[&str] = &[
    submission::VIEW,
    submission::EDIT,
    submission::FILE_UPLOAD,
    submission::FILE_DELETE,
];

/// Start a new submission (including uploading files into it).
pub const CREATE_SUBMISSION_SET: &[&str] = &[submission::CREATE, submission::FILE_UPLOAD];

/// Export submission data.
pub const EXPORT_SUBMISSION_SET: &[&str] = &[submission::EXPORT];

/// Every permission defined for `resource_type`.
///
/// Used by the admin bypass, which grants the whole catalog.
#[must_use]
pub fn all_permissions_for_resource_type(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Form => ALL_FORM,
        ResourceType::Submission => ALL_SUBMISSION,
    }
}

/// Whether `permission` belongs to the catalog of `resource_type`.
#[must_use]
pub fn is_known(resource_type: ResourceType, permission: &str) -> bool {
    all_permissions_for_resource_type(resource_type).contains(&permission)
}

/// Map a short permission name embedded in a signed access token to the
/// submission permissions it grants.
///
/// Returns `None` for names the engine does not recognise.
#[must_use]
pub fn submission_set_for_claim(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "view" => Some(REVIEW_SUBMISSION_SET),
        "edit" => Some(EDIT_SUBMISSION_SET),
        "export" => Some(EXPORT_SUBMISSION_SET),
        _ => None,
    }
}
