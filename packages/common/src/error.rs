use thiserror::Error;

/// Error kinds shared by every sitekit component.
///
/// Resolution and composition paths degrade to safe defaults instead of
/// returning these; mutation paths always hand them back to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {reason}")]
    Conflict {
        reason: String,
        /// Version currently stored, when the conflict is a version race
        current_version: Option<u64>,
    },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Feature not included in plan: {feature}")]
    NotEntitled { feature: String },

    #[error("Timed out: {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SiteResult<T> = Result<T, SiteError>;

impl SiteError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SiteError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        SiteError::Conflict {
            reason: reason.into(),
            current_version: None,
        }
    }

    pub fn version_conflict(expected: u64, current: u64) -> Self {
        SiteError::Conflict {
            reason: format!("draft is at version {current}, mutation was based on {expected}"),
            current_version: Some(current),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SiteError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        SiteError::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name, used in API payloads and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SiteError::NotFound { .. } => "not_found",
            SiteError::Conflict { .. } => "conflict",
            SiteError::Validation { .. } => "validation",
            SiteError::Unauthorized { .. } => "unauthorized",
            SiteError::NotEntitled { .. } => "not_entitled",
            SiteError::Timeout { .. } => "timeout",
            SiteError::Internal(_) => "internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SiteError::Conflict { .. })
    }
}

impl From<String> for SiteError {
    fn from(s: String) -> Self {
        SiteError::Internal(s)
    }
}

impl From<&str> for SiteError {
    fn from(s: &str) -> Self {
        SiteError::Internal(s.to_string())
    }
}
