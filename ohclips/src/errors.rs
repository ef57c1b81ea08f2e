use std::borrow::Cow;

use thiserror::Error;

/// Errors returned by the document store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The addressed document does not exist.
    #[error("document not found")]
    NotFound { document: Option<String> },

    /// The caller tried to remove a document owned by someone else.
    #[error("document '{document}' is owned by another user")]
    NotOwner { document: String },

    /// A uniquely keyed value is already claimed by another document.
    #[error("unique constraint violation: {field} '{value}' already exists")]
    UniqueConstraintViolation { field: String, value: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

/// Collection of validation issues found in a request payload.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human readable summary, one message per issue.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Failure of an engagement, feed, upload or catalog operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required field is missing from the request.
    #[error("{0}")]
    BadRequest(Cow<'static, str>),

    /// The caller has no usable identity or does not own the resource.
    #[error("Not authorized.")]
    Unauthorized,

    #[error("{0}")]
    NotFound(Cow<'static, str>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Store failure. Never shown to callers verbatim.
    #[error(transparent)]
    Store(StoreError),

    /// A third-party platform (video host, game catalog) failed.
    #[error("upstream failure: {0}")]
    Upstream(Cow<'static, str>),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ServiceError::NotFound(Cow::Borrowed("Not found.")),
            StoreError::NotOwner { .. } => ServiceError::Unauthorized,
            StoreError::UniqueConstraintViolation { field, .. } => {
                ServiceError::BadRequest(Cow::Owned(format!("{} already in use", capitalize(&field))))
            }
            other => ServiceError::Store(other),
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
