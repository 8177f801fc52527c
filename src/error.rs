//! Typed failures raised by the domain services.
//!
//! Every service returns [`ServiceResult`]; the HTTP layer is the only place
//! that turns a [`DomainError`] into a status code and an error envelope.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed id, missing or invalid field, length limit.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated but not the owner. Only tweets report this.
    #[error("{0}")]
    Forbidden(String),

    /// Absent entity, or an ownership failure masked as absence.
    #[error("{0}")]
    NotFound(String),

    /// Store or collaborator failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("Unauthorized".to_string())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthenticated(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }
}

impl From<libsql::Error> for DomainError {
    fn from(err: libsql::Error) -> Self {
        Self::Internal(err.into())
    }
}

pub type ServiceResult<T> = Result<T, DomainError>;
