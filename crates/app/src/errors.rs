use thiserror::Error;

use storefront_core::DomainError;
use storefront_infra::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure of a use case: either a business rule said no, or the store failed.
///
/// The two never mix: a store failure is not reinterpreted as a business
/// error, and business errors are reported as-is without retrying.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.domain().is_some_and(DomainError::is_not_found)
    }

    /// Worth retrying the whole request (lost a write race or store unreachable).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Store(StoreError::Conflict(_) | StoreError::Unavailable(_))
        )
    }
}
