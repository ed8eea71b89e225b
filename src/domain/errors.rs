use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Cannot {operation} while chat is {current}")]
    InvalidState { operation: String, current: String },
    #[error("No eligible commercials: {0}")]
    NoEligibleCommercials(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Delivery to {recipient} failed: {reason}")]
    DeliveryFailed { recipient: String, reason: String },
    #[error("No receivers connected for chat {chat_id}")]
    NoReceivers { chat_id: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_state(operation: &str, current: impl ToString) -> Self {
        DomainError::InvalidState {
            operation: operation.to_string(),
            current: current.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
