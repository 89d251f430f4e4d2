use thiserror::Error;

use crate::decimal::Money;
use crate::types::{MonthId, StudentId};

#[derive(Error, Debug)]
pub enum FeeError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("no unpaid months selected")]
    EmptySelection,

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("month {month_id} is not billable for student {student_id}")]
    MonthNotBillable {
        student_id: StudentId,
        month_id: MonthId,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("months already paid for student {student_id}: {month_ids:?}")]
    AlreadyPaid {
        student_id: StudentId,
        month_ids: Vec<MonthId>,
    },

    #[error("invoice number already issued: {invoice_number}")]
    DuplicateInvoice {
        invoice_number: String,
    },

    #[error("could not issue a unique invoice number after {attempts} attempts")]
    InvoiceSequenceExhausted {
        attempts: u32,
    },

    #[error("catalog integrity violated: {message}")]
    CatalogIntegrity {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

/// coarse classification used by transports to pick a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl FeeError {
    pub fn validation(message: impl Into<String>) -> Self {
        FeeError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FeeError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        FeeError::Storage {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FeeError::Validation { .. }
            | FeeError::EmptySelection
            | FeeError::InvalidPaymentAmount { .. }
            | FeeError::MonthNotBillable { .. }
            | FeeError::CatalogIntegrity { .. }
            | FeeError::InvalidConfiguration { .. } => ErrorKind::Validation,
            FeeError::NotFound { .. } => ErrorKind::NotFound,
            FeeError::AlreadyPaid { .. } | FeeError::DuplicateInvoice { .. } => ErrorKind::Conflict,
            FeeError::InvoiceSequenceExhausted { .. } | FeeError::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// http-equivalent status for the error
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage => 500,
        }
    }

    /// conflicts a caller can resolve by refreshing state and resubmitting
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<rusqlite::Error> for FeeError {
    fn from(err: rusqlite::Error) -> Self {
        FeeError::storage(err.to_string())
    }
}

impl From<serde_json::Error> for FeeError {
    fn from(err: serde_json::Error) -> Self {
        FeeError::storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FeeError::EmptySelection.status_code(), 400);
        assert_eq!(FeeError::not_found("payment", Uuid::nil()).status_code(), 404);
        assert_eq!(FeeError::storage("disk full").status_code(), 500);

        let conflict = FeeError::AlreadyPaid {
            student_id: Uuid::nil(),
            month_ids: vec![Uuid::nil()],
        };
        assert_eq!(conflict.status_code(), 409);
        assert!(conflict.is_retryable());
        assert!(!FeeError::EmptySelection.is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = FeeError::not_found("student", "S-1");
        assert_eq!(err.to_string(), "student not found: S-1");

        let err = FeeError::InvalidPaymentAmount { amount: Money::ZERO };
        assert_eq!(err.to_string(), "invalid payment amount: 0");
    }
}
