// src/application/error_handling.rs
//
// Outcome and Error Mapping for Hosts
//
// ARCHITECTURE:
// - Maps internal errors -> transport-friendly responses
// - Provides one status vocabulary for every entry point
// - Never exposes storage internals in messages
// - Logs storage errors for debugging

use serde::{Deserialize, Serialize};

use crate::domain::{ImportBatchResult, OrderIngestResult, RecordOutcome, SaveMappingResult};
use crate::error::{AppError, AppResult};

/// Coarse result of an entry-point call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    /// Nothing changed because the input was already processed
    SuccessDuplicate,
    /// Some parts succeeded, some were skipped or failed
    PartialSuccess,
    Failure,
}

/// Outcomes that know how they should be reported.
pub trait HasOperationStatus {
    fn operation_status(&self) -> OperationStatus;
}

impl HasOperationStatus for RecordOutcome {
    fn operation_status(&self) -> OperationStatus {
        match self {
            RecordOutcome::Recorded { .. } => OperationStatus::Success,
            RecordOutcome::SkippedDuplicate { .. } => OperationStatus::SuccessDuplicate,
        }
    }
}

impl HasOperationStatus for OrderIngestResult {
    fn operation_status(&self) -> OperationStatus {
        if self.duplicate_order {
            OperationStatus::SuccessDuplicate
        } else if self.is_partial() {
            OperationStatus::PartialSuccess
        } else if self.recorded.is_empty() && !self.skipped_duplicates.is_empty() {
            OperationStatus::SuccessDuplicate
        } else {
            OperationStatus::Success
        }
    }
}

impl HasOperationStatus for SaveMappingResult {
    fn operation_status(&self) -> OperationStatus {
        if self.skipped.is_empty() {
            OperationStatus::Success
        } else {
            OperationStatus::PartialSuccess
        }
    }
}

impl HasOperationStatus for ImportBatchResult {
    fn operation_status(&self) -> OperationStatus {
        if self.failed_count > 0 {
            OperationStatus::PartialSuccess
        } else if self.processed_count > 0 && self.imported_count == 0 {
            OperationStatus::SuccessDuplicate
        } else {
            OperationStatus::Success
        }
    }
}

/// Status of any entry-point result.
pub fn status_of<T: HasOperationStatus>(result: &AppResult<T>) -> OperationStatus {
    match result {
        Ok(value) => value.operation_status(),
        Err(_) => OperationStatus::Failure,
    }
}

/// Standard error response for hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error_type: ErrorType,
    pub message: String,
    pub details: Option<String>,
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Mapping or catalog miss
    NotFound,

    /// Malformed input
    Validation,

    /// Domain invariant violation
    DomainError,

    /// Database/persistence error
    Database,

    /// Source feed fetch failed or timed out
    Upstream,

    /// Other/unknown error
    Internal,
}

impl ErrorResponse {
    pub fn from_app_error(error: AppError) -> Self {
        match error {
            AppError::NotFound(what) => Self::not_found(&what),

            AppError::Validation(message) => Self::validation(message),

            AppError::Domain(domain_error) => Self {
                success: false,
                error_type: ErrorType::DomainError,
                message: "Domain validation failed".to_string(),
                details: Some(domain_error.to_string()),
            },

            AppError::Database(db_error) => {
                log::error!("Database error: {:?}", db_error);
                Self::storage("Database operation failed")
            }

            AppError::Pool(pool_error) => {
                log::error!("Connection pool error: {}", pool_error);
                Self::storage("Database connection failed")
            }

            AppError::Serialization(serde_error) => {
                log::error!("Serialization error: {:?}", serde_error);
                Self {
                    success: false,
                    error_type: ErrorType::Internal,
                    message: "Data serialization failed".to_string(),
                    details: None,
                }
            }

            AppError::Io(io_error) => {
                log::error!("IO error: {:?}", io_error);
                Self::storage("Storage file operation failed")
            }

            AppError::UpstreamFetch {
                source_name,
                message,
            } => Self {
                success: false,
                error_type: ErrorType::Upstream,
                message: format!("Fetching from {} failed", source_name),
                details: Some(message),
            },

            AppError::Other(message) => {
                log::error!("Other error: {}", message);
                Self {
                    success: false,
                    error_type: ErrorType::Internal,
                    message,
                    details: None,
                }
            }
        }
    }

    pub fn validation(message: String) -> Self {
        Self {
            success: false,
            error_type: ErrorType::Validation,
            message,
            details: None,
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self {
            success: false,
            error_type: ErrorType::NotFound,
            message: format!("{} not found", resource),
            details: None,
        }
    }

    fn storage(message: &str) -> Self {
        Self {
            success: false,
            error_type: ErrorType::Database,
            message: message.to_string(),
            details: Some("Check logs for details".to_string()),
        }
    }
}

/// Helper trait to convert Results to serialized ErrorResponse
pub trait ToErrorResponse<T> {
    fn to_error_response(self) -> Result<T, String>;
}

impl<T> ToErrorResponse<T> for Result<T, AppError> {
    fn to_error_response(self) -> Result<T, String> {
        self.map_err(|e| {
            let error_response = ErrorResponse::from_app_error(e);
            serde_json::to_string(&error_response).unwrap_or_else(|_| "Internal error".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainError, LineFailure, ProductId};
    use chrono::NaiveDate;

    #[test]
    fn test_not_found_error() {
        let error = ErrorResponse::from_app_error(AppError::not_found("catalog product 7"));
        assert_eq!(error.error_type, ErrorType::NotFound);
        assert_eq!(error.message, "catalog product 7 not found");
    }

    #[test]
    fn test_validation_error() {
        let error = ErrorResponse::validation("Invalid input".to_string());
        assert_eq!(error.error_type, ErrorType::Validation);
        assert!(!error.success);
    }

    #[test]
    fn test_domain_error_keeps_details() {
        let error = ErrorResponse::from_app_error(AppError::Domain(DomainError::InvalidTime(
            "8pm".to_string(),
        )));
        assert_eq!(error.error_type, ErrorType::DomainError);
        assert!(error.details.unwrap().contains("8pm"));
    }

    #[test]
    fn test_storage_errors_hide_internals() {
        let error = ErrorResponse::from_app_error(AppError::Pool("timed out".to_string()));
        assert_eq!(error.error_type, ErrorType::Database);
        assert!(!error.message.contains("timed out"));
    }

    #[test]
    fn test_upstream_error() {
        let error = ErrorResponse::from_app_error(AppError::upstream("ticketing", "HTTP 503"));
        assert_eq!(error.error_type, ErrorType::Upstream);
        assert_eq!(error.details.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_record_outcome_status() {
        let recorded: AppResult<RecordOutcome> = Ok(RecordOutcome::Recorded {
            sale_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            product_key: "101".to_string(),
            quantity: 1,
        });
        assert_eq!(status_of(&recorded), OperationStatus::Success);

        let duplicate: AppResult<RecordOutcome> = Ok(RecordOutcome::SkippedDuplicate {
            dedup_key: "sale:pos:R-1:101".to_string(),
        });
        assert_eq!(status_of(&duplicate), OperationStatus::SuccessDuplicate);

        let failed: AppResult<RecordOutcome> = Err(AppError::not_found("product 9"));
        assert_eq!(status_of(&failed), OperationStatus::Failure);
    }

    #[test]
    fn test_order_status() {
        let partial = OrderIngestResult {
            order_id: "5001".to_string(),
            errors: vec![LineFailure {
                product_id: ProductId::from("102"),
                message: "pool".to_string(),
            }],
            ..OrderIngestResult::default()
        };
        assert_eq!(partial.operation_status(), OperationStatus::PartialSuccess);

        let duplicate = OrderIngestResult {
            duplicate_order: true,
            ..OrderIngestResult::default()
        };
        assert_eq!(duplicate.operation_status(), OperationStatus::SuccessDuplicate);
    }

    #[test]
    fn test_to_error_response_serializes() {
        let result: AppResult<()> = Err(AppError::validation("bad range"));
        let json = result.to_error_response().unwrap_err();
        assert!(json.contains("\"error_type\":\"validation\""));
    }
}
