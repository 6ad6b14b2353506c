use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use validator::ValidationErrors;

use crate::database::StoreError;
use crate::models::ApiResponse;

/// Outcome taxonomy shared by the workflow engine and the HTTP layer.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{message}")]
    InvalidInput { field: String, message: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DirectoryError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InUse(entity) => Self::Conflict(format!(
                "Cannot delete {entity} as it is being used by businesses"
            )),
            StoreError::Duplicate(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::MissingReference(field) => {
                Self::invalid(field, format!("{field} does not reference an existing record"))
            }
            StoreError::Database(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for DirectoryError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.first() {
            Some((field, details)) => {
                let message = details
                    .iter()
                    .find_map(|d| d.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Validation failed: {field} is missing or invalid"));
                Self::invalid(field.to_string(), message)
            }
            None => Self::invalid("body", format!("Validation failed: {errors}")),
        }
    }
}

impl ResponseError for DirectoryError {
    fn status_code(&self) -> StatusCode {
        match self {
            DirectoryError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            DirectoryError::Forbidden(_) => StatusCode::FORBIDDEN,
            DirectoryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DirectoryError::Conflict(_) => StatusCode::CONFLICT,
            DirectoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            DirectoryError::Internal(detail) => {
                log::error!("Request failed: {detail}");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(message))
    }
}
