use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use crate::services::{AuthError, QrError};

/// Wire shape of every error response: a human-readable message plus a
/// stable machine code clients can branch on.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },

    Unauthorized { code: &'static str, message: String },

    Forbidden { code: &'static str, message: String },

    NotFound { code: &'static str, message: String },

    Conflict { code: &'static str, message: String },

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest { code, message }
            | ApiError::Unauthorized { code, message }
            | ApiError::Forbidden { code, message }
            | ApiError::NotFound { code, message }
            | ApiError::Conflict { code, message } => write!(f, "{}: {}", code, message),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Unauthorized { code, message } => (StatusCode::UNAUTHORIZED, code, message),
            ApiError::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            ApiError::DatabaseError(detail) => {
                tracing::error!("Database error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            ApiError::InternalError(detail) => {
                tracing::error!("Internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message, code })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::MissingCredentials => Self::BadRequest {
                code: "MISSING_CREDENTIALS",
                message,
            },
            AuthError::InvalidCredentials => Self::Unauthorized {
                code: "INVALID_CREDENTIALS",
                message,
            },
            AuthError::InvalidCurrentPassword => Self::Unauthorized {
                code: "INVALID_PASSWORD",
                message,
            },
            AuthError::WeakPassword(_) => Self::BadRequest {
                code: "WEAK_PASSWORD",
                message,
            },
            AuthError::PasswordReused => Self::BadRequest {
                code: "PASSWORD_REUSED",
                message,
            },
            AuthError::NoRefreshToken => Self::Unauthorized {
                code: "NO_REFRESH_TOKEN",
                message,
            },
            AuthError::InvalidRefreshToken => Self::Forbidden {
                code: "INVALID_REFRESH_TOKEN",
                message,
            },
            AuthError::RefreshTokenExpired => Self::Forbidden {
                code: "REFRESH_TOKEN_EXPIRED",
                message,
            },
            AuthError::NoToken => Self::Unauthorized {
                code: "NO_TOKEN",
                message,
            },
            AuthError::TokenExpired => Self::Unauthorized {
                code: "TOKEN_EXPIRED",
                message,
            },
            AuthError::InvalidToken => Self::Unauthorized {
                code: "INVALID_TOKEN",
                message,
            },
            AuthError::TokenVerification(_) => Self::Unauthorized {
                code: "TOKEN_ERROR",
                message,
            },
            // Handler context: a user looked up by id is simply missing.
            // The auth gate maps this variant to 401 itself.
            AuthError::UserNotFound => Self::NotFound {
                code: "USER_NOT_FOUND",
                message,
            },
            AuthError::NoUpdates => Self::BadRequest {
                code: "NO_UPDATES",
                message,
            },
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<QrError> for ApiError {
    fn from(err: QrError) -> Self {
        let message = err.to_string();
        match err {
            QrError::DeviceNotFound => Self::NotFound {
                code: "DEVICE_NOT_FOUND",
                message,
            },
            // Unknown token and expired token get different statuses:
            // 404 reveals nothing, 403 tells the holder to get a new code.
            QrError::InvalidToken => Self::NotFound {
                code: "INVALID_QR_TOKEN",
                message,
            },
            QrError::TokenExpired => Self::Forbidden {
                code: "TOKEN_EXPIRED",
                message,
            },
            QrError::TokenNotFound => Self::NotFound {
                code: "TOKEN_NOT_FOUND",
                message,
            },
            QrError::Forbidden => Self::Forbidden {
                code: "FORBIDDEN",
                message,
            },
            QrError::Database(msg) => Self::DatabaseError(msg),
            QrError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn device_not_found() -> Self {
        ApiError::NotFound {
            code: "DEVICE_NOT_FOUND",
            message: "Device not found".to_string(),
        }
    }

    pub fn checklist_not_found() -> Self {
        ApiError::NotFound {
            code: "CHECKLIST_NOT_FOUND",
            message: "Checklist not found".to_string(),
        }
    }

    pub fn pm_log_not_found() -> Self {
        ApiError::NotFound {
            code: "PM_LOG_NOT_FOUND",
            message: "PM log not found".to_string(),
        }
    }

    pub fn task_not_found() -> Self {
        ApiError::NotFound {
            code: "TASK_NOT_FOUND",
            message: "Task not found".to_string(),
        }
    }

    pub fn user_not_found() -> Self {
        ApiError::NotFound {
            code: "USER_NOT_FOUND",
            message: "User not found".to_string(),
        }
    }

    pub fn missing_fields(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "MISSING_FIELDS",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::InternalError(message.into())
    }
}
