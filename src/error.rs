use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of validation detail attached to a 400 response:
/// which field failed, why, and the value that was rejected.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(rename = "rejectedValue", skip_serializing_if = "Option::is_none")]
    pub rejected_value: Option<serde_json::Value>,
}

/// Error envelope sent to clients.
///
/// Every error response, including the 404 fallback and uncaught failures,
/// renders as this JSON shape; stack traces and driver errors never leak.
///
/// ```json
/// {
///   "success": false,
///   "message": "Validation errors",
///   "errors": [{ "field": "rating", "message": "...", "rejectedValue": 9 }]
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed wording for errors that are not tied to a single resource.
/// Resource-specific messages ("Movie not found", ...) live at the call
/// sites; these cover the auth/infra cases shared across handlers.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password handling
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,

    // Authorization
    PermissionDenied,
    AdminRequired,

    // User management
    UserNoLongerExist,

    // Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "Access denied. You can only access your own resources".to_string()
            }
            ErrorMessage::AdminRequired => {
                "Access denied. Admin privileges required".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application.
///
/// Handlers return `Result<T, HttpError>`; axum converts the error into a
/// JSON response via `IntoResponse`. Validation failures carry their
/// per-field detail, everything else is status + message.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub errors: Option<Vec<FieldError>>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: None,
        }
    }

    /// 500 Internal Server Error. Use for unexpected persistence or logic
    /// failures; the real cause goes to tracing, not to the client.
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 Bad Request without field detail.
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    /// 400 Bad Request carrying a per-field error list.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        HttpError {
            message: "Validation errors".to_string(),
            status: StatusCode::BAD_REQUEST,
            errors: Some(errors),
        }
    }

    /// 409 Conflict. Use for unique-field violations (email, username,
    /// one review per user per movie, one watchlist entry per user per movie).
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::CONFLICT)
    }

    /// 401 Unauthorized: missing, malformed, or expired credential.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403 Forbidden: valid identity lacking permission.
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    /// 404 Not Found: unknown or soft-deleted entity.
    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            success: false,
            message: self.message.clone(),
            errors: self.errors,
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Translate a `validator` failure into the per-field envelope.
impl From<validator::ValidationErrors> for HttpError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = Vec::new();
        for (field, entries) in errors.field_errors() {
            for entry in entries {
                field_errors.push(FieldError {
                    field: field.to_string(),
                    message: entry
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {}", field)),
                    rejected_value: entry.params.get("value").cloned(),
                });
            }
        }
        field_errors.sort_by(|a, b| a.field.cmp(&b.field));
        HttpError::validation(field_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
        username: String,
        #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
        rating: i32,
    }

    #[test]
    fn validation_failure_becomes_field_error_list() {
        let probe = Probe {
            username: "ab".to_string(),
            rating: 9,
        };
        let err: HttpError = probe.validate().unwrap_err().into();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let errors = err.errors.expect("field detail");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "rating");
        assert_eq!(errors[0].message, "Rating must be between 1 and 5");
        assert_eq!(errors[1].field, "username");
    }

    #[test]
    fn error_response_hides_empty_error_list() {
        let rendered = serde_json::to_string(&ErrorResponse {
            success: false,
            message: "Movie not found".to_string(),
            errors: None,
        })
        .unwrap();
        assert_eq!(rendered, r#"{"success":false,"message":"Movie not found"}"#);
    }

    #[test]
    fn constructors_pick_expected_status() {
        assert_eq!(HttpError::bad_request("x").status, StatusCode::BAD_REQUEST);
        assert_eq!(HttpError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(HttpError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(HttpError::not_found("x").status, StatusCode::NOT_FOUND);
        assert_eq!(
            HttpError::unique_constraint_violation("x").status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            HttpError::server_error("x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
