use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// One problem with one request field, shaped like the `detail` entries
/// clients of the service already parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    pub fn body(field: Option<&str>, kind: &'static str, msg: impl Into<String>) -> Self {
        let mut loc = vec!["body".to_string()];
        loc.extend(field.map(str::to_string));
        Self {
            loc,
            msg: msg.into(),
            kind,
        }
    }
}

const USERNAME_TAKEN: &str = "Username already registered";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {} error(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("{}", USERNAME_TAKEN)]
    UsernameTaken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody<T: Serialize> {
    detail: T,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UsernameTaken => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                (status, Json(ErrorBody { detail: errors })).into_response()
            }
            ApiError::UsernameTaken => (
                status,
                Json(ErrorBody {
                    detail: USERNAME_TAKEN,
                }),
            )
                .into_response(),
            ApiError::Database(e) => {
                // A duplicate that slipped past the pre-check lands here.
                if is_unique_violation(&e) {
                    warn!(error = %e, "unique constraint violated after pre-check");
                } else {
                    error!(error = %e, "database error");
                }
                (
                    status,
                    Json(ErrorBody {
                        detail: "Internal Server Error",
                    }),
                )
                    .into_response()
            }
        }
    }
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn username_taken_is_400_with_fixed_detail() {
        let response = ApiError::UsernameTaken.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Username already registered");
    }

    #[tokio::test]
    async fn validation_is_422_with_field_list() {
        let response = ApiError::Validation(vec![FieldError::body(
            Some("password"),
            "string_too_short",
            "String should have at least 6 characters",
        )])
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["loc"], serde_json::json!(["body", "password"]));
        assert_eq!(body["detail"][0]["type"], "string_too_short");
    }

    #[tokio::test]
    async fn database_error_hides_cause() {
        let response = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal Server Error");
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
