use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    db::Session,
    error::{ApiError, ApiResult, FieldError},
    state::AppState,
    users::{
        dto::{CreateUserRequest, PublicUser},
        services::{list_users as list_all, register_user, validate_create},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", post(create_user).get(list_users))
}

#[instrument(skip(session, payload))]
pub async fn create_user(
    mut session: Session,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "unreadable request body");
        ApiError::Validation(vec![rejection_error(&rejection)])
    })?;

    let new_user = validate_create(payload).map_err(|errors| {
        warn!(errors = errors.len(), "invalid create user request");
        ApiError::Validation(errors)
    })?;

    let user = register_user(&mut session, &new_user).await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

#[instrument(skip(session))]
pub async fn list_users(mut session: Session) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = list_all(&mut session).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

fn rejection_error(rejection: &JsonRejection) -> FieldError {
    let kind = match rejection {
        JsonRejection::JsonSyntaxError(_) => "json_invalid",
        JsonRejection::JsonDataError(_) => "model_attributes_type",
        JsonRejection::MissingJsonContentType(_) => "content_type",
        _ => "body_unreadable",
    };
    FieldError::body(None, kind, rejection.body_text())
}
