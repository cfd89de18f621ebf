use tracing::{debug, info, warn};

use crate::{
    db::Session,
    error::{ApiError, ApiResult, FieldError},
    users::{
        dto::CreateUserRequest,
        repo_types::{NewUser, User},
    },
};

pub const USERNAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const PASSWORD_MAX_CHARS: usize = 128;

/// Checks the shape of a create request. Every failing field is reported,
/// not just the first. Lengths count characters, not bytes.
pub fn validate_create(req: CreateUserRequest) -> Result<NewUser, Vec<FieldError>> {
    let mut errors = Vec::new();

    let username = match req.username {
        None => {
            errors.push(missing("username"));
            None
        }
        Some(u) if u.chars().count() > USERNAME_MAX_CHARS => {
            errors.push(too_long("username", USERNAME_MAX_CHARS));
            None
        }
        Some(u) => Some(u),
    };

    let password = match req.password {
        None => {
            errors.push(missing("password"));
            None
        }
        Some(p) => {
            let len = p.chars().count();
            if len < PASSWORD_MIN_CHARS {
                errors.push(FieldError::body(
                    Some("password"),
                    "string_too_short",
                    format!("String should have at least {PASSWORD_MIN_CHARS} characters"),
                ));
                None
            } else if len > PASSWORD_MAX_CHARS {
                errors.push(too_long("password", PASSWORD_MAX_CHARS));
                None
            } else {
                Some(p)
            }
        }
    };

    match (username, password) {
        (Some(username), Some(password)) => Ok(NewUser { username, password }),
        _ => Err(errors),
    }
}

fn missing(field: &str) -> FieldError {
    FieldError::body(Some(field), "missing", "Field required")
}

fn too_long(field: &str, max: usize) -> FieldError {
    FieldError::body(
        Some(field),
        "string_too_long",
        format!("String should have at most {max} characters"),
    )
}

/// Registers a user unless the username is already taken.
///
/// The lookup and the insert are not atomic: a concurrent request can pass
/// the same check, in which case the database constraint rejects the second
/// insert and the error propagates as [`ApiError::Database`].
pub async fn register_user(session: &mut Session, new_user: &NewUser) -> ApiResult<User> {
    if User::find_by_username(session, &new_user.username)
        .await?
        .is_some()
    {
        warn!(username = %new_user.username, "username already registered");
        return Err(ApiError::UsernameTaken);
    }

    let user = User::create(session, new_user).await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn list_users(session: &mut Session) -> ApiResult<Vec<User>> {
    let users = User::list(session).await?;
    debug!(count = users.len(), "users listed");
    Ok(users)
}
