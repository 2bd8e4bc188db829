use crate::{
    AppState,
    db::UserExt,
    dtos::{
        AppJson, AuthData, AuthResponseDto, AuthUserDto, LoginUserDto, ProfileData, ProfileDto,
        ProfileResponseDto, RegisterUserDto, TokenData, TokenResponseDto, UpdatePasswordDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    utils::{password, token},
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum::middleware as axum_middleware;
use tracing::instrument;
use validator::Validate;

/// Router for identity lifecycle endpoints.
pub fn auth_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/me",
            get(me).route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth,
            )),
        )
        .route(
            "/password",
            put(update_password).route_layer(axum_middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Register a new account: validate, reject duplicate email/username,
/// hash the password, and hand back a signed bearer token.
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    AppJson(body): AppJson<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::from(e)
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(&body.username, &body.email, &hash_password)
        .await;

    let user = match result {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique violation: {}", db_err);
            let message = match db_err.constraint() {
                Some("users_username_key") => "Username is already taken",
                _ => "An account with this email already exists",
            };
            return Err(HttpError::unique_constraint_violation(message));
        }
        Err(e) => {
            tracing::error!("DB error, saving user: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!(username = %user.username, "Register successful");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponseDto {
            success: true,
            message: "User registered successfully".to_string(),
            data: AuthData {
                token,
                user: AuthUserDto {
                    id: user.id.to_string(),
                    name: user.username,
                    email: user.email,
                },
            },
        }),
    ))
}

/// Login with email + password. Unknown email and wrong password produce
/// the same 401 so the two cases cannot be told apart.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn login(
    State(app_state): State<AppState>,
    AppJson(body): AppJson<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::from(e)
    })?;

    let result = app_state
        .db_client
        .get_user(None, None, Some(&body.email))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user = result.ok_or_else(|| {
        tracing::error!("Login failed: email not found");
        HttpError::unauthorized("Invalid email or password")
    })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::error!("Password error: {}", e);
        HttpError::unauthorized("Invalid email or password")
    })?;

    if !password_matched {
        tracing::error!(user_id = %user.id, "Login failed: password mismatch");
        return Err(HttpError::unauthorized("Invalid email or password"));
    }

    let token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!(user_id = %user.id, "Login successful");
    Ok(Json(AuthResponseDto {
        success: true,
        message: "Login successful".to_string(),
        data: AuthData {
            token,
            user: AuthUserDto {
                id: user.id.to_string(),
                name: user.username,
                email: user.email,
            },
        },
    }))
}

/// Full profile of the bearer.
#[instrument(skip(jwt), fields(username = %jwt.user.username))]
pub async fn me(
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ProfileResponseDto {
        success: true,
        message: None,
        data: ProfileData {
            user: ProfileDto::from_user(&jwt.user),
        },
    }))
}

/// Change password: verify the current one, store the new hash, and issue
/// a fresh token.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_password(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<UpdatePasswordDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_password input: {}", e);
        HttpError::from(e)
    })?;

    let password_matched =
        password::compare(&body.current_password, &jwt.user.password).map_err(|e| {
            tracing::error!("Password error: {}", e);
            HttpError::bad_request("Current password is incorrect")
        })?;

    if !password_matched {
        return Err(HttpError::bad_request("Current password is incorrect"));
    }

    let hash_password = password::hash(&body.new_password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .update_user_password(jwt.user.id, hash_password)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating user password: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let token = token::create_token(
        &jwt.user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!(user_id = %jwt.user.id, "Password updated successfully");
    Ok(Json(TokenResponseDto {
        success: true,
        message: "Password updated successfully".to_string(),
        data: TokenData { token },
    }))
}
