use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse, Responder};
use log::info;

use super::login_models::{
    LoginRequest, LoginResponse, LogoutResponse, MeResponse, RegisterRequest, RegisterResponse,
};
use crate::routes::bearer::{authenticate, bearer_token, SESSION_COOKIE};
use crate::routes::error::ApiError;
use crate::state::AppState;

pub async fn health() -> impl Responder {
    info!("Received request on /health endpoint");
    HttpResponse::Ok().body("Task tracker is up.")
}

// register user to store
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    info!("Received request to register user: {}", req.username);
    state.auth.register(&req.username, &req.password).await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        success: true,
        message: "User registered successfully".into(),
    }))
}

// login logic, the token comes back in the body and as a cookie
pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    info!("Received login request for user: {}", req.username);
    let grant = state
        .auth
        .login(&req.username, &req.password, req.remember_me)
        .await?;

    Ok(HttpResponse::Created()
        .cookie(
            Cookie::build(SESSION_COOKIE, grant.token.clone())
                .path("/")
                .http_only(true)
                .finish(),
        )
        .json(LoginResponse {
            success: true,
            message: format!("Welcome, {}", grant.identity.username),
            token: grant.token,
        }))
}

// auto-login: resolve the presented token to its user
pub async fn me(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;

    info!("Auto login successful for user: {}", identity.username);
    Ok(HttpResponse::Ok().json(MeResponse {
        success: true,
        message: format!("Welcome back, {}", identity.username),
        user_id: identity.user_id,
        username: identity.username,
    }))
}

pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let Some(token) = bearer_token(&req) else {
        info!("Session token does not exist for logout");
        return Err(ApiError::Unauthenticated("Session ID does not exist".into()));
    };
    state.auth.logout(&token).await?;

    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();

    info!("Session removed");
    Ok(HttpResponse::Ok().cookie(removal).json(LogoutResponse {
        success: true,
        message: "Logout successful".into(),
    }))
}
