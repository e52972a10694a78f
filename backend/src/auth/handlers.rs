//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, email
//! verification, login and image upload, parse request data, and hand off to
//! `auth::service` for the core business logic.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::*;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::repositories::user_repository::UserRepository;
use crate::services::upload_service::{UploadResult, UploadService};
use crate::utils::jwt::Claims;
use axum::{
    extract::{Extension, Json, Multipart, Query},
    http::StatusCode,
    response::Json as ResponseJson,
};
use sqlx::SqlitePool;
use tracing::info;

/// Multipart fields accepted by the register endpoint.
struct RegisterForm {
    request: RegisterRequest,
    image_name: String,
    image_bytes: Vec<u8>,
}

async fn read_register_form(mut multipart: Multipart) -> Result<RegisterForm, (StatusCode, String)> {
    let mut name = None;
    let mut email = None;
    let mut password = None;
    let mut image_name = "profile-image".to_string();
    let mut image_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                name = Some(field.text().await.map_err(bad_field)?);
            }
            "email" => {
                email = Some(field.text().await.map_err(bad_field)?);
            }
            "password" => {
                password = Some(field.text().await.map_err(bad_field)?);
            }
            "profileImageUrl" => {
                if let Some(file_name) = field.file_name() {
                    image_name = file_name.to_string();
                }
                image_bytes = Some(field.bytes().await.map_err(bad_field)?.to_vec());
            }
            _ => {}
        }
    }

    let request = RegisterRequest {
        name: name.ok_or_else(|| missing("name"))?,
        email: email.ok_or_else(|| missing("email"))?,
        password: password.ok_or_else(|| missing("password"))?,
    };
    let image_bytes = image_bytes.ok_or_else(|| missing("profileImageUrl"))?;

    Ok(RegisterForm {
        request,
        image_name,
        image_bytes,
    })
}

fn bad_field(e: axum::extract::multipart::MultipartError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("Invalid multipart field: {e}"))
}

fn missing(field: &str) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        format!("Missing required field: {field}"),
    )
}

/// Handle user registration: upload the profile image, then run the
/// registration flow.
#[axum::debug_handler]
pub async fn register(
    Extension(pool): Extension<SqlitePool>,
    multipart: Multipart,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthResponse>>), (StatusCode, String)> {
    let form = read_register_form(multipart).await?;

    info!("Received register request for {}", form.request.email);

    let config = Config::from_env()
        .map_err(|e| service_error_to_http(ServiceError::validation(format!("Config error: {e}"))))?;

    let upload_service =
        UploadService::new(config.cloudinary.clone()).map_err(service_error_to_http)?;
    let upload = upload_service
        .upload_single_image(&form.image_name, form.image_bytes)
        .await
        .map_err(service_error_to_http)?;

    let auth_service = AuthService::new(&pool).map_err(service_error_to_http)?;
    let response = auth_service
        .register(form.request, upload.secure_url)
        .await
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(response, "User registered successfully")),
    ))
}

/// Handle the email verification callback.
#[axum::debug_handler]
pub async fn verify_email(
    Extension(pool): Extension<SqlitePool>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, (StatusCode, String)> {
    let auth_service = AuthService::new(&pool).map_err(service_error_to_http)?;

    let response = auth_service
        .verify_email(&query.token)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(
        response,
        "Email verified successfully",
    )))
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, (StatusCode, String)> {
    let auth_service = AuthService::new(&pool).map_err(service_error_to_http)?;

    let response = auth_service
        .login(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(
        response,
        "Logged in successfully",
    )))
}

/// Handle a standalone image upload request.
#[axum::debug_handler]
pub async fn upload_image(
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<UploadResult>>, (StatusCode, String)> {
    let mut image_name = "image".to_string();
    let mut image_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "image" {
            if let Some(file_name) = field.file_name() {
                image_name = file_name.to_string();
            }
            image_bytes = Some(field.bytes().await.map_err(bad_field)?.to_vec());
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| missing("image"))?;

    let config = Config::from_env()
        .map_err(|e| service_error_to_http(ServiceError::validation(format!("Config error: {e}"))))?;

    let upload_service =
        UploadService::new(config.cloudinary.clone()).map_err(service_error_to_http)?;
    let upload = upload_service
        .upload_single_image(&image_name, image_bytes)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(
        upload,
        "Image uploaded successfully",
    )))
}

/// Get current user information from a validated bearer token.
#[axum::debug_handler]
pub async fn me(
    Extension(pool): Extension<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, (StatusCode, String)> {
    let repo = UserRepository::new(&pool);

    let user = repo
        .find_by_id(claims.user_id())
        .await
        .map_err(service_error_to_http)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    Ok(ResponseJson(ApiResponse::ok(AuthResponse::from(&user))))
}
