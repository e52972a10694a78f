//! Profile image upload to Cloudinary.
//!
//! Uses the unsigned upload endpoint with a preconfigured upload preset.
//! Consumed only by the HTTP layer; the auth flows receive the resulting
//! secure URL and never perform uploads themselves.

use crate::config::CloudinaryConfig;
use crate::errors::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of a successful image upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub secure_url: String,
    pub public_id: String,
}

pub struct UploadService {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl UploadService {
    pub fn new(config: CloudinaryConfig) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_seconds))
            .build()
            .map_err(|e| ServiceError::external_service(format!("HTTP client error: {e}")))?;

        Ok(Self { client, config })
    }

    /// Uploads a single image and returns its secure URL and public id.
    pub async fn upload_single_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<UploadResult> {
        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::external_service(format!("Image upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::external_service(format!(
                "Image upload rejected with status {}",
                response.status()
            )));
        }

        response
            .json::<UploadResult>()
            .await
            .map_err(|e| ServiceError::external_service(format!("Invalid upload response: {e}")))
    }
}
