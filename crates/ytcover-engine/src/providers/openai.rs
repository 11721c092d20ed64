use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use super::{
    decode_image_payload, default_http_client, describe_transport_error, ensure_image_exists,
    non_blank, response_json_or_error,
};
use crate::error::{CoverError, Result};
use crate::normalize::{provider_cover_filename, ImageNormalizer};
use crate::{CoverProvider, GenerationRequest};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-image-1";
pub const DEFAULT_OPENAI_SIZE: &str = "1536x1024";

const PROVIDER: &str = "openai";
const GAME_NAME_MAX_CHARS: usize = 60;
const DESCRIPTION_MAX_CHARS: usize = 150;

/// Cover generator backed by the OpenAI image-edit endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    model: String,
    size: String,
    output_dir: PathBuf,
    normalizer: ImageNormalizer,
    http: HttpClient,
}

impl OpenAiProvider {
    /// Uses [`default_http_client`], which sets no request timeout; inject a
    /// configured client with [`OpenAiProvider::with_http_client`] for one.
    pub fn new(api_key: impl Into<String>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            size: DEFAULT_OPENAI_SIZE.to_string(),
            output_dir: output_dir.into(),
            normalizer: ImageNormalizer::new(),
            http: default_http_client()?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The edit endpoint caps prompt length, so both inputs are cut to a
    /// fixed number of characters before interpolation.
    pub fn build_prompt(&self, game_name: &str, description: &str) -> String {
        let game: String = game_name.chars().take(GAME_NAME_MAX_CHARS).collect();
        let headline: String = description.chars().take(DESCRIPTION_MAX_CHARS).collect();

        [
            format!("Create a viral YouTube thumbnail for '{game}' from this screenshot."),
            format!("Style: Official '{game}' art style, vibrant, high contrast."),
            "Add Elements:".to_string(),
            format!("1. HEADLINE: '{headline}' (Massive, Readable)."),
            format!("2. LOGO: '{game}' logo in corner (Oversized, show ONCE)."),
            "Ensure text/logo do not cover main focal point.".to_string(),
            format!("Resolution: {}.", self.size),
        ]
        .join("\n")
    }

    fn edit_image(&self, image_path: &Path, prompt: String) -> Result<Value> {
        let endpoint = format!("{}/images/edits", self.api_base);
        let bytes = fs::read(image_path).map_err(|err| CoverError::io(image_path, err))?;
        let file_name = image_path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        let mime = self.normalizer.mime_type_for(image_path);
        let image_part = MultipartPart::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|err| CoverError::provider(PROVIDER, format!("invalid mime '{mime}': {err}")))?;

        let form = MultipartForm::new()
            .text("model", self.model.clone())
            .part("image", image_part)
            .text("prompt", prompt)
            .text("n", "1")
            .text("size", self.size.clone())
            .text("output_format", "jpeg")
            .text("quality", "medium");

        tracing::debug!(
            provider = PROVIDER,
            model = %self.model,
            size = %self.size,
            endpoint = %endpoint,
            "sending image edit request"
        );
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|err| {
                CoverError::provider(
                    PROVIDER,
                    format!(
                        "edits request failed ({endpoint}): {}",
                        describe_transport_error(err)
                    ),
                )
            })?;
        response_json_or_error(PROVIDER, response, |code| (200..300).contains(&code))
    }

    fn extract_image(response_payload: &Value) -> Result<Vec<u8>> {
        let b64 = response_payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("b64_json"))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| CoverError::provider(PROVIDER, "no image in response"))?;
        decode_image_payload(PROVIDER, b64)
    }
}

impl CoverProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf> {
        let prompt = self.build_prompt(&request.game_name, &request.description);
        ensure_image_exists(&request.image_path)?;
        if non_blank(Some(&self.api_key)).is_none() {
            return Err(CoverError::Configuration(
                "API key required for OpenAI models".to_string(),
            ));
        }

        let response_payload = self.edit_image(&request.image_path, prompt)?;
        let image_bytes = Self::extract_image(&response_payload)?;
        let path = self.normalizer.normalize_and_save(
            &image_bytes,
            &self.output_dir,
            Some(&provider_cover_filename("openai")),
        )?;
        tracing::info!(provider = PROVIDER, path = %path.display(), "cover saved");
        Ok(path)
    }
}
