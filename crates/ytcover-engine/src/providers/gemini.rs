use std::path::{Path, PathBuf};

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::{
    decode_image_payload, describe_transport_error, ensure_image_exists, non_blank,
    response_json_or_error, truncate_text,
};
use crate::error::{CoverError, Result};
use crate::normalize::{provider_cover_filename, ImageNormalizer};
use crate::{CoverProvider, GenerationRequest};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-image-preview";

const PROVIDER: &str = "gemini";
const RAW_RESPONSE_MAX_CHARS: usize = 65_536;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Cover generator backed by the Gemini `generateContent` endpoint.
///
/// The API key travels only as the `key` query parameter. Both the key and the
/// HTTP client are optional at construction; `generate` reports a
/// configuration error when either is missing.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: Option<String>,
    http: Option<HttpClient>,
    api_base: String,
    model: String,
    output_dir: PathBuf,
    normalizer: ImageNormalizer,
}

impl GeminiProvider {
    pub fn new(
        api_key: Option<String>,
        http: Option<HttpClient>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api_key,
            http,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            output_dir: output_dir.into(),
            normalizer: ImageNormalizer::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// The template is sent verbatim, CRLF line endings and all; the art
    /// direction and subject lines are deliberately run together.
    pub fn build_prompt(&self, game_name: &str, description: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("Act as a world-class YouTube thumbnail designer.\r\n");
        prompt.push_str("Task: Create a viral, high-click-through-rate (CTR) thumbnail based on the attached gameplay screenshot.\r\n");
        prompt.push_str(&format!("The game is \"{game_name}\".\r\n"));
        prompt.push_str("Visual Style & Composition:\r\n");
        prompt.push_str(&format!(
            "    Art Direction: Strictly adhere to the official art style of \"{game_name}\"."
        ));
        prompt.push_str("    Subject: Enhance the main character or focal point on the screenshot.\r\n");
        prompt.push_str("    Color: Vibrant and high-contrast, but strictly within the game's official color palette.\r\n");
        prompt.push_str("Text & Branding:\r\n");
        prompt.push_str(&format!(
            "    1. HEADLINE: Add the text \"{description}\". Make the text MASSIVE and DOMINANT.\r\n"
        ));
        prompt.push_str(&format!(
            "    2. LOGO: Integrate the official \"{game_name}\" logo in one corner. Make the logo OVERSIZED.\r\n"
        ));
        prompt.push_str("    NEGATIVE CONSTRAINT: Do NOT duplicate the logo. Do NOT write the game name as plain text separate from the logo. Show the logo EXACTLY ONCE.\r\n");
        prompt.push_str("    HEADLINE & LOGO should be maximum readability against the background.\r\n");
        prompt.push_str("    Place HEADLINE & LOGO strategically so them doesn't cover the main focal point.\r\n");
        prompt
    }

    pub fn build_payload(&self, prompt: &str, mime_type: &str, image_base64: &str) -> Value {
        let safety_settings = SAFETY_CATEGORIES
            .into_iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": "BLOCK_NONE",
                })
            })
            .collect::<Vec<Value>>();

        json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": image_base64,
                        }
                    },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
            },
            "safetySettings": safety_settings,
        })
    }

    fn generate_content(&self, http: &HttpClient, api_key: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint();
        let body = serde_json::to_string(payload)
            .map_err(|err| CoverError::provider(PROVIDER, format!("payload encode failed: {err}")))?;

        tracing::debug!(
            provider = PROVIDER,
            model = %self.model,
            endpoint = %endpoint,
            "sending generateContent request"
        );
        let response = http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| {
                CoverError::provider(
                    PROVIDER,
                    format!("request failed ({endpoint}): {}", describe_transport_error(err)),
                )
            })?;
        response_json_or_error(PROVIDER, response, |code| code == 200)
    }

    /// First inline image of the first candidate, in part order.
    fn extract_image(response_payload: &Value) -> Result<Vec<u8>> {
        let parts = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for part in parts {
            let data = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(|inline| inline.get("data"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            return decode_image_payload(PROVIDER, data);
        }

        Err(CoverError::provider(
            PROVIDER,
            format!(
                "no image found in response: {}",
                truncate_text(&response_payload.to_string(), RAW_RESPONSE_MAX_CHARS)
            ),
        ))
    }
}

impl CoverProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf> {
        let prompt = self.build_prompt(&request.game_name, &request.description);
        ensure_image_exists(&request.image_path)?;

        let (Some(http), Some(api_key)) = (self.http.as_ref(), non_blank(self.api_key.as_deref()))
        else {
            return Err(CoverError::Configuration(
                "HTTP client and API key required for Gemini models".to_string(),
            ));
        };

        let image_base64 = self.normalizer.to_base64(&request.image_path)?;
        let mime_type = self.normalizer.mime_type_for(&request.image_path);
        let payload = self.build_payload(&prompt, mime_type, &image_base64);

        let response_payload = self.generate_content(http, api_key, &payload)?;
        let image_bytes = Self::extract_image(&response_payload)?;
        let path = self.normalizer.normalize_and_save(
            &image_bytes,
            &self.output_dir,
            Some(&provider_cover_filename("gemini_beta")),
        )?;
        tracing::info!(provider = PROVIDER, path = %path.display(), "cover saved");
        Ok(path)
    }
}
