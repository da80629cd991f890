use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docqa_core::config::GenAiSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Generator;
use docqa_core::types::{GenerationRequest, Part};

use crate::client::GeminiClient;

// --- generateContent wire format ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Hosted Gemini text (and multimodal) generation.
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, model: &str, temperature: f32) -> Self {
        info!("Generator configured: model={}, endpoint={}", model, client.api_base());
        Self { client, model: model.to_string(), temperature }
    }

    /// Text model from settings.
    pub fn from_settings(settings: &GenAiSettings) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(settings)?, &settings.generation_model, settings.temperature))
    }

    /// Image-capable model from settings.
    pub fn vision_from_settings(settings: &GenAiSettings) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(settings)?, &settings.vision_model, settings.temperature))
    }

    fn to_wire(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let parts = request
            .parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => WirePart { text: Some(t.clone()), inline_data: None },
                Part::InlineData { mime_type, data } => WirePart {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    }),
                },
            })
            .collect();
        GenerateContentRequest {
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![WirePart { text: Some(s.clone()), inline_data: None }],
            }),
            contents: vec![Content { role: Some("user".to_string()), parts }],
            generation_config: GenerationConfig { temperature: self.temperature },
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.to_wire(request);
        let response: GenerateContentResponse =
            self.client.call("generation", &self.model, "generateContent", &body).await?;

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::Generation(format!("prompt blocked: {reason}")));
        }
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Generation("no candidates in response".to_string()))?;
        let text: String = candidate.content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(Error::Generation(format!("empty response (finish reason: {reason})")));
        }
        debug!("Generated {} characters", text.len());
        Ok(text)
    }
}
