use serde::{Deserialize, Serialize};

use docqa_core::error::{Error, Result};

use crate::client::{model_path, GeminiClient};

/// Hosted limit on requests per `batchEmbedContents` call.
pub const MAX_BATCH: usize = 100;

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiClient {
    /// Embed up to [`MAX_BATCH`] texts in one call. Returns one vector per
    /// input; the count is checked, the dimension is left to the caller.
    pub async fn batch_embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() > MAX_BATCH {
            return Err(Error::InvalidConfig(format!("at most {MAX_BATCH} texts per embedding call, got {}", texts.len())));
        }
        let qualified = format!("models/{}", model_path(model));
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedRequest { model: qualified.clone(), content: EmbedContent { parts: [TextPart { text: t }] } })
                .collect(),
        };
        let response: BatchEmbedResponse = self.call("embedding", model, "batchEmbedContents", &body).await?;
        if response.embeddings.len() != texts.len() {
            return Err(Error::Generation(format!(
                "embedding returned {} vectors for {} texts",
                response.embeddings.len(),
                texts.len()
            )));
        }
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}
