use tracing::info;

use docqa_core::error::{Error, Result};
use docqa_core::traits::Generator;
use docqa_core::types::{Document, GenerationRequest};

/// What the model is told to say when the invoice does not hold the answer.
pub const NOT_IN_IMAGE: &str = "answer is not available in the image";

pub const INVOICE_SYSTEM_MESSAGE: &str = r#"
You are a expert in understanding invoices.
We will upload an image of invoice.
You need to answer any questions based on the uploaded invoice image.
If the answer is not in the image, just say "answer is not available in the image".
"#;

/// Instructions, then the image, then the question, as one user turn.
pub fn invoice_request(image: &Document, question: &str) -> Result<GenerationRequest> {
    if !image.is_image() {
        return Err(Error::UnsupportedMedia { document: image.name.clone(), media_type: image.media_type.clone() });
    }
    Ok(GenerationRequest::new()
        .text(INVOICE_SYSTEM_MESSAGE)
        .inline(image.media_type.clone(), image.bytes.clone())
        .text(question))
}

/// Answer `question` about an invoice image. The model's text is returned as is.
pub async fn ask_invoice<G>(generator: &G, image: &Document, question: &str) -> Result<String>
where
    G: Generator + ?Sized,
{
    let request = invoice_request(image, question)?;
    info!("Asking {} about invoice {} ({} bytes)", generator.model_id(), image.name, image.bytes.len());
    generator.generate(&request).await
}
