use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::sync::Mutex;
use std::time::Duration;

use docqa_core::chunker::{Chunker, ChunkingConfig};
use docqa_core::error::{Error, Result, Stage};
use docqa_core::traits::Generator;
use docqa_core::types::{Document, GenerationRequest, MEDIA_PDF};
use docqa_embed::FakeEmbedder;
use docqa_rag::{build_prompt, PdfChat, NOT_IN_CONTEXT};

/// Replays a fixed reply and records every prompt it was given.
struct ScriptedGenerator {
    reply: Result<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Self { Self { reply: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) } }

    fn failing(err: Error) -> Self { Self { reply: Err(err), prompts: Mutex::new(Vec::new()) } }

    fn calls(&self) -> usize { self.prompts.lock().unwrap().len() }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_id(&self) -> &str { "scripted" }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.text_content());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(Error::CollaboratorTimeout { service, timeout }) => {
                Err(Error::CollaboratorTimeout { service: service.clone(), timeout: *timeout })
            }
            Err(e) => Err(Error::Generation(e.to_string())),
        }
    }
}

fn one_page_pdf(text: &str) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn chat<'a>(
    embedder: FakeEmbedder,
    generator: &'a ScriptedGenerator,
    dir: &std::path::Path,
) -> PdfChat<FakeEmbedder, &'a ScriptedGenerator> {
    PdfChat::new(embedder, generator, Chunker::new(ChunkingConfig::new(200, 20).unwrap()).unwrap(), dir, 4).unwrap()
}

#[tokio::test]
async fn answers_from_uploaded_pdf() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("pdf_index");
    let generator = ScriptedGenerator::replying("90");
    let rag = chat(FakeEmbedder::new(128), &generator, &dir);

    let sentence = "Alice scored 90 in Math. Bob scored 85 in Science.";
    let doc = Document::new("scores.pdf", MEDIA_PDF, one_page_pdf(sentence));
    let meta = rag.build_index(&[doc]).await?;
    assert_eq!(meta.chunk_count, 1);

    let hits = rag.retrieve("What did Alice score in Math?").await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text.trim(), sentence);

    let answer = rag.answer("What did Alice score in Math?").await?;
    assert_eq!(answer, "90");

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Alice scored 90 in Math"));
    assert!(prompts[0].contains("Question: What did Alice score in Math?"));
    assert!(prompts[0].contains(NOT_IN_CONTEXT));
    Ok(())
}

#[tokio::test]
async fn empty_index_short_circuits_to_sentinel() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("pdf_index");
    let embedder = FakeEmbedder::new(16);
    docqa_vector::build_index(&dir, &[], &embedder).await?;

    let generator = ScriptedGenerator::replying("should not be used");
    let rag = chat(embedder, &generator, &dir);
    assert_eq!(rag.answer("Anything at all?").await?, NOT_IN_CONTEXT);
    assert_eq!(generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn querying_before_build_is_index_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::replying("unused");
    let rag = chat(FakeEmbedder::new(16), &generator, &tmp.path().join("missing"));

    let err = rag.answer("hello?").await.unwrap_err();
    assert!(matches!(err, Error::IndexNotFound(_)), "got {err:?}");
    assert_eq!(err.stage(), Stage::Retrieval);
    assert!(err.to_string().contains("build the index first"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn different_embedding_model_is_refused() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("pdf_index");
    let generator = ScriptedGenerator::replying("unused");

    let builder = chat(FakeEmbedder::with_id(16, "model-a"), &generator, &dir);
    builder.build_index(&[Document::new("a.pdf", MEDIA_PDF, one_page_pdf("some text"))]).await?;

    let asker = chat(FakeEmbedder::with_id(16, "model-b"), &generator, &dir);
    let err = asker.answer("what?").await.unwrap_err();
    match err {
        Error::EmbeddingModelMismatch { index, current } => {
            assert_eq!(index, "model-a");
            assert_eq!(current, "model-b");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn generator_timeout_is_surfaced_without_retry() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("pdf_index");
    let generator = ScriptedGenerator::failing(Error::CollaboratorTimeout { service: "generation".into(), timeout: Duration::from_secs(60) });
    let rag = chat(FakeEmbedder::new(16), &generator, &dir);
    rag.build_index(&[Document::new("a.pdf", MEDIA_PDF, one_page_pdf("the sky is blue"))]).await?;

    let err = rag.answer("what colour is the sky?").await.unwrap_err();
    assert!(matches!(err, Error::CollaboratorTimeout { .. }));
    assert_eq!(err.stage(), Stage::Generation);
    assert_eq!(generator.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_upload_fails_the_build() {
    let tmp = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::replying("unused");
    let rag = chat(FakeEmbedder::new(16), &generator, &tmp.path().join("idx"));
    let err = rag.build_index(&[Document::new("broken.pdf", MEDIA_PDF, b"not a pdf".to_vec())]).await.unwrap_err();
    assert!(matches!(err, Error::Extraction { ref document, .. } if document == "broken.pdf"));
    assert!(!tmp.path().join("idx").exists());
}

#[test]
fn prompt_carries_context_and_question() {
    let p = build_prompt("CTX", "Q?");
    assert!(p.contains("Context: CTX"));
    assert!(p.contains("Question: Q?"));
    assert!(p.contains("answer is not available in the context"));
}
