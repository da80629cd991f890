//! Text extraction from uploaded PDF documents.

use std::path::{Path, PathBuf};

use lopdf::Document as PdfDocument;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Document;

/// Concatenate the text of every page of every document, in document order
/// then page order.
///
/// One unreadable document aborts the whole extraction; a partially extracted
/// corpus would silently change answers.
pub fn extract_text(documents: &[Document]) -> Result<String> {
    let mut text = String::new();
    for (i, doc) in documents.iter().enumerate() {
        debug!("Extracting document {}/{}: {}", i + 1, documents.len(), doc.name);
        text.push_str(&extract_document(doc)?);
    }
    info!("Extracted {} characters from {} document(s)", text.chars().count(), documents.len());
    Ok(text)
}

/// Text of a single PDF document.
pub fn extract_document(doc: &Document) -> Result<String> {
    if !doc.is_pdf() {
        return Err(Error::Extraction {
            document: doc.name.clone(),
            reason: format!("expected application/pdf, got {}", doc.media_type),
        });
    }
    let extraction_error = |reason: String| Error::Extraction { document: doc.name.clone(), reason };

    let pdf = PdfDocument::load_mem(&doc.bytes).map_err(|e| extraction_error(e.to_string()))?;
    if pdf.is_encrypted() {
        return Err(extraction_error("document is encrypted".to_string()));
    }
    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(extraction_error("document has no pages".to_string()));
    }
    let mut text = String::new();
    for page in pages {
        let page_text = pdf
            .extract_text(&[page])
            .map_err(|e| extraction_error(format!("page {page}: {e}")))?;
        text.push_str(&page_text);
    }
    Ok(text)
}

/// Load `*.pdf` documents from the given paths. Directories are walked
/// recursively; files inside them are taken in sorted path order.
pub fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in paths {
        if path.is_dir() {
            for file in list_pdf_files(path) {
                documents.push(Document::from_path(&file)?);
            }
        } else {
            documents.push(Document::from_path(path)?);
        }
    }
    Ok(documents)
}

fn list_pdf_files(root: &Path) -> Vec<PathBuf> {
    let mut pdf_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()).is_some_and(|s| s.eq_ignore_ascii_case("pdf")) {
            pdf_files.push(path.to_path_buf());
        }
    }
    pdf_files.sort();
    pdf_files
}
