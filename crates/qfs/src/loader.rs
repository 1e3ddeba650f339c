//! Document loading for the CLI

use lopdf::Document;
use qfs_common::{QfsError, Result};
use std::path::Path;
use tracing::{debug, warn};

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Read a document as text; anything unusable is an input error
///
/// PDFs become one `# Page N` section per page that has text.
pub async fn load_document(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        QfsError::invalid_input(format!("cannot read {}: {}", path.display(), e))
    })?;

    if is_pdf(path) {
        let name = path.display().to_string();
        return tokio::task::spawn_blocking(move || pdf_to_text(&bytes))
            .await
            .map_err(|e| QfsError::invalid_input(format!("cannot parse {}: {}", name, e)))?;
    }

    String::from_utf8(bytes).map_err(|_| {
        QfsError::invalid_input(format!("{} is not UTF-8 text", path.display()))
    })
}

/// Extract the text layer of a PDF
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    let document = Document::load_mem(bytes)
        .map_err(|e| QfsError::invalid_input(format!("unreadable PDF: {}", e)))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) => pages.push((page_number, text)),
            Err(e) => warn!("Skipping PDF page {}: {}", page_number, e),
        }
    }

    debug!("Extracted text from {} PDF pages", pages.len());
    Ok(render_pages(pages))
}

/// Join page texts as markdown sections, dropping pages without text
fn render_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = (u32, String)>,
{
    pages
        .into_iter()
        .filter_map(|(number, text)| {
            let text = text.trim();
            (!text.is_empty()).then(|| format!("# Page {}\n\n{}", number, text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
