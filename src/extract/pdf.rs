//! PDF text extraction with lopdf.

use lopdf::Document;
use tracing::debug;

use crate::error::ExtractionError;

/// Extract text from every page, concatenated in page order.
pub fn extract_text(data: &[u8]) -> Result<String, ExtractionError> {
    let doc = Document::load_mem(data)?;

    let mut text = String::new();
    // get_pages is a BTreeMap keyed by page number
    for (page_num, _) in doc.get_pages() {
        let page_text = doc.extract_text(&[page_num])?;
        debug!("PDF page {}: {} chars", page_num, page_text.len());
        text.push_str(&page_text);
    }

    Ok(text)
}
