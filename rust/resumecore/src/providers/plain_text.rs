use crate::error::ExtractError;
use crate::rag::document::Page;

use super::TextExtractor;

/// Page break used by `pdftotext` and friends.
const FORM_FEED: char = '\u{0C}';

/// UTF-8 text extractor. Form feeds split pages, numbered from 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, _source_name: &str, blob: &[u8]) -> Result<Vec<Page>, ExtractError> {
        let text = std::str::from_utf8(blob).map_err(|e| ExtractError::Encoding(e.to_string()))?;

        Ok(text
            .split(FORM_FEED)
            .enumerate()
            .map(|(i, page)| Page::new(page, i as u32 + 1))
            .collect())
    }
}
