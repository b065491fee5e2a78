//! Utility functions for common operations.

use crate::error::ProviderError;

/// Splits text into chunks by paragraphs, respecting a maximum chunk size.
///
/// Paragraphs (blank-line separated) are grouped greedily so each chunk
/// stays under `chunk_size` characters. A single paragraph longer than the
/// limit becomes its own chunk rather than being split mid-sentence.
///
/// # Arguments
/// * `text` - The text to split
/// * `chunk_size` - Maximum size of each chunk in characters
pub fn split_into_paragraph_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut chunks: Vec<String> = Vec::new();
    let mut current_chunk: Vec<&str> = Vec::new();
    let mut current_size: usize = 0;

    for para in paragraphs {
        let para_size = para.chars().count() + if current_chunk.is_empty() { 0 } else { 2 };

        if current_size + para_size > chunk_size && !current_chunk.is_empty() {
            chunks.push(current_chunk.join("\n\n"));
            current_chunk = vec![para];
            current_size = para.chars().count();
        } else {
            current_chunk.push(para);
            current_size += para_size;
        }
    }

    // Remember the last chunk
    if !current_chunk.is_empty() {
        chunks.push(current_chunk.join("\n\n"));
    }

    chunks
}

/// Checks if an HTTP response is successful, and if not, returns a
/// classified provider error.
///
/// 429 responses become `RateLimited` so the orchestrator's retry logic can
/// treat them as transient; everything else becomes `ApiError` with the
/// status and body for context.
pub async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited(format!("HTTP {}: {}", status, text)));
    }
    Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_empty_text() {
        let chunks = split_into_paragraph_chunks("", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "");
    }

    #[test]
    fn test_split_single_paragraph() {
        let text = "他睁开眼睛。";
        let chunks = split_into_paragraph_chunks(text, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_split_fits_in_one_chunk() {
        let text = "第一段。\n\n第二段。\n\n第三段。";
        let chunks = split_into_paragraph_chunks(text, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_split_multiple_chunks_needed() {
        let text = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let chunks = split_into_paragraph_chunks(text, 11);
        // "aaaa\n\nbbbb" = 10 chars, "cccc\n\ndddd" = 10 chars
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "aaaa\n\nbbbb");
        assert_eq!(chunks[1], "cccc\n\ndddd");
    }

    #[test]
    fn test_split_oversized_paragraph_kept_whole() {
        let text = "这一段特别长，超过了限制，但不应该被从中间切开";
        let chunks = split_into_paragraph_chunks(text, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        // 4 CJK chars are 12 bytes; the limit is in characters.
        let text = "一二三四\n\n五六七八";
        let chunks = split_into_paragraph_chunks(text, 10);
        assert_eq!(chunks.len(), 1);
    }
}
