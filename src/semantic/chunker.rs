//! Word-window chunking for uploaded documents.
//!
//! Text is split on whitespace runs and emitted as overlapping windows of
//! `chunk_size` words, advancing by `chunk_size - overlap` words per step.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunking parameters: overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidParameters { chunk_size: usize, overlap: usize },
}

/// Split `text` into overlapping chunks of at most `chunk_size` words.
///
/// Returns an empty list for empty or all-whitespace input. Fails before
/// doing any work when the step (`chunk_size - overlap`) would not be positive.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ChunkError::InvalidParameters {
            chunk_size,
            overlap,
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;

    let mut chunks = Vec::with_capacity(words.len() / step + 1);
    let mut start = 0;
    while start < words.len() {
        let end = start.saturating_add(chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = start.saturating_add(step);
    }

    Ok(chunks)
}
