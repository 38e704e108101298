//! Word-window chunker.
//!
//! Splits text on whitespace and groups the words into consecutive
//! windows. The last window may be shorter; windows never overlap.

use tracing::debug;
use wyrm_core::{ChunkConfig, ChunkData, Chunker, Result, WyrmError};

/// Chunker that groups whitespace-delimited words into fixed-size windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordChunker;

impl WordChunker {
    /// Create a new word chunker.
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for WordChunker {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>> {
        if config.chunk_size == 0 {
            return Err(WyrmError::invalid_argument("chunk_size must be positive"));
        }

        let words: Vec<&str> = content.split_whitespace().collect();
        let chunks: Vec<ChunkData> = words
            .chunks(config.chunk_size)
            .enumerate()
            .map(|(i, window)| ChunkData {
                content: window.join(" "),
                word_count: window.len(),
                start_word: i * config.chunk_size,
            })
            .collect();

        debug!(
            "Chunked {} words into {} chunks of up to {}",
            words.len(),
            chunks.len(),
            config.chunk_size
        );

        Ok(chunks)
    }
}

/// Split `text` into windows of `chunk_size` words joined by single spaces.
///
/// A zero `chunk_size` yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    WordChunker
        .chunk(text, &ChunkConfig { chunk_size })
        .map(|chunks| chunks.into_iter().map(|c| c.content).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_single_chunk() {
        let chunks = chunk_text("ls lists directory contents", 100);
        assert_eq!(chunks, vec!["ls lists directory contents"]);
    }

    #[test]
    fn test_short_last_window() {
        let chunks = chunk_text("one two three four five six seven", 3);
        assert_eq!(chunks, vec!["one two three", "four five six", "seven"]);
    }

    #[test]
    fn test_empty_content() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("", 1).is_empty());
        assert!(chunk_text(" \n\t ", 5).is_empty());
    }

    #[test]
    fn test_whitespace_is_normalised() {
        let chunks = chunk_text("grep  -r\n\tpattern    dir\n", 2);
        assert_eq!(chunks, vec!["grep -r", "pattern dir"]);
    }

    #[test]
    fn test_tokens_preserved_across_sizes() {
        let text = "NAME\n  tar - an archiving utility\n\nSYNOPSIS\n  tar [OPTION...] [FILE]...\n\
                    DESCRIPTION  GNU tar saves many files together into a single tape or disk archive";
        let expected = tokens(text);

        for size in 1..=expected.len() + 2 {
            let rejoined = chunk_text(text, size).join(" ");
            assert_eq!(tokens(&rejoined), expected, "chunk size {}", size);
        }
    }

    #[test]
    fn test_windows_never_exceed_size() {
        let text = (0..250).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = WordChunker::new()
            .chunk(&text, &ChunkConfig::default())
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].word_count, 100);
        assert_eq!(chunks[2].word_count, 50);
        assert_eq!(chunks[2].start_word, 200);
        assert!(chunks[2].content.starts_with("w200 "));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = WordChunker::new()
            .chunk("a b c", &ChunkConfig { chunk_size: 0 })
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert!(chunk_text("a b c", 0).is_empty());
    }
}
