use std::path::Path;

/// Word-boundary marker used by SentencePiece pieces.
pub const WORD_BOUNDARY: char = '\u{2581}';

/// Reversible text <-> subword piece conversion.
pub trait SubwordTokenizer {
    fn load(model_path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;
    fn encode(&self, text: &str) -> anyhow::Result<Vec<String>>;
    fn decode(&self, pieces: &[String]) -> anyhow::Result<String>;
}

/// Splits on whitespace and marks every word with the SentencePiece boundary
/// character, so pieces look like what a real model would produce.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl SubwordTokenizer for WhitespaceTokenizer {
    fn load(_model_path: &Path) -> anyhow::Result<Self> {
        Ok(Self)
    }

    fn encode(&self, text: &str) -> anyhow::Result<Vec<String>> {
        Ok(text
            .split_whitespace()
            .map(|word| format!("{}{}", WORD_BOUNDARY, word))
            .collect())
    }

    fn decode(&self, pieces: &[String]) -> anyhow::Result<String> {
        let joined: String = pieces.concat();
        Ok(joined
            .replace(WORD_BOUNDARY, " ")
            .trim()
            .to_string())
    }
}
