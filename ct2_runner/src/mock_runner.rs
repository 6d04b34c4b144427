//! Stand-ins used when the crate is built without `use_ct2`.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::warn;

use crate::config::{DecodeOptions, RunnerConfig};
use crate::tokenizer::{SubwordTokenizer, WhitespaceTokenizer};
use crate::{TranslatorRunnerTrait, EOS_TOKEN};

/// Copies the source pieces into the hypothesis, after the forced prefix.
pub struct Ct2Runner {
    pub config: RunnerConfig,
    loaded: bool,
}

/// `eng_Latn`, `zho_Hans`, ...
fn is_language_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 8
        && bytes[..3].iter().all(u8::is_ascii_lowercase)
        && bytes[3] == b'_'
        && bytes[4].is_ascii_uppercase()
        && bytes[5..].iter().all(u8::is_ascii_lowercase)
}

impl TranslatorRunnerTrait for Ct2Runner {
    fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            loaded: false,
        }
    }

    fn load_model(&mut self) -> Result<()> {
        warn!(
            "Built without the use_ct2 feature; {} will be echoed, not translated",
            self.config.model_path.display()
        );
        self.loaded = true;
        Ok(())
    }

    fn is_model_loaded(&self) -> bool {
        self.loaded
    }

    fn translate_batch(
        &self,
        source: &[Vec<String>],
        target_prefix: Option<&[Vec<String>]>,
        _options: &DecodeOptions,
    ) -> Result<Vec<Vec<String>>> {
        if !self.loaded {
            bail!("Model not loaded; call load_model() first.");
        }

        Ok(source
            .iter()
            .enumerate()
            .map(|(i, tokens)| {
                let mut hypothesis: Vec<String> = target_prefix
                    .and_then(|prefixes| prefixes.get(i))
                    .cloned()
                    .unwrap_or_default();
                hypothesis.extend(
                    tokens
                        .iter()
                        .filter(|t| t.as_str() != EOS_TOKEN && !is_language_token(t))
                        .cloned(),
                );
                hypothesis
            })
            .collect())
    }
}

/// Whitespace tokenizer behind the SentencePiece name.
pub struct SentencePieceTokenizer {
    inner: WhitespaceTokenizer,
}

impl SubwordTokenizer for SentencePieceTokenizer {
    fn load(model_path: &Path) -> Result<Self> {
        warn!(
            "Built without the use_ct2 feature; ignoring {} and splitting on whitespace",
            model_path.display()
        );
        Ok(Self {
            inner: WhitespaceTokenizer,
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<String>> {
        self.inner.encode(text)
    }

    fn decode(&self, pieces: &[String]) -> Result<String> {
        self.inner.decode(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn translate_requires_load() {
        let runner = Ct2Runner::new(RunnerConfig::new("model"));
        let result = runner.translate_batch(&[pieces(&["▁Hi"])], None, &DecodeOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn echoes_after_target_prefix() -> Result<()> {
        let mut runner = Ct2Runner::new(RunnerConfig::new("model"));
        runner.load_model()?;

        let source = vec![pieces(&["eng_Latn", "▁Good", "▁morning.", "</s>"])];
        let prefix = vec![pieces(&["ita_Latn"])];
        let out = runner.translate_batch(&source, Some(&prefix), &DecodeOptions::default())?;

        assert_eq!(out, vec![pieces(&["ita_Latn", "▁Good", "▁morning."])]);
        Ok(())
    }

    #[test]
    fn language_token_shape() {
        assert!(is_language_token("zho_Hans"));
        assert!(!is_language_token("▁Hello"));
        assert!(!is_language_token("abc_defg"));
    }
}
