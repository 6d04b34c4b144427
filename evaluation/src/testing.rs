//! Deterministic engine stand-in for the task tests.

use anyhow::Result;
use ct2_runner::{DecodeOptions, RunnerConfig, TranslatorRunnerTrait, WORD_BOUNDARY};

/// Upper-cases every word piece and drops control tokens. The forced target
/// prefix is echoed back like a real multilingual model would.
pub struct ShoutRunner {
    loaded: bool,
}

impl TranslatorRunnerTrait for ShoutRunner {
    fn new(_config: RunnerConfig) -> Self {
        Self { loaded: false }
    }

    fn load_model(&mut self) -> Result<()> {
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
        anyhow::ensure!(self.loaded, "Model not loaded");
        Ok(source
            .iter()
            .enumerate()
            .map(|(i, pieces)| {
                let mut out = target_prefix.map(|p| p[i].clone()).unwrap_or_default();
                out.extend(
                    pieces
                        .iter()
                        .filter(|p| p.starts_with(WORD_BOUNDARY))
                        .map(|p| p.to_uppercase()),
                );
                out
            })
            .collect())
    }
}
