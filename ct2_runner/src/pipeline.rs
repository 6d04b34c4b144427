use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{BatchKind, DecodeOptions, RunnerConfig};
use crate::tokenizer::SubwordTokenizer;
use crate::{TranslatorRunnerTrait, EOS_TOKEN};

/// How sentences are framed around the engine call.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub decode: DecodeOptions,
    /// Prepended to every source, e.g. `eng_Latn` for NLLB.
    pub source_token: Option<String>,
    pub append_eos: bool,
    /// Forced as the first target token and removed from the hypothesis.
    pub target_token: Option<String>,
}

impl PipelineOptions {
    /// Plain bilingual model: pieces in, best hypothesis out.
    pub fn bilingual(beam_size: usize) -> Self {
        Self {
            decode: DecodeOptions {
                beam_size,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Multilingual model steered by language tokens, batched by token count.
    pub fn multilingual(
        source_token: &str,
        target_token: &str,
        beam_size: usize,
        max_batch_tokens: usize,
    ) -> Self {
        Self {
            decode: DecodeOptions {
                beam_size,
                batch_kind: BatchKind::Tokens,
                max_batch_size: max_batch_tokens,
                return_scores: false,
            },
            source_token: Some(source_token.to_string()),
            append_eos: true,
            target_token: Some(target_token.to_string()),
        }
    }
}

/// Encode -> translate -> decode around one runner and one tokenizer.
pub struct TranslationPipeline<R, T> {
    pub runner: R,
    tokenizer_path: PathBuf,
    tokenizer: Option<T>,
}

impl<R: TranslatorRunnerTrait, T: SubwordTokenizer> TranslationPipeline<R, T> {
    pub fn new(config: RunnerConfig, tokenizer_path: impl Into<PathBuf>) -> Self {
        Self {
            runner: R::new(config),
            tokenizer_path: tokenizer_path.into(),
            tokenizer: None,
        }
    }

    /// Loads the tokenizer and the model. Safe to call twice.
    pub fn load(&mut self) -> Result<()> {
        if self.tokenizer.is_none() {
            self.tokenizer = Some(T::load(&self.tokenizer_path)?);
        }
        if !self.runner.is_model_loaded() {
            self.runner.load_model()?;
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.tokenizer.is_some() && self.runner.is_model_loaded()
    }

    fn tokenizer(&self) -> Result<&T> {
        self.tokenizer
            .as_ref()
            .context("Tokenizer not loaded; call load() first.")
    }

    /// Source pieces exactly as they are handed to the engine.
    pub fn encode(&self, sentences: &[String], options: &PipelineOptions) -> Result<Vec<Vec<String>>> {
        let tokenizer = self.tokenizer()?;
        sentences
            .iter()
            .map(|sentence| {
                let mut pieces = Vec::new();
                if let Some(token) = &options.source_token {
                    pieces.push(token.clone());
                }
                pieces.extend(tokenizer.encode(sentence)?);
                if options.append_eos {
                    pieces.push(EOS_TOKEN.to_string());
                }
                Ok(pieces)
            })
            .collect()
    }

    pub fn translate_pieces(
        &self,
        source: &[Vec<String>],
        options: &PipelineOptions,
    ) -> Result<Vec<String>> {
        let tokenizer = self.tokenizer()?;
        let target_prefix = options
            .target_token
            .as_ref()
            .map(|token| vec![vec![token.clone()]; source.len()]);

        let hypotheses = self
            .runner
            .translate_batch(source, target_prefix.as_deref(), &options.decode)?;

        hypotheses
            .into_iter()
            .map(|mut tokens| {
                if let Some(token) = &options.target_token {
                    if let Some(pos) = tokens.iter().position(|t| t == token) {
                        tokens.remove(pos);
                    }
                }
                tokenizer.decode(&tokens)
            })
            .collect()
    }

    pub fn translate(&self, sentences: &[String], options: &PipelineOptions) -> Result<Vec<String>> {
        let source = self.encode(sentences, options)?;
        debug!("Encoded {} sentences", source.len());
        self.translate_pieces(&source, options)
    }
}
