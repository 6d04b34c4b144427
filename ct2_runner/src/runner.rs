use anyhow::{bail, Context, Result};
use ct2rs::sys::{get_device_count, BatchType, ComputeType, Device, Translator};
use ct2rs::tokenizers::sentencepiece::Tokenizer as SpTokenizer;
use ct2rs::{Config, TranslationOptions};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{BatchKind, DecodeOptions, DeviceKind, RunnerConfig};
use crate::tokenizer::SubwordTokenizer;
use crate::TranslatorRunnerTrait;

/// A blocking CTranslate2 runner. The model is loaded lazily by `load_model`.
pub struct Ct2Runner {
    pub config: RunnerConfig,
    translator: Option<Translator>,
}

fn resolve_device(kind: DeviceKind) -> Device {
    match kind {
        DeviceKind::Cpu => Device::CPU,
        DeviceKind::Cuda => Device::CUDA,
        DeviceKind::Auto => {
            if get_device_count(Device::CUDA) > 0 {
                Device::CUDA
            } else {
                Device::CPU
            }
        }
    }
}

impl TranslatorRunnerTrait for Ct2Runner {
    fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            translator: None,
        }
    }

    fn load_model(&mut self) -> Result<()> {
        let model_path = &self.config.model_path;
        info!("Loading model from path: {}", model_path.display());

        let device = resolve_device(self.config.device);
        let device_indices = if device == Device::CUDA {
            self.config.device_indices.clone()
        } else {
            vec![0]
        };
        let config = Config {
            device,
            device_indices,
            compute_type: ComputeType::AUTO,
            num_threads_per_replica: self.config.threads,
            ..Default::default()
        };

        let translator = Translator::new(model_path, &config).with_context(|| {
            format!("failed to initialize a translator from {}", model_path.display())
        })?;
        self.translator = Some(translator);

        info!("Model loaded successfully on {:?}", device);
        Ok(())
    }

    fn is_model_loaded(&self) -> bool {
        self.translator.is_some()
    }

    fn translate_batch(
        &self,
        source: &[Vec<String>],
        target_prefix: Option<&[Vec<String>]>,
        options: &DecodeOptions,
    ) -> Result<Vec<Vec<String>>> {
        let translator = match self.translator.as_ref() {
            Some(t) => t,
            None => bail!("Model not loaded; call load_model() first."),
        };
        if source.is_empty() {
            return Ok(Vec::new());
        }

        let opts = TranslationOptions::<String, String> {
            beam_size: options.beam_size,
            batch_type: match options.batch_kind {
                BatchKind::Examples => BatchType::Examples,
                BatchKind::Tokens => BatchType::Tokens,
            },
            max_batch_size: options.max_batch_size,
            return_scores: options.return_scores,
            num_hypotheses: 1,
            ..Default::default()
        };

        let start = Instant::now();
        let results = match target_prefix {
            Some(prefix) => translator
                .translate_batch_with_target_prefix(source, prefix, &opts, None)
                .context("Translation inference failed")?,
            None => translator
                .translate_batch(source, &opts, None)
                .context("Translation inference failed")?,
        };
        debug!(
            "Translated {} sequences in {:.2}s",
            source.len(),
            start.elapsed().as_secs_f32()
        );

        results
            .into_iter()
            .map(|result| {
                result
                    .hypotheses
                    .into_iter()
                    .next()
                    .context("Engine returned no hypothesis")
            })
            .collect()
    }
}

/// SentencePiece model loaded from a single `.model` file.
pub struct SentencePieceTokenizer {
    inner: SpTokenizer,
}

impl SubwordTokenizer for SentencePieceTokenizer {
    fn load(model_path: &Path) -> Result<Self> {
        let inner = SpTokenizer::from_file(model_path, model_path).with_context(|| {
            format!("Failed to load SentencePiece model {}", model_path.display())
        })?;
        Ok(Self { inner })
    }

    fn encode(&self, text: &str) -> Result<Vec<String>> {
        let mut pieces = ct2rs::Tokenizer::encode(&self.inner, text)?;
        // The pipeline decides whether sources end with EOS.
        if pieces.last().map(String::as_str) == Some(crate::EOS_TOKEN) {
            pieces.pop();
        }
        Ok(pieces)
    }

    fn decode(&self, pieces: &[String]) -> Result<String> {
        ct2rs::Tokenizer::decode(&self.inner, pieces.to_vec())
    }
}
