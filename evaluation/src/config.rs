use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::error::EvalError;

pub const FLORES_URL: &str = "https://tinyurl.com/flores200dataset";
pub const FLORES_SPM_URL: &str = "https://tinyurl.com/flores200sacrebleuspm";
const FLORES_SPM_FILE: &str = "flores200_sacrebleu_tokenizer_spm.model";

/// Same beam width as the packages are served with.
pub const DEFAULT_BEAM_SIZE: usize = 4;
pub const DEFAULT_BATCH_TOKENS: usize = 2048;
pub const SCORE_DECIMALS: i32 = 5;

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub datasets_dir: PathBuf,
    pub dataset_url: String,
    pub spm_url: String,
}

impl DataConfig {
    pub fn flores(datasets_dir: impl Into<PathBuf>) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
            dataset_url: FLORES_URL.to_string(),
            spm_url: FLORES_SPM_URL.to_string(),
        }
    }

    /// SentencePiece model used for `flores200` BLEU tokenization and by NLLB.
    pub fn spm_model_path(&self) -> PathBuf {
        self.datasets_dir.join("nllb").join(FLORES_SPM_FILE)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::flores("datasets")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NllbModelSize {
    #[value(name = "600M")]
    Distilled600M,
    #[value(name = "1.2B")]
    Distilled1_2B,
    #[value(name = "3.3B")]
    Full3_3B,
}

impl NllbModelSize {
    fn dir_name(self) -> &'static str {
        match self {
            NllbModelSize::Distilled600M => "nllb-200-distilled-600M-int8",
            NllbModelSize::Distilled1_2B => "ct2-nllb-200-distilled-1.2B-int8",
            NllbModelSize::Full3_3B => "nllb-200-3.3B-int8",
        }
    }

    pub fn model_path(self, datasets_dir: &Path) -> PathBuf {
        datasets_dir.join("nllb").join(self.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub data: DataConfig,
    pub beam_size: usize,
    /// Pairs evaluated at the same time.
    pub concurrency: usize,
}

impl EvaluationConfig {
    pub fn flores() -> Self {
        Self {
            data: DataConfig::default(),
            beam_size: DEFAULT_BEAM_SIZE,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Commands that translate refuse to run on the echo engine of a default
/// build, so they never write fake translations or scores.
pub fn require_engine(available: bool, command: &str) -> Result<(), EvalError> {
    if available {
        Ok(())
    } else {
        Err(EvalError::EngineUnavailable(command.to_string()))
    }
}

pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}
