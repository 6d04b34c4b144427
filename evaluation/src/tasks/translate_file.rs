use anyhow::{Context, Result};
use ct2_runner::{
    DeviceKind, PipelineOptions, RunnerConfig, SubwordTokenizer, TranslationPipeline,
    TranslatorRunnerTrait,
};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::config::{DataConfig, NllbModelSize, DEFAULT_BATCH_TOKENS, DEFAULT_BEAM_SIZE};
use crate::dataset::read_lines;
use crate::languages::LanguagePair;
use crate::writer::{check_output, sibling_path, LineWriter};

#[derive(Debug, Clone)]
pub struct TranslateFileOptions {
    pub pair: LanguagePair,
    pub input: PathBuf,
    pub force: bool,
    pub device_indices: Vec<i32>,
    /// Tokens per batch.
    pub batch_size: usize,
    pub model_size: NllbModelSize,
    pub beam_size: usize,
    pub datasets_dir: PathBuf,
}

impl TranslateFileOptions {
    pub fn new(pair: LanguagePair, input: impl Into<PathBuf>) -> Self {
        Self {
            pair,
            input: input.into(),
            force: false,
            device_indices: vec![0],
            batch_size: DEFAULT_BATCH_TOKENS,
            model_size: NllbModelSize::Distilled600M,
            beam_size: DEFAULT_BEAM_SIZE,
            datasets_dir: DataConfig::default().datasets_dir,
        }
    }

    /// `<input>.nllb.<to>`
    pub fn output_path(&self) -> PathBuf {
        sibling_path(&self.input, &format!("nllb.{}", self.pair.to))
    }
}

/// Translates `input` line by line with an NLLB model and returns the path
/// written. Nothing is written unless every line translated.
#[instrument(skip_all, fields(pair = %options.pair, input = %options.input.display()))]
pub fn translate_file<R, T>(options: &TranslateFileOptions) -> Result<PathBuf>
where
    R: TranslatorRunnerTrait,
    T: SubwordTokenizer,
{
    let (src_lang, tgt_lang) = options.pair.flores_codes()?;
    let output = options.output_path();
    check_output(&output, options.force)?;

    let model_path = options.model_size.model_path(&options.datasets_dir);
    let tokenizer_path = DataConfig::flores(&options.datasets_dir).spm_model_path();
    let config = RunnerConfig::new(&model_path)
        .with_device(DeviceKind::Auto)
        .with_device_indices(options.device_indices.clone());

    let mut pipeline = TranslationPipeline::<R, T>::new(config, tokenizer_path);
    pipeline
        .load()
        .with_context(|| format!("Failed to load {}", model_path.display()))?;

    let lines: Vec<String> = read_lines(&options.input)?
        .iter()
        .map(|l| l.trim().to_string())
        .collect();
    info!("Translating {} lines {} -> {}", lines.len(), src_lang, tgt_lang);

    let pipeline_options =
        PipelineOptions::multilingual(src_lang, tgt_lang, options.beam_size, options.batch_size);
    let translations = pipeline.translate(&lines, &pipeline_options)?;

    write_translations(&output, options.force, &translations)?;
    Ok(output)
}

fn write_translations(path: &Path, force: bool, lines: &[String]) -> Result<()> {
    let mut writer = LineWriter::create(path, force)?;
    writer.write_all(lines)?;
    let written = writer.close()?;
    info!("Wrote {} lines to {}", written, path.display());
    Ok(())
}
