use anyhow::{Context, Result};
use ct2_runner::{
    PipelineOptions, RunnerConfig, SubwordTokenizer, TranslationPipeline, TranslatorRunnerTrait,
};
use std::path::PathBuf;
use tracing::{debug, instrument};

use crate::bleu::BleuScorer;
use crate::config::{DataConfig, NllbModelSize, DEFAULT_BATCH_TOKENS, DEFAULT_BEAM_SIZE};
use crate::dataset::FloresDataset;
use crate::languages::LanguagePair;
use crate::tasks::flores::{score_hypotheses, select_sentences, PairReport, SentenceFilter};

#[derive(Debug, Clone)]
pub struct NllbOptions {
    pub pair: LanguagePair,
    pub sentence: Option<usize>,
    pub model_size: NllbModelSize,
    pub beam_size: usize,
    pub datasets_dir: PathBuf,
}

impl NllbOptions {
    pub fn new(pair: LanguagePair) -> Self {
        Self {
            pair,
            sentence: None,
            model_size: NllbModelSize::Distilled600M,
            beam_size: DEFAULT_BEAM_SIZE,
            datasets_dir: DataConfig::default().datasets_dir,
        }
    }
}

/// One pair of FLORES through a multilingual NLLB model.
#[derive(Debug, Clone)]
pub struct NllbReport {
    /// Pieces of the first source sentence as sent to the engine.
    pub first_pieces: Vec<String>,
    pub first_hypothesis: String,
    pub report: PairReport,
}

impl NllbReport {
    pub fn first_pieces_line(&self) -> String {
        format!("First subworded source sentence:\n{:?}", self.first_pieces)
    }

    /// First source and its hypothesis.
    pub fn sample(&self) -> String {
        format!("• {}\n• {}", self.report.source, self.first_hypothesis)
    }
}

#[instrument(skip_all, fields(pair = %options.pair))]
pub fn evaluate_nllb<R, T>(
    dataset: &FloresDataset,
    scorer: &BleuScorer,
    options: &NllbOptions,
) -> Result<NllbReport>
where
    R: TranslatorRunnerTrait,
    T: SubwordTokenizer,
{
    let (src_lang, tgt_lang) = options.pair.flores_codes()?;
    let (source, reference) = dataset.load_pair(&options.pair)?;
    let filter = SentenceFilter {
        sentence: options.sentence,
        text: None,
    };
    let (source, reference) = select_sentences(source, reference, &filter)?;
    let source: Vec<String> = source.iter().map(|s| s.trim().to_string()).collect();

    let model_path = options.model_size.model_path(&options.datasets_dir);
    let tokenizer_path = DataConfig::flores(&options.datasets_dir).spm_model_path();
    let mut pipeline =
        TranslationPipeline::<R, T>::new(RunnerConfig::new(&model_path), tokenizer_path);
    pipeline
        .load()
        .with_context(|| format!("Failed to load {}", model_path.display()))?;

    let pipeline_options =
        PipelineOptions::multilingual(src_lang, tgt_lang, options.beam_size, DEFAULT_BATCH_TOKENS);
    let pieces = pipeline.encode(&source, &pipeline_options)?;
    let hypotheses = pipeline.translate_pieces(&pieces, &pipeline_options)?;
    debug!("Translated {} sentences", hypotheses.len());

    let bleu = score_hypotheses(scorer, &hypotheses, &reference)?;
    Ok(NllbReport {
        first_pieces: pieces.into_iter().next().unwrap_or_default(),
        first_hypothesis: hypotheses.first().cloned().unwrap_or_default(),
        report: PairReport::new(options.pair.clone(), &source, &reference, &hypotheses, bleu),
    })
}
