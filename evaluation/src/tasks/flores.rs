use anyhow::{Context, Result};
use ct2_runner::{
    start_translator_actor, PipelineOptions, RunnerConfig, SubwordTokenizer, TranslationPipeline,
    TranslatorRunnerTrait,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bleu::{BleuScore, BleuScorer};
use crate::config::{round_score, DEFAULT_BEAM_SIZE};
use crate::dataset::FloresDataset;
use crate::error::EvalError;
use crate::languages::LanguagePair;
use crate::packages::Package;

/// Restricts the benchmark to one sentence, or replaces it with ad hoc text.
#[derive(Debug, Clone, Default)]
pub struct SentenceFilter {
    pub sentence: Option<usize>,
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FloresOptions {
    pub filter: SentenceFilter,
    pub beam_size: usize,
}

impl Default for FloresOptions {
    fn default() -> Self {
        Self {
            filter: SentenceFilter::default(),
            beam_size: DEFAULT_BEAM_SIZE,
        }
    }
}

/// Checks alignment, then applies `--sentence` and `--text` in that order.
pub fn select_sentences(
    source: Vec<String>,
    reference: Vec<String>,
    filter: &SentenceFilter,
) -> Result<(Vec<String>, Vec<String>), EvalError> {
    if source.len() != reference.len() {
        return Err(EvalError::LineCountMismatch {
            source_lines: source.len(),
            target_lines: reference.len(),
        });
    }

    let (mut source, mut reference) = (source, reference);
    if let Some(index) = filter.sentence {
        if index >= source.len() {
            return Err(EvalError::SentenceOutOfRange {
                index,
                len: source.len(),
            });
        }
        source = vec![source.swap_remove(index)];
        reference = vec![reference.swap_remove(index)];
    }
    if let Some(text) = &filter.text {
        source = vec![text.clone()];
        reference = vec![String::new()];
    }
    Ok((source, reference))
}

/// Outcome of one evaluated pair.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub pair: LanguagePair,
    pub source: String,
    pub reference: String,
    /// Every hypothesis joined with a space.
    pub hypothesis: String,
    pub sentences: usize,
    pub bleu: BleuScore,
    /// BLEU rounded to five decimals.
    pub score: f64,
}

impl PairReport {
    pub fn new(
        pair: LanguagePair,
        source: &[String],
        reference: &[String],
        hypotheses: &[String],
        bleu: BleuScore,
    ) -> Self {
        Self {
            pair,
            source: source.first().cloned().unwrap_or_default(),
            reference: reference.first().cloned().unwrap_or_default(),
            hypothesis: hypotheses.join(" "),
            sentences: hypotheses.len(),
            score: round_score(bleu.score),
            bleu,
        }
    }

    /// Source, reference and hypothesis, one bullet each.
    pub fn sample(&self) -> String {
        format!("• {}\n• {}\n• {}", self.source, self.reference, self.hypothesis)
    }

    /// `pair: score`, always with a decimal point (`en-it: 100.0`).
    pub fn summary(&self) -> String {
        format!("{}: {:?}", self.pair, self.score)
    }
}

pub fn score_hypotheses(
    scorer: &BleuScorer,
    hypotheses: &[String],
    reference: &[String],
) -> Result<BleuScore> {
    let references: Vec<Vec<String>> = reference.iter().map(|r| vec![r.clone()]).collect();
    scorer.corpus_bleu(hypotheses, &references)
}

/// Translates the FLORES sentences of one package on its own actor thread and
/// scores them.
pub async fn evaluate_package<R, T>(
    package: Package,
    dataset: Arc<FloresDataset>,
    scorer: Arc<BleuScorer>,
    options: Arc<FloresOptions>,
) -> Result<PairReport>
where
    R: TranslatorRunnerTrait + 'static,
    T: SubwordTokenizer + 'static,
{
    let pair = package.pair();
    let (source, reference) = dataset.load_pair(&pair)?;
    let (source, reference) = select_sentences(source, reference, &options.filter)?;
    debug!("{}: {} sentences", pair, source.len());

    let config = RunnerConfig::new(package.model_dir());
    let tokenizer_path = package.tokenizer_path();
    let (handle, join) =
        start_translator_actor(move || TranslationPipeline::<R, T>::new(config, tokenizer_path));

    handle
        .load_model()
        .await
        .with_context(|| format!("Failed to load {}", package.path.display()))?;
    let hypotheses = handle
        .translate(source.clone(), PipelineOptions::bilingual(options.beam_size))
        .await?;

    drop(handle);
    tokio::task::spawn_blocking(move || join.join())
        .await?
        .map_err(|_| anyhow::anyhow!("Translator thread for {} panicked", pair))?;

    let bleu = {
        let scorer = scorer.clone();
        let hypotheses = hypotheses.clone();
        let reference = reference.clone();
        tokio::task::spawn_blocking(move || score_hypotheses(&scorer, &hypotheses, &reference))
            .await??
    };
    info!("{}: {}", pair, bleu);

    Ok(PairReport::new(pair, &source, &reference, &hypotheses, bleu))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sentence_index_selects_one_pair() {
        let filter = SentenceFilter {
            sentence: Some(1),
            text: None,
        };
        let (src, tgt) =
            select_sentences(lines(&["a", "b", "c"]), lines(&["x", "y", "z"]), &filter).unwrap();
        assert_eq!(src, lines(&["b"]));
        assert_eq!(tgt, lines(&["y"]));
    }

    #[test]
    fn text_overrides_everything() {
        let filter = SentenceFilter {
            sentence: Some(0),
            text: Some("Ad hoc".to_string()),
        };
        let (src, tgt) = select_sentences(lines(&["a"]), lines(&["x"]), &filter).unwrap();
        assert_eq!(src, lines(&["Ad hoc"]));
        assert_eq!(tgt, lines(&[""]));
    }

    #[test]
    fn out_of_range_and_mismatch() {
        let filter = SentenceFilter {
            sentence: Some(2),
            text: None,
        };
        assert!(matches!(
            select_sentences(lines(&["a", "b"]), lines(&["x", "y"]), &filter),
            Err(EvalError::SentenceOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            select_sentences(lines(&["a", "b"]), lines(&["x"]), &SentenceFilter::default()),
            Err(EvalError::LineCountMismatch {
                source_lines: 2,
                target_lines: 1
            })
        ));
    }

    #[test]
    fn report_formats_sample_and_summary() {
        let bleu = crate::bleu::BleuScorer::new(crate::bleu::BleuTokenize::None)
            .corpus_bleu(&lines(&["a b c d"]), &[lines(&["a b c d"])])
            .unwrap();
        let report = PairReport::new(
            LanguagePair::new("en", "it"),
            &lines(&["Hello.", "Bye."]),
            &lines(&["Ciao.", "Addio."]),
            &lines(&["Ciao!", "Addio!"]),
            bleu,
        );
        assert_eq!(report.sample(), "• Hello.\n• Ciao.\n• Ciao! Addio!");
        assert_eq!(report.summary(), "en-it: 100.0");
        assert_eq!(report.sentences, 2);
    }

    #[test]
    fn fractional_scores_keep_their_digits() {
        let bleu = crate::bleu::BleuScorer::new(crate::bleu::BleuTokenize::None)
            .corpus_bleu(&lines(&["a b c d"]), &[lines(&["a b c d"])])
            .unwrap();
        let mut report = PairReport::new(
            LanguagePair::new("de", "en"),
            &lines(&["Hallo."]),
            &lines(&["Hello."]),
            &lines(&["Hello."]),
            bleu,
        );
        report.score = 12.34568;
        assert_eq!(report.summary(), "de-en: 12.34568");
    }
}
