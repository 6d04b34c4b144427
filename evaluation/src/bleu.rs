//! Corpus-level BLEU, computed the way sacreBLEU does it: clipped n-gram
//! counts up to order 4 summed over the corpus, closest reference length for
//! the brevity penalty, and `exp` smoothing for zero matches.

use anyhow::{bail, Result};
use ct2_runner::SubwordTokenizer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const MAX_NGRAM_ORDER: usize = 4;

/// Stand-in for log(0) so a zero precision drives the score to 0.
const LOG_ZERO: f64 = -9_999_999_999.0;

static REGEXP_13A: Lazy<[(Regex, &'static str); 4]> = Lazy::new(|| {
    [
        (Regex::new(r"([\{-~\[-` -&\(-\+:-@/])").unwrap(), " ${1} "),
        (Regex::new(r"([^0-9])([\.,])").unwrap(), "${1} ${2} "),
        (Regex::new(r"([\.,])([^0-9])").unwrap(), " ${1} ${2}"),
        (Regex::new(r"([0-9])(-)").unwrap(), "${1} ${2} "),
    ]
});

/// How sentences are split into words before counting n-grams.
#[derive(Clone)]
pub enum BleuTokenize {
    /// Whitespace only.
    None,
    /// The mteval-v13a rules.
    Mteval13a,
    /// Space-joined pieces of the FLORES-200 SentencePiece model.
    Flores200(Arc<dyn SubwordTokenizer + Send + Sync>),
}

impl fmt::Debug for BleuTokenize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BleuTokenize::None => "none",
            BleuTokenize::Mteval13a => "13a",
            BleuTokenize::Flores200(_) => "flores200",
        };
        f.write_str(name)
    }
}

impl BleuTokenize {
    pub fn tokenize(&self, line: &str) -> Result<Vec<String>> {
        let words = match self {
            BleuTokenize::None => line.split_whitespace().map(str::to_string).collect(),
            BleuTokenize::Mteval13a => tokenize_13a(line),
            BleuTokenize::Flores200(spm) => spm.encode(line)?,
        };
        Ok(words)
    }
}

fn tokenize_13a(line: &str) -> Vec<String> {
    let mut line = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if line.contains('&') {
        line = line
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }

    let mut line = format!(" {} ", line);
    for (re, replacement) in REGEXP_13A.iter() {
        line = re.replace_all(&line, *replacement).into_owned();
    }
    line.split_whitespace().map(str::to_string).collect()
}

fn ngram_counts(words: &[String], order: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if words.len() < order {
        return counts;
    }
    for ngram in words.windows(order) {
        *counts.entry(ngram).or_insert(0) += 1;
    }
    counts
}

/// Sufficient statistics and the final score.
#[derive(Debug, Clone, PartialEq)]
pub struct BleuScore {
    pub score: f64,
    pub counts: [usize; MAX_NGRAM_ORDER],
    pub totals: [usize; MAX_NGRAM_ORDER],
    pub precisions: [f64; MAX_NGRAM_ORDER],
    pub bp: f64,
    pub sys_len: usize,
    pub ref_len: usize,
}

impl BleuScore {
    fn from_counts(
        counts: [usize; MAX_NGRAM_ORDER],
        totals: [usize; MAX_NGRAM_ORDER],
        sys_len: usize,
        ref_len: usize,
    ) -> Self {
        let mut precisions = [0.0; MAX_NGRAM_ORDER];
        let mut smooth_mteval = 1.0;
        for n in 0..MAX_NGRAM_ORDER {
            if totals[n] == 0 {
                break;
            }
            if counts[n] == 0 {
                smooth_mteval *= 2.0;
                precisions[n] = 100.0 / (smooth_mteval * totals[n] as f64);
            } else {
                precisions[n] = 100.0 * counts[n] as f64 / totals[n] as f64;
            }
        }

        let bp = if sys_len < ref_len {
            if sys_len > 0 {
                (1.0 - ref_len as f64 / sys_len as f64).exp()
            } else {
                0.0
            }
        } else {
            1.0
        };

        let log_sum: f64 = precisions
            .iter()
            .map(|&p| if p == 0.0 { LOG_ZERO } else { p.ln() })
            .sum();
        let score = bp * (log_sum / MAX_NGRAM_ORDER as f64).exp();

        Self {
            score,
            counts,
            totals,
            precisions,
            bp,
            sys_len,
            ref_len,
        }
    }
}

impl fmt::Display for BleuScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precisions: Vec<String> = self.precisions.iter().map(|p| format!("{:.1}", p)).collect();
        let ratio = if self.ref_len > 0 {
            self.sys_len as f64 / self.ref_len as f64
        } else {
            0.0
        };
        write!(
            f,
            "BLEU = {:.2} {} (BP = {:.3} ratio = {:.3} hyp_len = {} ref_len = {})",
            self.score,
            precisions.join("/"),
            self.bp,
            ratio,
            self.sys_len,
            self.ref_len
        )
    }
}

#[derive(Debug, Clone)]
pub struct BleuScorer {
    tokenize: BleuTokenize,
}

impl BleuScorer {
    pub fn new(tokenize: BleuTokenize) -> Self {
        Self { tokenize }
    }

    /// `references[i]` holds every reference for `hypotheses[i]`.
    pub fn corpus_bleu(&self, hypotheses: &[String], references: &[Vec<String>]) -> Result<BleuScore> {
        if hypotheses.len() != references.len() {
            bail!(
                "Hypothesis and reference counts differ ({} vs. {})",
                hypotheses.len(),
                references.len()
            );
        }

        let mut counts = [0usize; MAX_NGRAM_ORDER];
        let mut totals = [0usize; MAX_NGRAM_ORDER];
        let (mut sys_len, mut ref_len) = (0usize, 0usize);

        for (hypothesis, refs) in hypotheses.iter().zip(references) {
            let hyp_words = self.tokenize.tokenize(hypothesis)?;
            let ref_words = refs
                .iter()
                .map(|r| self.tokenize.tokenize(r))
                .collect::<Result<Vec<_>>>()?;

            sys_len += hyp_words.len();
            ref_len += closest_ref_len(hyp_words.len(), &ref_words);

            for order in 1..=MAX_NGRAM_ORDER {
                let hyp_counts = ngram_counts(&hyp_words, order);
                let mut max_ref: HashMap<&[String], usize> = HashMap::new();
                for words in &ref_words {
                    for (ngram, count) in ngram_counts(words, order) {
                        let entry = max_ref.entry(ngram).or_insert(0);
                        *entry = (*entry).max(count);
                    }
                }

                counts[order - 1] += hyp_counts
                    .iter()
                    .map(|(ngram, &count)| count.min(max_ref.get(ngram).copied().unwrap_or(0)))
                    .sum::<usize>();
                totals[order - 1] += hyp_words.len().saturating_sub(order - 1);
            }
        }

        Ok(BleuScore::from_counts(counts, totals, sys_len, ref_len))
    }
}

/// Ties go to the shorter reference.
fn closest_ref_len(hyp_len: usize, refs: &[Vec<String>]) -> usize {
    refs.iter()
        .map(Vec::len)
        .min_by_key(|&len| ((len as isize - hyp_len as isize).abs(), len))
        .unwrap_or(0)
}
