use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::debug;

/// Bar over evaluated pairs with a running sentences/sec figure.
pub struct ProgressTracker {
    bar: ProgressBar,
    start_time: Instant,
    sentences_translated: usize,
    completed_pairs: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) - {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }

        Self {
            bar,
            start_time: Instant::now(),
            sentences_translated: 0,
            completed_pairs: 0,
        }
    }

    pub fn update(&mut self, message: impl Into<String>) {
        self.completed_pairs += 1;
        self.bar.inc(1);

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let current_rate = self.sentences_translated as f64 / elapsed;

        let msg = format!("{} - {:.2} sentences/sec", message.into(), current_rate);
        self.bar.set_message(msg);
    }

    pub fn add_sentences(&mut self, sentences: usize) {
        self.sentences_translated += sentences;
    }

    /// Prints above the bar without tearing it.
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.suspend(|| println!("{}", line.as_ref()));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();

        let total_elapsed = self.start_time.elapsed().as_secs_f64();
        debug!(
            "Translated {} sentences across {} pairs in {:.2}s ({:.2} sentences/sec)",
            self.sentences_translated,
            self.completed_pairs,
            total_elapsed,
            self.sentences_translated as f64 / total_elapsed
        );
    }
}
