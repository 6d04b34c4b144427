pub mod bleu;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod languages;
pub mod packages;
pub mod progress;
pub mod tasks;
pub mod writer;

#[cfg(test)]
mod testing;

pub use bleu::{BleuScore, BleuScorer, BleuTokenize};
pub use config::{DataConfig, EvaluationConfig, NllbModelSize};
pub use dataset::FloresDataset;
pub use driver::{evaluate_packages, EvaluationSummary};
pub use error::EvalError;
pub use languages::LanguagePair;
pub use packages::{ModelSelection, Package, PackageRegistry};
