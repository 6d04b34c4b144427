use std::path::PathBuf;
use thiserror::Error;

/// Conditions the user can fix by changing arguments or files.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    #[error("Invalid model '{0}', expected <from>-<to> (e.g. en-it)")]
    InvalidModelSpec(String),

    #[error("Files have different number of lines ({source_lines} vs. {target_lines})")]
    LineCountMismatch {
        source_lines: usize,
        target_lines: usize,
    },

    #[error("Sentence index {index} is out of range ({len} sentences)")]
    SentenceOutOfRange { index: usize, len: usize },

    #[error("File exists (use --force): {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Cannot download {url}. Please manually download it and place it in {}", .path.display())]
    DatasetUnavailable { url: String, path: PathBuf },

    #[error("No packages to evaluate")]
    NoPackages,

    #[error("'{0}' needs the CTranslate2 engine; rebuild with --features use_ct2")]
    EngineUnavailable(String),

    #[error("Source and target are the same file: {}", .0.display())]
    SameSourceAndTarget(PathBuf),
}
