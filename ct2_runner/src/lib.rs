pub mod actor;
pub mod config;
pub mod pipeline;
pub mod tokenizer;

pub use config::{BatchKind, DecodeOptions, DeviceKind, RunnerConfig};
pub use pipeline::{PipelineOptions, TranslationPipeline};
pub use tokenizer::{SubwordTokenizer, WhitespaceTokenizer, WORD_BOUNDARY};

/// End-of-sentence marker appended to source pieces for multilingual models.
pub const EOS_TOKEN: &str = "</s>";

/// A blocking translation engine working on subword pieces.
pub trait TranslatorRunnerTrait {
    fn new(config: RunnerConfig) -> Self
    where
        Self: Sized;
    fn load_model(&mut self) -> anyhow::Result<()>;
    fn is_model_loaded(&self) -> bool;
    /// Returns the best hypothesis per source sequence.
    fn translate_batch(
        &self,
        source: &[Vec<String>],
        target_prefix: Option<&[Vec<String>]>,
        options: &DecodeOptions,
    ) -> anyhow::Result<Vec<Vec<String>>>;
}

#[cfg(feature = "use_ct2")]
pub mod runner;
#[cfg(feature = "use_ct2")]
pub use runner::{Ct2Runner, SentencePieceTokenizer};

#[cfg(not(feature = "use_ct2"))]
pub mod mock_runner;
#[cfg(not(feature = "use_ct2"))]
pub use mock_runner::{Ct2Runner, SentencePieceTokenizer};

/// Whether this build drives the real CTranslate2 engine.
pub const fn engine_available() -> bool {
    cfg!(feature = "use_ct2")
}

pub use actor::{start_translator_actor, TranslatorActorHandle, TranslatorCommand};
