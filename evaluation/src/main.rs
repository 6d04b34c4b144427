use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ct2_runner::{Ct2Runner, SentencePieceTokenizer, SubwordTokenizer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use evaluation::config::{require_engine, DEFAULT_BATCH_TOKENS, DEFAULT_BEAM_SIZE};
use evaluation::dataset::ensure_spm_model;
use evaluation::packages::select;
use evaluation::tasks::flores::{FloresOptions, SentenceFilter};
use evaluation::tasks::nllb::{evaluate_nllb, NllbOptions};
use evaluation::tasks::sample::sample_corpus;
use evaluation::tasks::translate_file::{translate_file, TranslateFileOptions};
use evaluation::writer::check_output;
use evaluation::{
    evaluate_packages, BleuScorer, BleuTokenize, DataConfig, EvalError, EvaluationConfig,
    FloresDataset, LanguagePair, ModelSelection, NllbModelSize, PackageRegistry,
};

#[derive(Parser)]
#[command(name = "flores-eval")]
#[command(version)]
#[command(about = "BLEU evaluation of translation models on FLORES-200")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score installed translation packages on FLORES-200
    Evaluate {
        /// `all`, or a comma-separated list of pairs such as en-it,de-en
        #[arg(long, default_value = "all")]
        models: ModelSelection,

        /// Only evaluate the sentence at this index
        #[arg(long)]
        sentence: Option<usize>,

        /// Translate this text instead of the benchmark
        #[arg(long)]
        text: Option<String>,

        #[arg(long, default_value = "datasets")]
        datasets_dir: PathBuf,

        /// Defaults to $ARGOS_PACKAGES_DIR or the per-user data directory
        #[arg(long)]
        packages_dir: Option<PathBuf>,

        /// Pairs evaluated at once (defaults to the CPU count)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also write the final scores to this JSON file
        #[arg(long)]
        scores_json: Option<PathBuf>,
    },

    /// Evaluate one pair with a multilingual NLLB model
    Nllb {
        #[arg(default_value = "en-it")]
        model: LanguagePair,

        #[arg(long)]
        sentence: Option<usize>,

        #[arg(long, value_enum, default_value = "600M")]
        model_size: NllbModelSize,

        #[arg(long, default_value_t = DEFAULT_BEAM_SIZE)]
        beam_size: usize,

        #[arg(long, default_value = "datasets")]
        datasets_dir: PathBuf,
    },

    /// Translate a text file line by line with NLLB
    Translate {
        /// Pair to translate, e.g. en-it
        model: LanguagePair,

        file: PathBuf,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,

        /// CUDA devices to use, e.g. 0,1
        #[arg(long, value_delimiter = ',', default_value = "0")]
        device_index: Vec<i32>,

        /// Maximum tokens per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_TOKENS)]
        batch_size: usize,

        #[arg(long, value_enum, default_value = "600M")]
        model_size: NllbModelSize,

        #[arg(long, default_value_t = DEFAULT_BEAM_SIZE)]
        beam_size: usize,

        #[arg(long, default_value = "datasets")]
        datasets_dir: PathBuf,
    },

    /// Randomly sample aligned lines from two parallel files
    Sample {
        source: PathBuf,
        target: PathBuf,
        samples: usize,

        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let engine = ct2_runner::engine_available();
    if !engine {
        warn!("Built without the use_ct2 feature; only `sample` is available");
    }

    match cli.command {
        Command::Evaluate {
            models,
            sentence,
            text,
            datasets_dir,
            packages_dir,
            concurrency,
            scores_json,
        } => {
            require_engine(engine, "evaluate")?;
            let mut config = EvaluationConfig::flores();
            config.data = DataConfig::flores(datasets_dir);
            if let Some(limit) = concurrency {
                config.concurrency = limit.max(1);
            }
            let filter = SentenceFilter { sentence, text };
            let packages_dir = packages_dir.unwrap_or_else(PackageRegistry::default_dir);
            run_evaluate(&config, &models, filter, &packages_dir, scores_json.as_deref())?;
        }

        Command::Nllb {
            model,
            sentence,
            model_size,
            beam_size,
            datasets_dir,
        } => {
            require_engine(engine, "nllb")?;
            let data = DataConfig::flores(&datasets_dir);
            let dataset = FloresDataset::from_config(&data);
            dataset.ensure_available()?;
            let scorer = flores200_scorer(&data)?;

            let options = NllbOptions {
                pair: model,
                sentence,
                model_size,
                beam_size,
                datasets_dir,
            };
            let nllb = evaluate_nllb::<Ct2Runner, SentencePieceTokenizer>(&dataset, &scorer, &options)?;
            println!("{}", nllb.first_pieces_line());
            println!();
            println!("{}", nllb.sample());
            println!("{}", nllb.report.summary());
        }

        Command::Translate {
            model,
            file,
            force,
            device_index,
            batch_size,
            model_size,
            beam_size,
            datasets_dir,
        } => {
            require_engine(engine, "translate")?;
            let options = TranslateFileOptions {
                pair: model,
                input: file,
                force,
                device_indices: device_index,
                batch_size,
                model_size,
                beam_size,
                datasets_dir,
            };
            check_output(&options.output_path(), options.force)?;
            let data = DataConfig::flores(&options.datasets_dir);
            ensure_spm_model(&data.spm_model_path(), &data.spm_url)?;

            let output = translate_file::<Ct2Runner, SentencePieceTokenizer>(&options)?;
            println!("Wrote {}", output.display());
        }

        Command::Sample {
            source,
            target,
            samples,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let report = sample_corpus(&source, &target, samples, &mut rng)?;
            println!("Wrote {}", report.source_out.display());
            println!("Wrote {}", report.target_out.display());
        }
    }

    Ok(())
}

/// BLEU over pieces of the FLORES-200 SentencePiece model, fetched if missing.
fn flores200_scorer(data: &DataConfig) -> Result<BleuScorer> {
    let spm_path = data.spm_model_path();
    ensure_spm_model(&spm_path, &data.spm_url)?;
    let tokenizer = SentencePieceTokenizer::load(&spm_path)
        .with_context(|| format!("Failed to load {}", spm_path.display()))?;
    Ok(BleuScorer::new(BleuTokenize::Flores200(Arc::new(tokenizer))))
}

fn run_evaluate(
    config: &EvaluationConfig,
    models: &ModelSelection,
    filter: SentenceFilter,
    packages_dir: &Path,
    scores_json: Option<&Path>,
) -> Result<()> {
    let dataset = FloresDataset::from_config(&config.data);
    dataset.ensure_available()?;
    let scorer = flores200_scorer(&config.data)?;

    let registry = PackageRegistry::new(packages_dir);
    info!("Looking for packages in {}", registry.dir().display());
    let packages = select(registry.discover()?, models);
    if packages.is_empty() {
        return Err(EvalError::NoPackages.into());
    }

    println!("Evaluating:");
    for package in &packages {
        println!(" - {}", package);
    }

    let options = FloresOptions {
        filter,
        beam_size: config.beam_size,
    };
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let summary = runtime.block_on(evaluate_packages::<Ct2Runner, SentencePieceTokenizer>(
        packages,
        Arc::new(dataset),
        Arc::new(scorer),
        Arc::new(options),
        config.concurrency,
    ));

    println!();
    for (pair, score) in &summary.scores {
        println!("{}: {:?}", pair, score);
    }

    if let Some(path) = scores_json {
        let json = serde_json::to_string_pretty(&summary.scores)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved scores to {}", path.display());
    }

    if !summary.failures.is_empty() {
        let failed: Vec<&str> = summary.failures.iter().map(|(pair, _)| pair.as_str()).collect();
        bail!(
            "{} of {} pairs failed: {}",
            failed.len(),
            failed.len() + summary.scores.len(),
            failed.join(", ")
        );
    }
    Ok(())
}
