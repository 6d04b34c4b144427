use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::error::EvalError;
use crate::languages::LanguagePair;

const ARCHIVE_NAME: &str = "flores200.tar.gz";
const SPLIT: &str = "dev";

/// The FLORES-200 benchmark as unpacked under `<datasets>/flores200_dataset`.
#[derive(Debug, Clone)]
pub struct FloresDataset {
    datasets_dir: PathBuf,
    url: String,
}

impl FloresDataset {
    pub fn new(datasets_dir: impl Into<PathBuf>, url: &str) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
            url: url.to_string(),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(&config.datasets_dir, &config.dataset_url)
    }

    pub fn split_dir(&self) -> PathBuf {
        self.datasets_dir.join("flores200_dataset").join(SPLIT)
    }

    pub fn sentence_file(&self, flores_code: &str) -> PathBuf {
        self.split_dir().join(format!("{}.{}", flores_code, SPLIT))
    }

    pub fn is_available(&self) -> bool {
        self.split_dir().is_dir()
    }

    /// Downloads and unpacks the benchmark on first use.
    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            debug!("FLORES-200 found at {}", self.split_dir().display());
            return Ok(());
        }
        fs::create_dir_all(&self.datasets_dir).with_context(|| {
            format!("Failed to create {}", self.datasets_dir.display())
        })?;

        info!("Downloading flores200 dataset...");
        let archive = self.datasets_dir.join(ARCHIVE_NAME);
        download(&self.url, &archive)?;

        self.unpack(&archive)
    }

    /// Extracts a downloaded `.tar.gz` into the datasets directory, removes
    /// it, and checks that the split is now in place.
    pub fn unpack(&self, archive: &Path) -> Result<()> {
        let tar_gz = File::open(archive)
            .with_context(|| format!("Failed to open archive {}", archive.display()))?;
        let mut unpacked = tar::Archive::new(GzDecoder::new(tar_gz));
        unpacked
            .unpack(&self.datasets_dir)
            .context("Failed to extract flores200 archive")?;
        fs::remove_file(archive).ok();

        if !self.is_available() {
            return Err(EvalError::DatasetUnavailable {
                url: self.url.clone(),
                path: self.split_dir(),
            }
            .into());
        }
        info!("flores200 dataset ready");
        Ok(())
    }

    /// Lines of one language file, without line terminators.
    pub fn load_sentences(&self, flores_code: &str) -> Result<Vec<String>> {
        read_lines(&self.sentence_file(flores_code))
    }

    /// Source and reference sentences for a pair.
    pub fn load_pair(&self, pair: &LanguagePair) -> Result<(Vec<String>, Vec<String>)> {
        let (src_code, tgt_code) = pair.flores_codes()?;
        Ok((self.load_sentences(src_code)?, self.load_sentences(tgt_code)?))
    }
}

/// Fetches the FLORES-200 SentencePiece model unless it is already present.
pub fn ensure_spm_model(path: &Path, url: &str) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directory")?;
    }
    info!("Downloading {}", url);
    download(url, path)?;
    if !path.is_file() {
        return Err(EvalError::DatasetUnavailable {
            url: url.to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download {}", url))?;

    let bar = ProgressBar::new(response.content_length().unwrap_or(0));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    // Renamed into place only once complete.
    let partial = dest.with_extension("part");
    let mut file = BufWriter::new(
        File::create(&partial).with_context(|| format!("Failed to create {}", partial.display()))?,
    );
    let mut buffer = [0u8; 8192];
    loop {
        let n = response.read(&mut buffer).context("Failed to read response body")?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])?;
        bar.inc(n as u64);
    }
    file.flush()?;
    drop(file);
    bar.finish_and_clear();

    fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download to {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
        let mut builder = tar::Builder::new(GzEncoder::new(File::create(path)?, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, content.as_bytes())?;
        }
        builder.into_inner()?.finish()?;
        Ok(())
    }

    fn write_split(root: &Path, code: &str, lines: &[&str]) {
        let dir = root.join("flores200_dataset").join("dev");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.dev", code)), lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn loads_pair_from_existing_split() -> Result<()> {
        let temp_dir = tempdir()?;
        write_split(temp_dir.path(), "eng_Latn", &["Hello.", "Good morning."]);
        write_split(temp_dir.path(), "ita_Latn", &["Ciao.", "Buongiorno."]);

        let dataset = FloresDataset::new(temp_dir.path(), "http://127.0.0.1:9/unused");
        dataset.ensure_available()?;

        let (src, tgt) = dataset.load_pair(&LanguagePair::new("en", "it"))?;
        assert_eq!(src, vec!["Hello.", "Good morning."]);
        assert_eq!(tgt, vec!["Ciao.", "Buongiorno."]);
        Ok(())
    }

    #[test]
    fn missing_language_file_is_an_error() -> Result<()> {
        let temp_dir = tempdir()?;
        write_split(temp_dir.path(), "eng_Latn", &["Hello."]);
        let dataset = FloresDataset::new(temp_dir.path(), "http://127.0.0.1:9/unused");

        let err = dataset.load_pair(&LanguagePair::new("en", "de")).unwrap_err();
        assert!(err.to_string().contains("deu_Latn.dev"));
        Ok(())
    }

    #[test]
    fn unknown_language_is_reported_before_io() -> Result<()> {
        let temp_dir = tempdir()?;
        let dataset = FloresDataset::new(temp_dir.path(), "http://127.0.0.1:9/unused");
        let err = dataset.load_pair(&LanguagePair::new("en", "xx")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::UnknownLanguage(code)) if code == "xx"
        ));
        Ok(())
    }

    #[test]
    fn existing_spm_model_is_not_downloaded() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("spm.model");
        fs::write(&path, b"model")?;
        ensure_spm_model(&path, "http://127.0.0.1:9/unused")?;
        assert_eq!(fs::read(&path)?, b"model");
        Ok(())
    }

    #[test]
    fn unpacks_archive_and_removes_it() -> Result<()> {
        let temp_dir = tempdir()?;
        let archive = temp_dir.path().join(ARCHIVE_NAME);
        write_archive(
            &archive,
            &[
                ("flores200_dataset/dev/eng_Latn.dev", "Hello.\n"),
                ("flores200_dataset/dev/ita_Latn.dev", "Ciao.\n"),
            ],
        )?;

        let dataset = FloresDataset::new(temp_dir.path(), "http://127.0.0.1:9/unused");
        assert!(!dataset.is_available());
        dataset.unpack(&archive)?;

        assert!(dataset.is_available());
        assert!(!archive.exists());
        let (src, tgt) = dataset.load_pair(&LanguagePair::new("en", "it"))?;
        assert_eq!(src, vec!["Hello."]);
        assert_eq!(tgt, vec!["Ciao."]);
        Ok(())
    }

    #[test]
    fn archive_without_dev_split_is_unavailable() -> Result<()> {
        let temp_dir = tempdir()?;
        let archive = temp_dir.path().join(ARCHIVE_NAME);
        write_archive(&archive, &[("flores200_dataset/devtest/eng_Latn.devtest", "Hello.\n")])?;

        let dataset = FloresDataset::new(temp_dir.path(), "http://127.0.0.1:9/unused");
        let err = dataset.unpack(&archive).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::DatasetUnavailable { path, .. }) if *path == dataset.split_dir()
        ));
        assert!(!archive.exists());
        Ok(())
    }
}
