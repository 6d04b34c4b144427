use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::EvalError;
use crate::languages::LanguagePair;

const METADATA_FILE: &str = "metadata.json";
const PACKAGES_DIR_ENV: &str = "ARGOS_PACKAGES_DIR";

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    from_code: String,
    to_code: String,
    #[serde(default)]
    from_name: Option<String>,
    #[serde(default)]
    to_name: Option<String>,
    #[serde(default)]
    package_version: Option<String>,
}

/// An installed translation package: a CTranslate2 model plus its
/// SentencePiece model.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub from_code: String,
    pub to_code: String,
    pub from_name: Option<String>,
    pub to_name: Option<String>,
    pub package_version: Option<String>,
    pub path: PathBuf,
}

impl Package {
    pub fn pair(&self) -> LanguagePair {
        LanguagePair::new(&self.from_code, &self.to_code)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.path.join("model")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.path.join("sentencepiece.model")
    }

    fn from_dir(dir: &Path) -> Result<Self> {
        let metadata_path = dir.join(METADATA_FILE);
        let raw = fs::read_to_string(&metadata_path)
            .with_context(|| format!("Failed to read {}", metadata_path.display()))?;
        let metadata: PackageMetadata = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", metadata_path.display()))?;
        Ok(Self {
            from_code: metadata.from_code,
            to_code: metadata.to_code,
            from_name: metadata.from_name,
            to_name: metadata.to_name,
            package_version: metadata.package_version,
            path: dir.to_path_buf(),
        })
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.from_name, &self.to_name) {
            (Some(from), Some(to)) => write!(f, "{} → {}", from, to),
            _ => write!(f, "{}", self.pair()),
        }
    }
}

/// Installed packages under one directory.
#[derive(Debug, Clone)]
pub struct PackageRegistry {
    dir: PathBuf,
}

impl PackageRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$ARGOS_PACKAGES_DIR`, else the Argos Translate data directory.
    pub fn default_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(PACKAGES_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("argos-translate")
            .join("packages")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every sub-directory with a readable `metadata.json`, sorted by path.
    pub fn discover(&self) -> Result<Vec<Package>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list packages in {}", self.dir.display()))?;

        let mut packages = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.join(METADATA_FILE).is_file() {
                continue;
            }
            match Package::from_dir(&path) {
                Ok(package) => packages.push(package),
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }
        packages.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Discovered {} packages in {}", packages.len(), self.dir.display());
        Ok(packages)
    }
}

/// Which pairs to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSelection {
    All,
    Pairs(Vec<LanguagePair>),
}

impl FromStr for ModelSelection {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "all" {
            return Ok(ModelSelection::All);
        }
        s.split(',')
            .map(LanguagePair::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(ModelSelection::Pairs)
    }
}

impl ModelSelection {
    pub fn matches(&self, package: &Package) -> bool {
        match self {
            ModelSelection::All => true,
            ModelSelection::Pairs(pairs) => pairs
                .iter()
                .any(|p| p.from == package.from_code && p.to == package.to_code),
        }
    }
}

/// Keeps installed packages that match the selection, in registry order.
pub fn select(packages: Vec<Package>, selection: &ModelSelection) -> Vec<Package> {
    if *selection == ModelSelection::All {
        return packages;
    }
    let total = packages.len();
    let selected: Vec<Package> = packages
        .into_iter()
        .filter(|p| selection.matches(p))
        .collect();
    info!("Found {} matching models (out of {})", selected.len(), total);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn install(root: &Path, name: &str, from: &str, to: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(METADATA_FILE),
            format!(
                r#"{{"package_version": "1.9", "from_code": "{}", "to_code": "{}", "from_name": "From", "to_name": "To"}}"#,
                from, to
            ),
        )
        .unwrap();
    }

    #[test]
    fn discovers_installed_packages() -> Result<()> {
        let temp_dir = tempdir()?;
        install(temp_dir.path(), "translate-en_it-1_9", "en", "it");
        install(temp_dir.path(), "translate-de_en-1_0", "de", "en");
        fs::create_dir_all(temp_dir.path().join("not-a-package"))?;
        fs::create_dir_all(temp_dir.path().join("broken"))?;
        fs::write(temp_dir.path().join("broken").join(METADATA_FILE), "{")?;

        let packages = PackageRegistry::new(temp_dir.path()).discover()?;
        let pairs: Vec<String> = packages.iter().map(|p| p.pair().to_string()).collect();
        assert_eq!(pairs, vec!["de-en", "en-it"]);
        assert_eq!(packages[1].package_version.as_deref(), Some("1.9"));
        assert_eq!(
            packages[1].tokenizer_path(),
            temp_dir.path().join("translate-en_it-1_9").join("sentencepiece.model")
        );
        Ok(())
    }

    #[test]
    fn missing_registry_dir_is_an_error() {
        let registry = PackageRegistry::new("/nonexistent/argos/packages");
        assert!(registry.discover().is_err());
    }

    #[test]
    fn selection_parsing() {
        assert_eq!("all".parse::<ModelSelection>().unwrap(), ModelSelection::All);
        assert_eq!(
            "en-it,de-en".parse::<ModelSelection>().unwrap(),
            ModelSelection::Pairs(vec![LanguagePair::new("en", "it"), LanguagePair::new("de", "en")])
        );
        assert!(matches!(
            "en".parse::<ModelSelection>(),
            Err(EvalError::InvalidModelSpec(_))
        ));
    }

    #[test]
    fn select_intersects_with_installed() -> Result<()> {
        let temp_dir = tempdir()?;
        install(temp_dir.path(), "a", "en", "it");
        install(temp_dir.path(), "b", "de", "en");
        install(temp_dir.path(), "c", "en", "fr");
        let packages = PackageRegistry::new(temp_dir.path()).discover()?;

        let selection: ModelSelection = "en-fr,en-it,ja-en".parse()?;
        let selected = select(packages.clone(), &selection);
        let pairs: Vec<String> = selected.iter().map(|p| p.pair().to_string()).collect();
        assert_eq!(pairs, vec!["en-it", "en-fr"]);

        assert_eq!(select(packages, &ModelSelection::All).len(), 3);
        Ok(())
    }
}
