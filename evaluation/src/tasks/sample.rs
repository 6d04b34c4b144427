use anyhow::Result;
use rand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dataset::read_lines;
use crate::error::EvalError;
use crate::writer::{check_output, sibling_path, LineWriter};

#[derive(Debug)]
pub struct SampleReport {
    pub source_out: PathBuf,
    pub target_out: PathBuf,
    pub written: usize,
}

/// `<input>.sampled.<samples>`
pub fn sampled_path(input: &Path, samples: usize) -> PathBuf {
    sibling_path(input, &format!("sampled.{}", samples))
}

/// Draws `samples` indices below `len` with replacement. A repeated draw is
/// dropped, not redrawn, so the result can be shorter than `samples`.
pub fn draw_indices<G: Rng + ?Sized>(len: usize, samples: usize, rng: &mut G) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    let mut picked = Vec::new();
    for _ in 0..samples {
        let r = rng.random_range(0..len);
        if seen.insert(r) {
            picked.push(r);
        }
    }
    picked
}

/// Writes the same random lines of two aligned files to
/// `<file>.sampled.<samples>`.
pub fn sample_corpus<G: Rng + ?Sized>(
    source: &Path,
    target: &Path,
    samples: usize,
    rng: &mut G,
) -> Result<SampleReport> {
    let source_out = sampled_path(source, samples);
    let target_out = sampled_path(target, samples);
    if source_out == target_out {
        return Err(EvalError::SameSourceAndTarget(source.to_path_buf()).into());
    }
    check_output(&source_out, false)?;
    check_output(&target_out, false)?;

    info!("Reading {}", source.display());
    let source_lines: Vec<String> = read_lines(source)?
        .iter()
        .map(|l| l.trim().to_string())
        .collect();
    info!("Reading {}", target.display());
    let target_lines: Vec<String> = read_lines(target)?
        .iter()
        .map(|l| l.trim().to_string())
        .collect();

    if source_lines.len() != target_lines.len() {
        return Err(EvalError::LineCountMismatch {
            source_lines: source_lines.len(),
            target_lines: target_lines.len(),
        }
        .into());
    }

    let picked = draw_indices(source_lines.len(), samples, rng);

    let mut source_writer = LineWriter::create(&source_out, false)?;
    let mut target_writer = LineWriter::create(&target_out, false)?;
    for &i in &picked {
        source_writer.write_line(&source_lines[i])?;
        target_writer.write_line(&target_lines[i])?;
    }
    source_writer.close()?;
    let written = target_writer.close()?;

    Ok(SampleReport {
        source_out,
        target_out,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::tempdir;

    fn write_corpus(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
        let source = dir.join("corpus.en");
        let target = dir.join("corpus.it");
        let src: Vec<String> = (0..n).map(|i| format!("source {}", i)).collect();
        let tgt: Vec<String> = (0..n).map(|i| format!("  target {} ", i)).collect();
        fs::write(&source, src.join("\n") + "\n").unwrap();
        fs::write(&target, tgt.join("\n") + "\n").unwrap();
        (source, target)
    }

    #[test]
    fn outputs_stay_aligned() -> Result<()> {
        let temp_dir = tempdir()?;
        let (source, target) = write_corpus(temp_dir.path(), 50);
        let mut rng = StdRng::seed_from_u64(7);

        let report = sample_corpus(&source, &target, 20, &mut rng)?;
        assert_eq!(report.source_out, temp_dir.path().join("corpus.en.sampled.20"));

        let src = read_lines(&report.source_out)?;
        let tgt = read_lines(&report.target_out)?;
        assert_eq!(src.len(), tgt.len());
        assert_eq!(src.len(), report.written);
        assert!(report.written <= 20 && report.written > 0);
        for (s, t) in src.iter().zip(&tgt) {
            let s_idx = s.trim_start_matches("source ");
            let t_idx = t.trim_start_matches("target ");
            assert_eq!(s_idx, t_idx);
        }
        Ok(())
    }

    #[test]
    fn refuses_existing_destination() -> Result<()> {
        let temp_dir = tempdir()?;
        let (source, target) = write_corpus(temp_dir.path(), 5);
        fs::write(sampled_path(&target, 3), "keep")?;

        let err = sample_corpus(&source, &target, 3, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::OutputExists(_))));
        assert!(!sampled_path(&source, 3).exists());
        assert_eq!(fs::read_to_string(sampled_path(&target, 3))?, "keep");
        Ok(())
    }

    #[test]
    fn mismatched_line_counts_fail() -> Result<()> {
        let temp_dir = tempdir()?;
        let source = temp_dir.path().join("a.txt");
        let target = temp_dir.path().join("b.txt");
        fs::write(&source, "1\n2\n3\n")?;
        fs::write(&target, "1\n2\n")?;

        let err = sample_corpus(&source, &target, 2, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::LineCountMismatch {
                source_lines: 3,
                target_lines: 2
            })
        ));
        assert!(!sampled_path(&source, 2).exists());
        Ok(())
    }

    #[test]
    fn duplicates_are_skipped_not_redrawn() {
        let mut rng = StdRng::seed_from_u64(42);
        let picked = draw_indices(3, 100, &mut rng);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), picked.len());
        assert!(picked.len() <= 3);
        assert!(picked.iter().all(|&i| i < 3));

        assert!(draw_indices(0, 10, &mut rng).is_empty());
        assert!(draw_indices(10, 0, &mut rng).is_empty());
    }

    #[test]
    fn same_file_twice_is_refused_without_output() -> Result<()> {
        let temp_dir = tempdir()?;
        let (source, _) = write_corpus(temp_dir.path(), 5);

        let err = sample_corpus(&source, &source, 2, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::SameSourceAndTarget(_))
        ));
        assert!(!sampled_path(&source, 2).exists());
        Ok(())
    }
}
