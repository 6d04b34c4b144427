use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::EvalError;

/// `<input>.<suffix>` next to the input file.
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Fails with `OutputExists` unless `force` is set.
pub fn check_output(path: &Path, force: bool) -> Result<(), EvalError> {
    if path.exists() && !force {
        return Err(EvalError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Writes one entry per line, `\n`-terminated.
pub struct LineWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl LineWriter {
    /// Without `force` the file must not exist yet, even if it appeared
    /// after `check_output`.
    pub fn create(path: &Path, force: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true);
        if force {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                anyhow::Error::from(EvalError::OutputExists(path.to_path_buf()))
            } else {
                anyhow::Error::from(e).context(format!("Failed to create file: {}", path.display()))
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    pub fn write_all<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Flushes and returns the number of lines written.
    pub fn close(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.lines)
    }
}
