use std::path::PathBuf;

/// Where the engine should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// CUDA when at least one device is visible, CPU otherwise.
    Auto,
    Cpu,
    Cuda,
}

/// How `max_batch_size` is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Examples,
    Tokens,
}

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub model_path: PathBuf,
    pub device: DeviceKind,
    /// Only used on CUDA.
    pub device_indices: Vec<i32>,
    pub threads: usize,
}

impl RunnerConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            device: DeviceKind::Auto,
            device_indices: vec![0],
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }

    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = device;
        self
    }

    pub fn with_device_indices(mut self, device_indices: Vec<i32>) -> Self {
        if !device_indices.is_empty() {
            self.device_indices = device_indices;
        }
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

/// Decoding options handed to the engine.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub beam_size: usize,
    pub batch_kind: BatchKind,
    /// 0 lets the engine pick.
    pub max_batch_size: usize,
    pub return_scores: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            beam_size: 4,
            batch_kind: BatchKind::Examples,
            max_batch_size: 0,
            return_scores: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_device_indices_keep_default() {
        let config = RunnerConfig::new("model").with_device_indices(vec![]);
        assert_eq!(config.device_indices, vec![0]);

        let config = RunnerConfig::new("model").with_device_indices(vec![1, 2]);
        assert_eq!(config.device_indices, vec![1, 2]);
    }

    #[test]
    fn threads_never_zero() {
        assert_eq!(RunnerConfig::new("model").with_threads(0).threads, 1);
    }
}
