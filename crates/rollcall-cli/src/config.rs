use std::path::PathBuf;

/// Default maximum descriptor distance still considered the same identity.
/// The conventional operating point for this descriptor family.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Process configuration, loaded from environment variables. Command-line
/// flags override these per invocation.
pub struct Config {
    /// Directory containing the three ONNX model files.
    pub model_dir: PathBuf,
    /// Match tolerance (maximum Euclidean distance).
    pub tolerance: f32,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| rollcall_core::default_model_dir());

        Self {
            model_dir,
            tolerance: env_f32("ROLLCALL_TOLERANCE", DEFAULT_TOLERANCE),
        }
    }

    /// Apply per-invocation flag overrides.
    pub fn with_overrides(mut self, model_dir: Option<PathBuf>, tolerance: Option<f32>) -> Self {
        if let Some(dir) = model_dir {
            self.model_dir = dir;
        }
        if let Some(t) = tolerance {
            self.tolerance = t;
        }
        self
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let config = Config {
            model_dir: PathBuf::from("/env/models"),
            tolerance: 0.6,
        };
        let config = config.with_overrides(Some(PathBuf::from("/flag/models")), Some(0.45));
        assert_eq!(config.model_dir, PathBuf::from("/flag/models"));
        assert_eq!(config.tolerance, 0.45);
    }

    #[test]
    fn test_no_overrides_keep_env_values() {
        let config = Config {
            model_dir: PathBuf::from("/env/models"),
            tolerance: 0.6,
        };
        let config = config.with_overrides(None, None);
        assert_eq!(config.model_dir, PathBuf::from("/env/models"));
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
    }
}
