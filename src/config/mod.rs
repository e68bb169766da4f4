use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the processing pipeline
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Directory holding transient uploads and generated reports (default: "./uploads")
    pub uploads_dir: PathBuf,

    /// Maximum request body size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Bound on copying one payload into the storage area (default: 30s)
    pub copy_timeout: Duration,

    /// Bound on transforming one file into rows (default: 60s)
    pub process_timeout: Duration,

    /// Bound on serializing the combined spreadsheet (default: 30s)
    pub serialize_timeout: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            copy_timeout: Duration::from_secs(30),
            process_timeout: Duration::from_secs(60),
            serialize_timeout: Duration::from_secs(30),
        }
    }
}

impl ProcessingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.uploads_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            copy_timeout: env::var("COPY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.copy_timeout),

            process_timeout: env::var("PROCESS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.process_timeout),

            serialize_timeout: env::var("SERIALIZE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.serialize_timeout),
        }
    }

    /// Config for tests: short timeouts, storage rooted wherever the test says
    pub fn development(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            max_file_size: 16 * 1024 * 1024,
            copy_timeout: Duration::from_secs(5),
            process_timeout: Duration::from_secs(10),
            serialize_timeout: Duration::from_secs(5),
        }
    }
}
