//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for intellitrain-server.
///
/// Every field has a default so the server runs without any environment
/// variables set: spectral audio embeddings, pooled image features, SQLite
/// in the working directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5001"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://intellitrain.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rotated log files; stdout only when unset.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated allowed origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    pub enable_swagger: bool,

    pub max_upload_size_mb: usize,

    /// YAMNet-style ONNX graph. `None` selects the built-in spectral embedder.
    pub audio_embedder_model: Option<PathBuf>,
    pub audio_embedding_dim: usize,

    /// MobileNet-style ONNX graph. `None` selects the built-in pooled backbone.
    pub image_backbone_model: Option<PathBuf>,
    pub image_feature_dim: usize,

    pub audio_epochs: usize,
    pub image_epochs: usize,
    pub image_fine_tune_layers: usize,

    /// Number of augmented copies stored per image upload with `augment=true`.
    pub augment_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5001".to_owned(),
            database_url: "sqlite://intellitrain.db".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
            max_upload_size_mb: 50,
            audio_embedder_model: None,
            audio_embedding_dim: 1024,
            image_backbone_model: None,
            image_feature_dim: 1280,
            audio_epochs: 50,
            image_epochs: 5,
            image_fine_tune_layers: 0,
            augment_count: 5,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_address: env_or("INTELLITRAIN_BIND", &d.bind_address),
            database_url: env_or("INTELLITRAIN_DATABASE_URL", &d.database_url),
            log_level: env_or("INTELLITRAIN_LOG", &d.log_level),
            log_json: env_flag("INTELLITRAIN_LOG_JSON", d.log_json),
            log_dir: env_path("INTELLITRAIN_LOG_DIR"),
            cors_allowed_origins: std::env::var("INTELLITRAIN_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("INTELLITRAIN_ENABLE_SWAGGER", d.enable_swagger),
            max_upload_size_mb: parse_env("INTELLITRAIN_MAX_UPLOAD_SIZE_MB", d.max_upload_size_mb),
            audio_embedder_model: env_path("INTELLITRAIN_AUDIO_EMBEDDER_MODEL"),
            audio_embedding_dim: parse_env("INTELLITRAIN_AUDIO_EMBEDDING_DIM", d.audio_embedding_dim),
            image_backbone_model: env_path("INTELLITRAIN_IMAGE_BACKBONE_MODEL"),
            image_feature_dim: parse_env("INTELLITRAIN_IMAGE_FEATURE_DIM", d.image_feature_dim),
            audio_epochs: parse_env("INTELLITRAIN_AUDIO_EPOCHS", d.audio_epochs),
            image_epochs: parse_env("INTELLITRAIN_IMAGE_EPOCHS", d.image_epochs),
            image_fine_tune_layers: parse_env("INTELLITRAIN_IMAGE_FINE_TUNE_LAYERS", d.image_fine_tune_layers),
            augment_count: parse_env("INTELLITRAIN_AUGMENT_COUNT", d.augment_count),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_address, "0.0.0.0:5001");
        assert_eq!(cfg.max_upload_bytes(), 50 * 1024 * 1024);
        assert_eq!((cfg.audio_epochs, cfg.image_epochs), (50, 5));
        assert!(cfg.audio_embedder_model.is_none());
    }

    #[test]
    fn unparsable_values_fall_back() {
        assert_eq!(parse_env("INTELLITRAIN_TEST_UNSET_NUMBER", 7usize), 7);
        assert!(env_flag("INTELLITRAIN_TEST_UNSET_FLAG", true));
    }
}
