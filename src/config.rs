//! Layered startup configuration.
//!
//! Sources, lowest to highest precedence:
//! - built-in defaults
//! - a TOML file (`law-rag.toml` in the working directory, or `--config`)
//! - `LAW_RAG_` environment variables, `__` separating nested keys
//!   (`LAW_RAG_GENERATION__MODEL=llama-3.1-8b-instant`)
//! - CLI flags, applied by `main`
//!
//! The generation API key never lives here; it is read from the variable
//! named by `generation.api_key_env` when the client is built.

use anyhow::{Result, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embedder::EncoderConfig;
use crate::llm::LLMConfig;
use crate::rag::DEFAULT_TOP_K;

pub const DEFAULT_CONFIG_FILE: &str = "law-rag.toml";
pub const ENV_PREFIX: &str = "LAW_RAG_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusConfig,
    pub encoder: EncoderConfig,
    pub generation: LLMConfig,
    pub retrieval: RetrievalConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON array of chunk texts.
    pub docs_path: PathBuf,
    /// `.npy` or `.json` matrix, one row per chunk.
    pub embeddings_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            docs_path: PathBuf::from("data/docs.json"),
            embeddings_path: PathBuf::from("data/embeddings.npy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub default: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load defaults, then the config file, then `LAW_RAG_*` overrides.
    ///
    /// An explicit `path` must exist; the implicit `law-rag.toml` is optional.
    /// Values are not checked here: call [`Settings::validate`] once the CLI
    /// flags have been applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                ensure!(path.exists(), "config file {} not found", path.display());
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::extract(&file, Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(file: &Path, env: Env) -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(env)
            .extract()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.retrieval.top_k >= 1, "retrieval.top_k must be at least 1");
        ensure!(
            self.generation.max_tokens >= 1,
            "generation.max_tokens must be at least 1"
        );
        ensure!(
            !self.generation.model.trim().is_empty(),
            "generation.model is required"
        );
        ensure!(
            !self.generation.api_key_env.trim().is_empty(),
            "generation.api_key_env is required"
        );
        ensure!(
            self.generation.timeout_secs >= 1,
            "generation.timeout_secs must be at least 1"
        );
        self.encoder.embedding_model()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.generation.model, "llama-3.3-70b-versatile");
        assert_eq!(settings.generation.temperature, 0.0);
        assert_eq!(settings.generation.max_tokens, 512);
        assert_eq!(settings.generation.api_key_env, "GROQ_API_KEY");
        assert_eq!(settings.encoder.model, "all-MiniLM-L6-v2");
        assert_eq!(settings.logging.default, "warn");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("law-rag.toml");
        fs::write(
            &path,
            "[corpus]\ndocs_path = \"corpus/chunks.json\"\n\n[retrieval]\ntop_k = 5\n",
        )?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.corpus.docs_path, PathBuf::from("corpus/chunks.json"));
        assert_eq!(
            settings.corpus.embeddings_path,
            PathBuf::from("data/embeddings.npy")
        );
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.generation.max_tokens, 512);
        settings.validate()?;
        Ok(())
    }

    #[test]
    fn test_env_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("law-rag.toml");
        fs::write(&path, "[generation]\nmodel = \"from-file\"\nmax_tokens = 64\n")?;

        // Unique prefix so parallel tests never observe this variable.
        unsafe {
            std::env::set_var("LAW_RAG_CFGTEST_GENERATION__MODEL", "from-env");
        }
        let settings = Settings::extract(&path, Env::prefixed("LAW_RAG_CFGTEST_").split("__"))?;
        unsafe {
            std::env::remove_var("LAW_RAG_CFGTEST_GENERATION__MODEL");
        }

        assert_eq!(settings.generation.model, "from-env");
        assert_eq!(settings.generation.max_tokens, 64);
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_rejects_zero_top_k() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("law-rag.toml");
        fs::write(&path, "[retrieval]\ntop_k = 0\n")?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.retrieval.top_k, 0);
        assert!(settings.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_encoder_model() {
        let mut settings = Settings::default();
        settings.encoder.model = "no-such-model".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("law-rag.toml");
        fs::write(&path, "[retrieval]\ntop_k = \"three\"\n")?;
        assert!(Settings::load(Some(&path)).is_err());
        Ok(())
    }
}
