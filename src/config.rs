use std::{path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::providers::{GeminiProvider, ImageProvider, MockProvider, DEFAULT_API_BASE, DEFAULT_MODEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCfg {
    pub provider: String, // "gemini" | "mock"
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    pub timeout_secs: Option<u64>,
    pub batch: BatchCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchCfg {
    pub concurrency: usize,
    pub rate_per_min: u32,
    pub seed: Option<u64>,
}

impl Default for ClientCfg {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: DEFAULT_MODEL.into(),
            api_base: DEFAULT_API_BASE.into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: None,
            batch: BatchCfg::default(),
        }
    }
}

impl Default for BatchCfg {
    fn default() -> Self {
        Self { concurrency: 1, rate_per_min: 0, seed: None }
    }
}

impl ClientCfg {
    pub async fn load(path: &Path) -> Result<Self> {
        let txt = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GenError::InputNotFound(path.to_path_buf())
            } else {
                GenError::Io(e)
            }
        })?;
        Self::from_yaml(&txt)
    }

    pub fn from_yaml(txt: &str) -> Result<Self> {
        let cfg: ClientCfg =
            serde_yaml::from_str(txt).map_err(|e| GenError::Config(format!("config YAML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            return Err(GenError::Config("batch.concurrency must be greater than 0".into()));
        }
        match self.provider.as_str() {
            "gemini" | "mock" => Ok(()),
            other => Err(GenError::Config(format!("unknown provider '{other}' (expected gemini or mock)"))),
        }
    }

    /// Explicit key first, then the configured environment variable.
    pub fn resolve_api_key(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn build_provider(&self, api_key: Option<String>) -> Result<Arc<dyn ImageProvider>> {
        self.validate()?;
        match self.provider.as_str() {
            "mock" => Ok(Arc::new(MockProvider)),
            _ => {
                let key = self
                    .resolve_api_key(api_key)
                    .ok_or_else(|| GenError::MissingApiKey(self.api_key_env.clone()))?;
                let provider = GeminiProvider::new(
                    key,
                    self.model.clone(),
                    self.api_base.clone(),
                    self.timeout_secs.map(Duration::from_secs),
                )?;
                Ok(Arc::new(provider))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = ClientCfg::from_yaml("model: my-model\nbatch:\n  seed: 7\n").unwrap();
        assert_eq!(cfg.model, "my-model");
        assert_eq!(cfg.provider, "gemini");
        assert_eq!(cfg.batch.seed, Some(7));
        assert_eq!(cfg.batch.concurrency, 1);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = ClientCfg::from_yaml("batch:\n  concurrency: 0\n").unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let cfg = ClientCfg { api_key_env: "SCENEGEN_TEST_UNSET_KEY".into(), ..ClientCfg::default() };
        match cfg.build_provider(None) {
            Err(GenError::MissingApiKey(var)) => assert_eq!(var, "SCENEGEN_TEST_UNSET_KEY"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected missing key error"),
        }
    }

    #[test]
    fn blank_explicit_key_counts_as_missing() {
        let cfg = ClientCfg { api_key_env: "SCENEGEN_TEST_UNSET_KEY".into(), ..ClientCfg::default() };
        assert!(cfg.resolve_api_key(Some("  ".into())).is_none());
        assert_eq!(cfg.resolve_api_key(Some("k".into())).as_deref(), Some("k"));
    }

    #[test]
    fn mock_provider_needs_no_key() {
        let cfg = ClientCfg { provider: "mock".into(), ..ClientCfg::default() };
        let provider = cfg.build_provider(None).unwrap();
        assert_eq!(provider.name(), "mock");
    }
}
