use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_api_server")]
    pub api_server: String,
    /// Static bearer token for the orchestrator API.
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a token file (e.g. a mounted service-account token).
    /// Ignored when `token` is set.
    #[serde(default)]
    pub token_path: Option<String>,
    /// Namespace assumed readable when even namespace listing fails.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Pin all discovery to one namespace (overridable via NAMESPACE).
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

fn default_listen_port() -> u16 {
    8000
}

fn default_api_server() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
        let mut cfg: Config =
            serde_yaml::from_str(&data).map_err(|e| format!("parsing config: {}", e))?;

        if cfg.namespace.is_none() {
            if let Ok(ns) = std::env::var("NAMESPACE") {
                if !ns.is_empty() {
                    cfg.namespace = Some(ns);
                }
            }
        }

        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn bearer_token(&self) -> Result<Option<String>, Box<dyn std::error::Error>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        if let Some(path) = &self.token_path {
            let token = std::fs::read_to_string(path)
                .map_err(|e| format!("reading token file {}: {}", path, e))?;
            return Ok(Some(token.trim().to_string()));
        }
        Ok(None)
    }
}
