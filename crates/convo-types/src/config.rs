use serde::{Deserialize, Serialize};

use crate::{ClientError, Result};

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    pub exchange: ExchangeConfig,
}

impl ClientConfig {
    /// Parse a JSON config; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.api_base.trim().is_empty() {
            return Err(ClientError::Config("api_base must not be empty".to_string()));
        }
        if let Some(h) = self
            .service
            .pass_through_headers
            .iter()
            .find(|h| h.name.trim().is_empty())
        {
            return Err(ClientError::Config(format!(
                "pass-through header with value {:?} has no name",
                h.value
            )));
        }
        if self.service.list_limit == 0 {
            return Err(ClientError::Config("list_limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// Where the conversation service lives and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_base: String,
    /// Headers required by intermediary infrastructure (tunnels, proxies).
    /// Attached to every request by the transport adapter only.
    pub pass_through_headers: Vec<PassThroughHeader>,
    pub list_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            pass_through_headers: Vec::new(),
            list_limit: 100,
        }
    }
}

impl ServiceConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassThroughHeader {
    pub name: String,
    pub value: String,
}

impl PassThroughHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Ask the service for a streamed reply. The service may still answer one-shot.
    pub prefer_stream: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self { prefer_stream: true }
    }
}

const DEFAULT_API_BASE: &str = "http://localhost:8000";
