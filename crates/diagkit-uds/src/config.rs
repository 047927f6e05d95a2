//! Engine configuration
//!
//! TOML-backed configuration for the engine: response budget, session
//! behavior, the component table and security key material. Parse
//! failures here are setup defects, distinct from protocol faults at
//! runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::Component;
use crate::security::SecurityKeyMaterial;
use diagkit_crypto::SeedKeyAlgorithm;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-transaction wait budget in milliseconds.
    #[serde(default = "default_response_budget_ms")]
    pub response_budget_ms: u64,
    /// Session/keepalive behavior.
    #[serde(default)]
    pub session: SessionConfig,
    /// Known components on the bus.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    /// Security access entries, one per component/level.
    #[serde(default)]
    pub security: Vec<SecurityConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_budget_ms: default_response_budget_ms(),
            session: SessionConfig::default(),
            components: Vec::new(),
            security: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn response_budget(&self) -> Duration {
        Duration::from_millis(self.response_budget_ms)
    }

    /// Resolve the full component table.
    pub fn components(&self) -> Result<Vec<Component>, ConfigError> {
        self.components.iter().map(|c| c.to_component()).collect()
    }

    /// Key material for one component id, if configured.
    pub fn key_material_for(&self, component_id: &str) -> Result<Option<SecurityKeyMaterial>, ConfigError> {
        self.security
            .iter()
            .find(|s| s.component == component_id)
            .map(|s| s.to_key_material())
            .transpose()
    }
}

fn default_response_budget_ms() -> u64 {
    2000
}

/// Session/keepalive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session id treated as "default" (keepalive not needed).
    #[serde(default = "default_session_id")]
    pub default_session: u8,
    #[serde(default = "default_keepalive_enabled")]
    pub keepalive_enabled: bool,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_session: default_session_id(),
            keepalive_enabled: default_keepalive_enabled(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
        }
    }
}

fn default_session_id() -> u8 {
    0x01
}

fn default_keepalive_enabled() -> bool {
    true
}

fn default_keepalive_interval_ms() -> u64 {
    2000
}

/// One component entry; CAN ids are hex strings ("0x7E0") or decimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub send_id: String,
    pub reply_id: String,
}

impl ComponentConfig {
    pub fn to_component(&self) -> Result<Component, ConfigError> {
        Ok(Component::new(
            self.id.clone(),
            if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            parse_can_id(&self.send_id)?,
            parse_can_id(&self.reply_id)?,
        ))
    }
}

/// Seed/key algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    Feistel,
    Aes128,
}

/// One security access entry: which component, which level, which
/// algorithm, and the pre-shared key as hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub component: String,
    pub level: u8,
    pub algorithm: AlgorithmKind,
    pub key: String,
}

impl SecurityConfig {
    pub fn to_key_material(&self) -> Result<SecurityKeyMaterial, ConfigError> {
        let bytes = hex::decode(&self.key).map_err(|e| ConfigError::InvalidKey {
            component: self.component.clone(),
            reason: e.to_string(),
        })?;
        let algorithm = match self.algorithm {
            AlgorithmKind::Feistel => {
                let key: [u8; 8] = bytes.try_into().map_err(|_| ConfigError::InvalidKey {
                    component: self.component.clone(),
                    reason: "feistel keys are 8 bytes".to_string(),
                })?;
                SeedKeyAlgorithm::Feistel(key)
            }
            AlgorithmKind::Aes128 => {
                let key: [u8; 16] = bytes.try_into().map_err(|_| ConfigError::InvalidKey {
                    component: self.component.clone(),
                    reason: "aes128 keys are 16 bytes".to_string(),
                })?;
                SeedKeyAlgorithm::Aes128(key)
            }
        };
        Ok(SecurityKeyMaterial::new(self.level, algorithm))
    }
}

/// Parse a CAN ID from string (supports hex with 0x prefix).
pub fn parse_can_id(s: &str) -> Result<u32, ConfigError> {
    let s = s.trim();
    let (digits, radix) = if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (stripped, 16)
    } else {
        (s, 10)
    };

    u32::from_str_radix(digits, radix).map_err(|e| ConfigError::InvalidCanId {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

/// Configuration errors: setup defects, not runtime faults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid CAN id '{value}': {reason}")]
    InvalidCanId { value: String, reason: String },

    #[error("invalid key material for '{component}': {reason}")]
    InvalidKey { component: String, reason: String },
}
