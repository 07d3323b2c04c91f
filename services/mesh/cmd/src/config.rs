//! Configuration handling for the mesh-sig service.
//!
//! This module reads the YAML config file and environment overrides and
//! turns the signature section into a ready signature registry.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mesh_layer2::InterfaceConfig;
use mesh_signature::{
    HmacCrypt, KeyIdCheck, MessageTypeScope, Sha256Hash, SignatureKey, SignaturePolicy,
    SignatureRegistry,
};
use mesh_wire::MAX_PACKET_SIZE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Environment variable overriding the maximum packet size
pub const ENV_MAX_PACKET_SIZE: &str = "MESH_SIG_MAX_PACKET_SIZE";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "MESH_SIG_LOG_LEVEL";

/// mesh-sig service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSigConfig {
    /// Largest packet the signature buffers must hold
    pub max_packet_size: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Shared secret of the HMAC crypt function, hex encoded
    pub hmac_secret: Option<String>,
    /// Signature policies in registration order
    pub signatures: Vec<PolicyConfig>,
    /// Configured layer2 data per interface
    pub layer2: Vec<InterfaceConfig>,
}

impl Default for MeshSigConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            log_level: "info".to_string(),
            hmac_secret: None,
            signatures: Vec::new(),
            layer2: Vec::new(),
        }
    }
}

/// One signature policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Name used in logs
    pub name: String,
    /// Hash function id
    pub hash: u8,
    /// Crypt function id
    pub crypt: u8,
    /// Message types the policy covers
    pub message_types: Vec<u8>,
    /// Whether the policy covers packets
    pub packet: bool,
    /// Include the source address in the signed data
    pub source_specific: bool,
    /// Drop content without a valid signature
    pub drop_if_invalid: bool,
    /// Own key id, hex encoded
    pub key_id: String,
    /// Accepted key ids, hex encoded; empty accepts any
    pub accepted_key_ids: Vec<String>,
    /// Action for a key id outside `accepted_key_ids`
    pub unknown_key_id: KeyIdCheck,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            hash: 0,
            crypt: 0,
            message_types: Vec::new(),
            packet: false,
            source_specific: false,
            drop_if_invalid: false,
            key_id: String::new(),
            accepted_key_ids: Vec::new(),
            unknown_key_id: KeyIdCheck::Ignore,
        }
    }
}

impl PolicyConfig {
    /// Build the signature policy
    pub fn to_policy(&self) -> Result<SignaturePolicy> {
        let key = SignatureKey::new(self.hash, self.crypt);
        let name = if self.name.is_empty() {
            key.to_string()
        } else {
            self.name.clone()
        };

        let key_id = hex::decode(&self.key_id)
            .with_context(|| format!("invalid key_id of policy '{}'", name))?;
        let accepted = self
            .accepted_key_ids
            .iter()
            .map(hex::decode)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid accepted_key_ids of policy '{}'", name))?;

        let scope = MessageTypeScope::messages(self.message_types.iter().copied())
            .with_packets(self.packet)
            .with_key_id(key_id)
            .with_accepted_key_ids(accepted)
            .with_unknown_key_id(self.unknown_key_id);

        Ok(SignaturePolicy::new(name, key, scope)
            .source_specific(self.source_specific)
            .drop_if_invalid(self.drop_if_invalid))
    }
}

impl MeshSigConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}, using defaults: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok());

        info!(
            "Final mesh-sig configuration: max_packet_size={}, policies={}, layer2 interfaces={}",
            config.max_packet_size,
            config.signatures.len(),
            config.layer2.len()
        );

        Ok(config)
    }

    /// Apply overrides from `lookup`, the process environment in production
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_PACKET_SIZE) {
            match value.parse::<usize>() {
                Ok(size) => {
                    self.max_packet_size = size;
                    info!("Maximum packet size overridden by environment: {}", size);
                }
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_MAX_PACKET_SIZE, value),
            }
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            info!("Log level overridden by environment: {}", level);
            self.log_level = level;
        }
    }

    /// Build the signature registry with all configured algorithms and policies
    pub fn build_registry(&self) -> Result<SignatureRegistry> {
        let mut registry = SignatureRegistry::with_identity(self.max_packet_size);
        registry.add_hash(Arc::new(Sha256Hash))?;

        if let Some(secret) = &self.hmac_secret {
            let secret = hex::decode(secret).context("invalid hmac_secret")?;
            registry.add_crypt(Arc::new(HmacCrypt::new(secret)))?;
        }

        for policy in &self.signatures {
            let handle = registry.add_policy(Arc::new(policy.to_policy()?));
            if let Some(entry) = registry.policy(handle) {
                if !entry.is_active() {
                    warn!(
                        "Signature policy '{}' uses unregistered algorithms {}",
                        entry.policy().name(),
                        entry.policy().key()
                    );
                }
            }
        }

        Ok(registry)
    }
}
