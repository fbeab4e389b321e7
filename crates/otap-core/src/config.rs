//! Session configuration.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_BLOCK_SIZE, TransferMode};

/// Configuration for a transfer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the firmware image.
    pub firmware_path: Option<String>,
    /// Transfer key as 32 hex characters. The embedding layer supplies a
    /// default when absent; the core never invents one.
    pub key_hex: Option<String>,
    /// Requested block size in bytes; the planner may grow or clamp it.
    pub requested_block_size: usize,
    /// Flow-control discipline.
    pub mode: TransferMode,
    /// ATT MTU override; otherwise the adapter's negotiated value is used.
    pub mtu: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            firmware_path: None,
            key_hex: None,
            requested_block_size: DEFAULT_BLOCK_SIZE,
            mode: TransferMode::Ack,
            mtu: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parse the configured transfer key, if any.
    pub fn transfer_key(&self) -> Result<Option<[u8; 16]>> {
        let Some(hex) = &self.key_hex else {
            return Ok(None);
        };
        Ok(Some(parse_key_hex(hex)?))
    }
}

/// Parse a 16-byte key from 32 hex characters.
pub fn parse_key_hex(hex: &str) -> Result<[u8; 16]> {
    let hex = hex.trim();
    if hex.len() != 32 || !hex.is_ascii() {
        return Err(anyhow!("transfer key must be 32 hex characters"));
    }
    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
            .map_err(|_| anyhow!("transfer key contains non-hex characters"))?;
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.requested_block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.mode, TransferMode::Ack);
        assert!(config.transfer_key().unwrap().is_none());
    }

    #[test]
    fn test_parse_key_hex() {
        let key = parse_key_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(key[0], 0x00);
        assert_eq!(key[1], 0x01);
        assert_eq!(key[15], 0x0F);
    }

    #[test]
    fn test_parse_key_hex_rejects_bad_input() {
        assert!(parse_key_hex("shorty").is_err());
        assert!(parse_key_hex("zz0102030405060708090a0b0c0d0e0f").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SessionConfig {
            firmware_path: Some("fw.bin".into()),
            key_hex: Some("00112233445566778899aabbccddeeff".into()),
            requested_block_size: 128,
            mode: TransferMode::Notify,
            mtu: Some(185),
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.firmware_path.as_deref(), Some("fw.bin"));
        assert_eq!(back.mode, TransferMode::Notify);
        assert_eq!(back.mtu, Some(185));
        assert_eq!(back.transfer_key().unwrap().unwrap()[0], 0x00);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let back: SessionConfig = toml::from_str("mode = \"notify\"\n").unwrap();
        assert_eq!(back.mode, TransferMode::Notify);
        assert_eq!(back.requested_block_size, DEFAULT_BLOCK_SIZE);
    }
}
