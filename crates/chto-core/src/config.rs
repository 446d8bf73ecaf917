use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChtoError, ChtoResult};
use crate::types::Cipher;

/// Top-level configuration (loaded from chto.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChtoConfig {
    pub encrypt: EncryptConfig,
    pub log: LogConfig,
}

impl ChtoConfig {
    /// Load the config file at `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> ChtoResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChtoError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| ChtoError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Defaults for `chto enc`; command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptConfig {
    /// Compress plaintext with zstd before encrypting (default: false)
    pub compress: bool,
    /// Single-layer cipher: "aes" or "chacha" (default: aes)
    pub cipher: Cipher,
    /// Double-layer AES-256-GCM + ChaCha20-Poly1305 cascade (default: false)
    pub cascade: bool,
    /// zstd level used when compressing (default: 3)
    pub compression_level: i32,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            compress: false,
            cipher: Cipher::Aes256Gcm,
            cascade: false,
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[encrypt]
compress = true
cipher = "chacha"
cascade = true
compression_level = 19

[log]
level = "debug"
format = "json"
"#;
        let config: ChtoConfig = toml::from_str(toml_str).unwrap();

        assert!(config.encrypt.compress);
        assert_eq!(config.encrypt.cipher, Cipher::ChaCha20Poly1305);
        assert!(config.encrypt.cascade);
        assert_eq!(config.encrypt.compression_level, 19);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: ChtoConfig = toml::from_str("").unwrap();

        assert!(!config.encrypt.compress);
        assert_eq!(config.encrypt.cipher, Cipher::Aes256Gcm);
        assert!(!config.encrypt.cascade);
        assert_eq!(config.encrypt.compression_level, 3);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_cipher_aliases() {
        let config: ChtoConfig = toml::from_str("[encrypt]\ncipher = \"aes-256-gcm\"").unwrap();
        assert_eq!(config.encrypt.cipher, Cipher::Aes256Gcm);

        let result: Result<ChtoConfig, _> = toml::from_str("[encrypt]\ncipher = \"des\"");
        assert!(result.is_err(), "unknown cipher names must be rejected");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = ChtoConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ChtoConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = ChtoConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, ChtoConfig::default());
    }

    #[test]
    fn test_load_invalid_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("chto.toml");
        std::fs::write(&path, "[encrypt\ncompress = ").unwrap();

        assert!(matches!(ChtoConfig::load(&path), Err(ChtoError::Config(_))));
    }
}
