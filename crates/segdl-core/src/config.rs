use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per segment on one connection (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Optional subsystems resolved at startup. A disabled capability turns its
/// collaborator into a no-op (digest checks always pass, descriptors are not followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub message_digest: bool,
    pub bittorrent: bool,
    pub metalink: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            message_digest: true,
            bittorrent: true,
            metalink: true,
        }
    }
}

/// Global configuration loaded from `~/.config/segdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegdlConfig {
    /// Connections opened per source URL.
    pub split: u32,
    /// Cap on simultaneously active connections; 0 or negative means unbounded.
    pub max_connections: i32,
    /// Segment size in bytes used for the completion bitmap.
    pub segment_size: u64,
    /// Re-verify chunks (and existing complete files) against known digests.
    pub check_integrity: bool,
    /// Honour an existing `.state` file and continue the transfer.
    pub resume: bool,
    /// Allow a fresh start to truncate an existing output file.
    pub allow_overwrite: bool,
    /// Queue a follow-up session for a completed `.torrent` file.
    pub follow_torrent: bool,
    /// Queue a follow-up session for a completed `.metalink` file.
    pub follow_metalink: bool,
    pub referer: Option<String>,
    pub http_user: Option<String>,
    pub http_passwd: Option<String>,
    pub connect_timeout_secs: u64,
    /// Upper bound for the metadata probe.
    pub probe_timeout_secs: u64,
    /// Optional bandwidth cap in bytes per second, split across connections.
    pub max_bytes_per_sec: Option<u64>,
    pub retry: Option<RetryConfig>,
    pub capabilities: Capabilities,
}

impl Default for SegdlConfig {
    fn default() -> Self {
        Self {
            split: 5,
            max_connections: 5,
            segment_size: 1024 * 1024,
            check_integrity: false,
            resume: true,
            allow_overwrite: false,
            follow_torrent: true,
            follow_metalink: true,
            referer: None,
            http_user: None,
            http_passwd: None,
            connect_timeout_secs: 15,
            probe_timeout_secs: 30,
            max_bytes_per_sec: None,
            retry: None,
            capabilities: Capabilities::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SegdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SegdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SegdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SegdlConfig::default();
        assert_eq!(cfg.split, 5);
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.segment_size, 1024 * 1024);
        assert!(cfg.resume);
        assert!(!cfg.allow_overwrite);
        assert!(!cfg.check_integrity);
        assert!(cfg.capabilities.message_digest);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SegdlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SegdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.split, cfg.split);
        assert_eq!(parsed.max_connections, cfg.max_connections);
        assert_eq!(parsed.segment_size, cfg.segment_size);
        assert_eq!(parsed.capabilities, cfg.capabilities);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml = r#"
            split = 2
            max_connections = -1
            referer = "https://example.com/"
        "#;
        let cfg: SegdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.split, 2);
        assert_eq!(cfg.max_connections, -1);
        assert_eq!(cfg.referer.as_deref(), Some("https://example.com/"));
        assert_eq!(cfg.segment_size, 1024 * 1024);
        assert!(cfg.follow_torrent);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn capabilities_section_disables_subsystems() {
        let toml = r#"
            [capabilities]
            bittorrent = false

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: SegdlConfig = toml::from_str(toml).unwrap();
        assert!(!cfg.capabilities.bittorrent);
        assert!(cfg.capabilities.metalink);
        assert!(cfg.capabilities.message_digest);
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 15);
    }
}
