use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/ddm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdmConfig {
    /// Maximum total concurrent HTTP connections across all jobs.
    pub max_total_connections: usize,
    /// Maximum concurrent HTTP connections per host.
    pub max_connections_per_host: usize,
    /// Minimum number of segments per job.
    pub min_segments: usize,
    /// Maximum number of segments per job.
    pub max_segments: usize,
    /// Retry/backoff tuning; falls back to `RetryPolicy::default()` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    /// Global bandwidth ceiling in bytes/second, split evenly across concurrent
    /// segment handles of a job. `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes_per_sec: Option<u64>,
    /// Per-handle curl read buffer size hint, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_buffer_bytes: Option<usize>,
    /// TLS certificate validation policy.
    #[serde(default)]
    pub certificate: CertificateConfig,
    /// Mirror failover tuning.
    #[serde(default)]
    pub mirrors: MirrorConfig,
}

/// Exponential backoff tuning, mirrored into `RetryPolicy` at call sites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
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

/// Certificate validation policy (see `crate::tls::CertificateGate`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// When true (default), any non-pin chain/expiry/hostname error is fatal.
    /// When false, such errors are recorded but do not reject the connection.
    #[serde(default = "default_strict")]
    pub strict: bool,
    /// Host (case-insensitive) -> pinned certificate SHA-256 thumbprint (hex).
    /// When a host has a pin, the chain outcome is overridden by thumbprint
    /// equality regardless of `strict`.
    #[serde(default)]
    pub pinned_thumbprints: HashMap<String, String>,
}

fn default_strict() -> bool {
    true
}

/// Mirror failover tuning (see `crate::mirrors::MirrorRegistry`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Maximum number of failover reassignments attempted per segment before
    /// it is marked failed.
    pub max_failover_attempts_per_segment: u32,
    /// Timeout, in seconds, for each mirror health-probe HEAD request.
    pub probe_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            max_failover_attempts_per_segment: 3,
            probe_timeout_secs: 5,
        }
    }
}

impl Default for DdmConfig {
    fn default() -> Self {
        Self {
            max_total_connections: 64,
            max_connections_per_host: 16,
            min_segments: 4,
            max_segments: 16,
            retry: None,
            max_bytes_per_sec: None,
            segment_buffer_bytes: None,
            certificate: CertificateConfig::default(),
            mirrors: MirrorConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ddm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = DdmConfig::default();
        assert_eq!(cfg.max_total_connections, 64);
        assert_eq!(cfg.max_connections_per_host, 16);
        assert_eq!(cfg.min_segments, 4);
        assert_eq!(cfg.max_segments, 16);
        assert!(cfg.certificate.strict);
        assert_eq!(cfg.mirrors.max_failover_attempts_per_segment, 3);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = DdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_total_connections, cfg.max_total_connections);
        assert_eq!(parsed.max_connections_per_host, cfg.max_connections_per_host);
        assert_eq!(parsed.min_segments, cfg.min_segments);
        assert_eq!(parsed.max_segments, cfg.max_segments);
    }

    #[test]
    fn config_toml_minimal_fills_defaults() {
        let toml = r#"
            max_total_connections = 8
            max_connections_per_host = 4
            min_segments = 2
            max_segments = 32
        "#;
        let cfg: DdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_total_connections, 8);
        assert_eq!(cfg.max_connections_per_host, 4);
        assert_eq!(cfg.min_segments, 2);
        assert_eq!(cfg.max_segments, 32);
        assert!(cfg.retry.is_none());
        assert!(cfg.certificate.strict);
    }

    #[test]
    fn config_toml_with_retry_and_pins() {
        let toml = r#"
            max_total_connections = 8
            max_connections_per_host = 4
            min_segments = 2
            max_segments = 32
            max_bytes_per_sec = 1000000

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 10

            [certificate]
            strict = false
            [certificate.pinned_thumbprints]
            "example.com" = "ab12cd34"
        "#;
        let cfg: DdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retry.unwrap().max_attempts, 3);
        assert_eq!(cfg.max_bytes_per_sec, Some(1_000_000));
        assert!(!cfg.certificate.strict);
        assert_eq!(
            cfg.certificate.pinned_thumbprints.get("example.com").map(String::as_str),
            Some("ab12cd34")
        );
    }
}
