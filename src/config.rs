use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::time::Duration;

/// Command line options for the demo binary.
#[derive(Parser, Debug, Default)]
pub struct Cli {
    /// Room key to open (e.g. "global", "group_7", "private_user_a_user_b").
    #[arg(long)]
    pub room: Option<String>,
    /// Acting user id.
    #[arg(long)]
    pub user: Option<String>,
    /// Override the message poll interval in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Cadence and sizing knobs for the delivery core, resolved from file, env
/// and CLI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    /// Message poll cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Presence poll cadence in milliseconds (independent, slower).
    pub presence_interval_ms: u64,
    /// How long a presence snapshot counts as fresh.
    pub presence_freshness_ms: u64,
    /// Quiet period after which the composing indicator falls back to idle.
    pub typing_quiet_ms: u64,
    /// History page size, also used for exhaustion detection.
    pub page_size: usize,
    /// Number of messages fetched when a room is opened.
    pub initial_limit: usize,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            presence_interval_ms: default_presence_interval_ms(),
            presence_freshness_ms: default_presence_freshness_ms(),
            typing_quiet_ms: default_typing_quiet_ms(),
            page_size: default_page_size(),
            initial_limit: default_page_size(),
            logging_enabled: default_logging(),
        }
    }
}

impl ChatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    pub fn presence_freshness(&self) -> Duration {
        Duration::from_millis(self.presence_freshness_ms)
    }

    pub fn typing_quiet(&self) -> Duration {
        Duration::from_millis(self.typing_quiet_ms)
    }

    /// Resolve configuration from CLI, environment variables, config file and
    /// defaults, in that precedence order.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = ChatConfig::default();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("INTRACHAT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/intrachat.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            cfg.poll_interval_ms = file_cfg.sync.poll_interval_ms;
            cfg.presence_interval_ms = file_cfg.presence.interval_ms;
            cfg.presence_freshness_ms = file_cfg.presence.freshness_ms;
            cfg.typing_quiet_ms = file_cfg.typing.quiet_ms;
            cfg.page_size = file_cfg.history.page_size;
            cfg.initial_limit = file_cfg.history.initial_limit;
            cfg.logging_enabled = file_cfg.logging.enabled;
        }

        // environment overrides
        if let Ok(v) = std::env::var("INTRACHAT_POLL_INTERVAL_MS") {
            if let Ok(v) = v.parse::<u64>() {
                cfg.poll_interval_ms = v;
            }
        }
        if let Ok(v) = std::env::var("INTRACHAT_LOGGING") {
            if let Ok(v) = v.parse::<bool>() {
                cfg.logging_enabled = v;
            }
        }

        // CLI overrides
        if let Some(v) = cli.poll_interval_ms {
            cfg.poll_interval_ms = v;
        }
        if let Some(v) = cli.logging {
            cfg.logging_enabled = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !(100..=3_600_000).contains(&self.poll_interval_ms) {
            anyhow::bail!("invalid_poll_interval");
        }
        if self.presence_interval_ms == 0 || self.typing_quiet_ms == 0 {
            anyhow::bail!("invalid_interval");
        }
        if !(1..=200).contains(&self.page_size) || !(1..=200).contains(&self.initial_limit) {
            anyhow::bail!("invalid_page_size");
        }
        Ok(())
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    sync: FileSync,
    #[serde(default)]
    presence: FilePresence,
    #[serde(default)]
    typing: FileTyping,
    #[serde(default)]
    history: FileHistory,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FileSync {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

#[derive(Deserialize)]
struct FilePresence {
    #[serde(default = "default_presence_interval_ms")]
    interval_ms: u64,
    #[serde(default = "default_presence_freshness_ms")]
    freshness_ms: u64,
}

#[derive(Deserialize)]
struct FileTyping {
    #[serde(default = "default_typing_quiet_ms")]
    quiet_ms: u64,
}

#[derive(Deserialize)]
struct FileHistory {
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_page_size")]
    initial_limit: usize,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_presence_interval_ms() -> u64 {
    30_000
}

fn default_presence_freshness_ms() -> u64 {
    15_000
}

fn default_typing_quiet_ms() -> u64 {
    3_000
}

fn default_page_size() -> usize {
    50
}

fn default_logging() -> bool {
    true
}

impl Default for FileSync {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FilePresence {
    fn default() -> Self {
        Self {
            interval_ms: default_presence_interval_ms(),
            freshness_ms: default_presence_freshness_ms(),
        }
    }
}

impl Default for FileTyping {
    fn default() -> Self {
        Self {
            quiet_ms: default_typing_quiet_ms(),
        }
    }
}

impl Default for FileHistory {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            initial_limit: default_page_size(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        std::env::remove_var("INTRACHAT_CONFIG");
        std::env::remove_var("INTRACHAT_POLL_INTERVAL_MS");
        std::env::remove_var("INTRACHAT_LOGGING");
    }

    #[test]
    #[serial]
    fn valid_config_parses() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(
            &path,
            "[sync]\npoll_interval_ms=1500\n[history]\npage_size=25\n[logging]\nenabled=false\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = ChatConfig::load(&cli).unwrap();
        assert_eq!(cfg.poll_interval_ms, 1500);
        assert_eq!(cfg.page_size, 25);
        assert!(!cfg.logging_enabled);
        // untouched sections keep the defaults
        assert_eq!(cfg.presence_interval_ms, 30_000);
        assert_eq!(cfg.typing_quiet_ms, 3_000);
    }

    #[test]
    #[serial]
    fn missing_keys_default() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = ChatConfig::load(&cli).unwrap();
        assert_eq!(cfg, ChatConfig::default());
    }

    #[test]
    #[serial]
    fn invalid_page_size_fails() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[history]\npage_size=0\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        assert!(ChatConfig::load(&cli).is_err());
    }

    #[test]
    #[serial]
    fn too_small_poll_interval_fails() {
        clear_env();
        let cli = Cli {
            poll_interval_ms: Some(10),
            ..Default::default()
        };
        assert!(ChatConfig::load(&cli).is_err());
    }

    #[test]
    #[serial]
    fn precedence_cli_env_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[sync]\npoll_interval_ms=1111\n").unwrap();
        std::env::set_var("INTRACHAT_POLL_INTERVAL_MS", "2222");
        let cli = Cli {
            config: Some(path.clone()),
            ..Default::default()
        };
        assert_eq!(ChatConfig::load(&cli).unwrap().poll_interval_ms, 2222);
        let cli = Cli {
            config: Some(path),
            poll_interval_ms: Some(3333),
            ..Default::default()
        };
        assert_eq!(ChatConfig::load(&cli).unwrap().poll_interval_ms, 3333);
        std::env::remove_var("INTRACHAT_POLL_INTERVAL_MS");
    }

    #[test]
    #[serial]
    fn logging_toggle() {
        clear_env();
        std::env::set_var("INTRACHAT_LOGGING", "false");
        let cfg = ChatConfig::load(&Cli::default()).unwrap();
        assert!(!cfg.logging_enabled);
        std::env::remove_var("INTRACHAT_LOGGING");
    }
}
