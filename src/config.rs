use crate::prelude::*;
use crate::vedirect::{AcceptAll, HexHandler, HexLineHandler};

use log::LevelFilter;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub vedirect: Vedirect,

    #[serde(default)]
    pub publish: Publish,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Tcp,
    File,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HexMode {
    #[default]
    AcceptAll,
    Line,
}

// Vedirect {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Vedirect {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub source: Source,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub read_timeout: Option<u64>,

    pub path: Option<String>,
    pub replay_chunk_delay_ms: Option<u64>,
    pub replay_loop: Option<bool>,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_poll_interval")]
    pub poll_interval: Duration,

    #[serde(default)]
    pub hex_mode: HexMode,

    pub buffer_size: Option<usize>,
}
impl Vedirect {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(0)
    }

    pub fn read_timeout(&self) -> u64 {
        self.read_timeout.unwrap_or(60) // a controller sends a frame every second
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or_default()
    }

    pub fn replay_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.replay_chunk_delay_ms.unwrap_or(20))
    }

    pub fn replay_loop(&self) -> bool {
        self.replay_loop == Some(true)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(64)
    }

    pub fn hex_handler(&self) -> Box<dyn HexHandler> {
        match self.hex_mode {
            HexMode::AcceptAll => Box::new(AcceptAll),
            HexMode::Line => Box::new(HexLineHandler::new()),
        }
    }

    /// host:port or the capture path, for log lines
    pub fn describe(&self) -> String {
        match self.source {
            Source::Tcp => format!("tcp://{}:{}", self.host(), self.port()),
            Source::File => format!("file://{}", self.path()),
        }
    }
} // }}}

// Publish {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Publish {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_check_interval")]
    pub check_interval: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_publish_interval")]
    pub interval: Duration,

    pub datalog_file: Option<String>,
}

impl Default for Publish {
    fn default() -> Self {
        Self {
            check_interval: Config::default_check_interval(),
            interval: Config::default_publish_interval(),
            datalog_file: None,
        }
    }
}

impl Publish {
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn datalog_file(&self) -> Option<&str> {
        self.datalog_file.as_deref()
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Logs the effective settings. Called once logging is up.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  VE.Direct: {}", if self.vedirect.enabled { "enabled" } else { "disabled" });
        if self.vedirect.enabled {
            info!("    Source: {}", self.vedirect.describe());
            info!("    Poll Interval: {}s", self.vedirect.poll_interval.as_secs());
            info!("    Hex Mode: {:?}", self.vedirect.hex_mode);
            info!("    Buffer Size: {} chunks", self.vedirect.buffer_size());
            match self.vedirect.source {
                Source::Tcp => info!("    Read Timeout: {}s", self.vedirect.read_timeout()),
                Source::File => {
                    info!("    Replay Chunk Delay: {}ms", self.vedirect.replay_chunk_delay().as_millis());
                    info!("    Replay Loop: {}", self.vedirect.replay_loop());
                }
            }
        }

        info!("  Publish:");
        info!("    Check Interval: {}s", self.publish.check_interval.as_secs());
        info!("    Interval: {}s", self.publish.interval.as_secs());
        info!("    Datalog File: {}", self.publish.datalog_file().unwrap_or("none"));
        info!("  Log Level: {}", self.loglevel);
    }

    /// `loglevel` as a level filter: off, error, warn, info, debug or trace.
    pub fn log_level(&self) -> Result<LevelFilter> {
        self.loglevel
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("loglevel '{}' is not one of off, error, warn, info, debug, trace", self.loglevel))
    }

    fn validate(&self) -> Result<()> {
        self.log_level()?;

        let v = &self.vedirect;
        if v.enabled {
            match v.source {
                Source::Tcp => {
                    if v.host().is_empty() {
                        bail!("vedirect.host cannot be empty for a tcp source");
                    }
                    if v.port() == 0 {
                        bail!("vedirect.port must be between 1 and 65535");
                    }
                    if v.read_timeout() == 0 {
                        bail!("vedirect.read_timeout must be greater than 0");
                    }
                }
                Source::File => {
                    if v.path().is_empty() {
                        bail!("vedirect.path cannot be empty for a file source");
                    }
                }
            }
            if v.buffer_size() == 0 {
                bail!("vedirect.buffer_size must be greater than 0");
            }
        }

        if self.publish.check_interval.is_zero() {
            bail!("publish.check_interval must be greater than 0");
        }

        Ok(())
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_poll_interval() -> Duration {
        crate::vedirect::frame_handler::DEFAULT_POLL_INTERVAL
    }

    fn default_check_interval() -> Duration {
        Duration::from_secs(1)
    }

    fn default_publish_interval() -> Duration {
        Duration::from_secs(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn tcp_config_with_defaults() -> Result<()> {
        let config = Config::from_yaml(
            "vedirect:\n  source: tcp\n  host: 192.168.1.10\n  port: 3000\n",
        )?;

        assert!(config.vedirect.enabled());
        assert_eq!(config.vedirect.source(), Source::Tcp);
        assert_eq!(config.vedirect.describe(), "tcp://192.168.1.10:3000");
        assert_eq!(config.vedirect.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.vedirect.hex_mode, HexMode::AcceptAll);
        assert_eq!(config.vedirect.buffer_size(), 64);
        assert_eq!(config.vedirect.read_timeout(), 60);
        assert_eq!(config.publish.check_interval(), Duration::from_secs(1));
        assert_eq!(config.publish.interval(), Duration::from_secs(10));
        assert_eq!(config.publish.datalog_file(), None);
        assert_eq!(config.loglevel, "info");

        Ok(())
    }

    #[test]
    fn file_config_from_disk() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "loglevel: debug
vedirect:
  source: file
  path: capture.bin
  replay_loop: true
  replay_chunk_delay_ms: 5
  poll_interval: 0
  hex_mode: line
publish:
  interval: 30
  datalog_file: /tmp/vedirect.jsonl"
        )?;

        let config = Config::new(file.path().to_string_lossy().to_string())?;

        assert_eq!(config.loglevel, "debug");
        assert_eq!(config.vedirect.source(), Source::File);
        assert_eq!(config.vedirect.path(), "capture.bin");
        assert!(config.vedirect.replay_loop());
        assert_eq!(config.vedirect.replay_chunk_delay(), Duration::from_millis(5));
        assert_eq!(config.vedirect.poll_interval(), Duration::ZERO);
        assert_eq!(config.vedirect.hex_mode, HexMode::Line);
        assert_eq!(config.publish.interval(), Duration::from_secs(30));
        assert_eq!(config.publish.datalog_file(), Some("/tmp/vedirect.jsonl"));

        Ok(())
    }

    #[test]
    fn rejects_tcp_without_host() {
        let result = Config::from_yaml("vedirect:\n  source: tcp\n  port: 3000\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_file_without_path() {
        let result = Config::from_yaml("vedirect:\n  source: file\n");
        assert!(result.is_err());
    }

    #[test]
    fn disabled_input_skips_source_checks() -> Result<()> {
        let config = Config::from_yaml("vedirect:\n  enabled: false\n  source: tcp\n")?;
        assert!(!config.vedirect.enabled());
        Ok(())
    }

    #[test]
    fn rejects_zero_check_interval() {
        let result = Config::from_yaml(
            "vedirect:\n  source: file\n  path: x\npublish:\n  check_interval: 0\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn loglevel_becomes_level_filter() -> Result<()> {
        let config = Config::from_yaml("loglevel: Debug\nvedirect:\n  enabled: false\n")?;
        assert_eq!(config.log_level()?, LevelFilter::Debug);

        let config = Config::from_yaml("vedirect:\n  enabled: false\n")?;
        assert_eq!(config.log_level()?, LevelFilter::Info);
        Ok(())
    }

    #[test]
    fn rejects_unknown_loglevel() {
        let result = Config::from_yaml("loglevel: loud\nvedirect:\n  enabled: false\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::new("/nonexistent/vedirect.yaml".to_string()).is_err());
    }
}
