use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://web.whatsapp.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/60.0.3112.50 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserConfig {
    pub url: String,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub chrome_executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub login_poll_interval_ms: u64,
    pub wait_for_login_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub search_delay_ms: u64,
    pub animation_delay_ms: u64,
    pub locate_timeout_ms: u64,
    pub app_ready_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    pub level: String,
    pub to_file: bool,
    pub dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            user_data_dir: PathBuf::from("data/whatsapp-driver"),
            headless: true,
            window_width: 650,
            window_height: 650,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_executable: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            login_poll_interval_ms: 100,
            wait_for_login_interval_ms: 1_000,
            settle_delay_ms: 500,
            search_delay_ms: 500,
            animation_delay_ms: 500,
            locate_timeout_ms: 10_000,
            app_ready_timeout_ms: 10_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_file: false,
            dir: None,
        }
    }
}

impl TimingConfig {
    pub fn login_poll_interval(&self) -> Duration {
        Duration::from_millis(self.login_poll_interval_ms)
    }

    pub fn wait_for_login_interval(&self) -> Duration {
        Duration::from_millis(self.wait_for_login_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    pub fn animation_delay(&self) -> Duration {
        Duration::from_millis(self.animation_delay_ms)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn app_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.app_ready_timeout_ms)
    }

    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self {
            login_poll_interval_ms: 1,
            wait_for_login_interval_ms: 1,
            settle_delay_ms: 0,
            search_delay_ms: 0,
            animation_delay_ms: 0,
            locate_timeout_ms: 0,
            app_ready_timeout_ms: 0,
        }
    }
}

impl LogConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from("logs"))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
