pub mod expand;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long each blocking step of a dialogue is allowed to wait before the
/// connection is treated as stalled.
///
/// Durations are stored as milliseconds on the wire so the config survives
/// a JSON round-trip without a custom (de)serializer; [`TimeoutsConfig::read`]
/// etc. convert to [`Duration`] for use against [`crate::pipe::Pipe`] and
/// [`crate::conn::ConnWrapper`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    #[serde(default = "default_read_timeout_ms")]
    pub read_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_ms: u64,
    #[serde(default = "default_drain_short_ms")]
    pub drain_short_ms: u64,
    #[serde(default = "default_drain_long_ms")]
    pub drain_long_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            read_ms: default_read_timeout_ms(),
            write_ms: default_write_timeout_ms(),
            drain_short_ms: default_drain_short_ms(),
            drain_long_ms: default_drain_long_ms(),
        }
    }
}

impl TimeoutsConfig {
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    /// Used after a prompt line is seen, to catch trailing banner text
    /// (`UserLogin`/`ReadPrompt`'s `DrainOff(1s)`).
    pub fn drain_short(&self) -> Duration {
        Duration::from_millis(self.drain_short_ms)
    }

    /// Used after `enable`/`WithView` switch the device into a new context,
    /// which tends to print more trailing banner text than a plain login.
    pub fn drain_long(&self) -> Duration {
        Duration::from_millis(self.drain_long_ms)
    }
}

/// Login/enable credentials and the placeholder values a script's
/// `<<username>>`/`<<password>>`/`<<enable>>`/`<<enable_password>>` tokens
/// resolve to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_enable_command")]
    pub enable_command: String,
    #[serde(default)]
    pub enable_password: String,
}

/// Top-level session configuration: credentials, timeouts, and the framing
/// option that some devices require.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Send `\r\n` instead of `\n` after each line (some serial devices and
    /// older terminal servers require it).
    #[serde(default)]
    pub use_crlf: bool,
    #[serde(default)]
    pub user_prompts: Vec<String>,
    #[serde(default)]
    pub password_prompts: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            use_crlf: false,
            user_prompts: Vec::new(),
            password_prompts: Vec::new(),
            prompts: Vec::new(),
        }
    }
}

impl CredentialsConfig {
    /// Return a copy with all `${env:...}` placeholders expanded, so
    /// credentials can be kept out of a checked-in config file.
    pub fn expand(mut self) -> Self {
        self.username = expand::expand_env_placeholders(&self.username);
        self.password = expand::expand_env_placeholders(&self.password);
        self.enable_password = expand::expand_env_placeholders(&self.enable_password);
        self
    }
}

impl SessionConfig {
    pub fn expand(mut self) -> Self {
        self.credentials = self.credentials.expand();
        self
    }

    fn prompts_as_bytes(prompts: &[String]) -> Vec<Vec<u8>> {
        prompts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    pub fn user_prompts_bytes(&self) -> Vec<Vec<u8>> {
        Self::prompts_as_bytes(&self.user_prompts)
    }

    pub fn password_prompts_bytes(&self) -> Vec<Vec<u8>> {
        Self::prompts_as_bytes(&self.password_prompts)
    }

    pub fn prompts_bytes(&self) -> Vec<Vec<u8>> {
        Self::prompts_as_bytes(&self.prompts)
    }
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_drain_short_ms() -> u64 {
    1_000
}

fn default_drain_long_ms() -> u64 {
    5_000
}

fn default_enable_command() -> String {
    "enable".to_string()
}
