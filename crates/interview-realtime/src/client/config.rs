use crate::client::consts::{
    BASE_URL, CONNECT_TIMEOUT_MS, INTERVIEW_API_URL, INTERVIEW_TOKEN, RECONNECT_DELAY_MAX_MS,
    RECONNECT_DELAY_MS, SOCKET_PATH,
};
use secrecy::SecretString;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    api_url: String,
    token: SecretString,
    path: String,
    reconnect_delay: Duration,
    reconnect_delay_max: Duration,
    reconnect_attempts: Option<u32>,
    connect_timeout: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.config.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.config.token = SecretString::from(token.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.config.path = path.to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_reconnect_delay_max(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay_max = delay;
        self
    }

    /// `None` retries forever.
    pub fn with_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.reconnect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Sets the default values, picking the URL and token up from the environment when present.
    pub fn new() -> Self {
        Self {
            api_url: std::env::var(INTERVIEW_API_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| BASE_URL.to_string()),
            token: std::env::var(INTERVIEW_TOKEN)
                .unwrap_or_else(|_| "".to_string())
                .into(),
            path: SOCKET_PATH.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            reconnect_delay_max: Duration::from_millis(RECONNECT_DELAY_MAX_MS),
            reconnect_attempts: None,
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn reconnect_delay_max(&self) -> Duration {
        self.reconnect_delay_max
    }

    pub fn reconnect_attempts(&self) -> Option<u32> {
        self.reconnect_attempts
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}
