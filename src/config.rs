use anyhow::{Context, Result};
use directories::ProjectDirs;
use keyring::Entry;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::{Auth, ClientConfig, TrustMode};
use crate::models::splunk::{SearchOptions, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

pub const APP_NAME: &str = "spelunk-dispatch";

/// Which credential the user chose; decides the keyring entry that is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Token,
    Basic,
}

impl AuthMethod {
    /// Keyring user under which this method's secret is stored.
    pub fn keyring_user(self) -> &'static str {
        match self {
            AuthMethod::Token => "token",
            AuthMethod::Basic => "password",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub splunk_base_url: String,
    /// `None` for configs written before the method was recorded: a token wins.
    pub auth_method: Option<AuthMethod>,
    pub splunk_username: String,
    pub splunk_password: String,
    pub splunk_token: String,
    pub splunk_verify_ssl: bool,
    pub splunk_ca_bundle: Option<PathBuf>,
    pub splunk_client_identity: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            splunk_base_url: String::new(),
            auth_method: None,
            splunk_username: String::new(),
            splunk_password: String::new(),
            splunk_token: String::new(),
            splunk_verify_ssl: true,
            splunk_ca_bundle: None,
            splunk_client_identity: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // 1. .env in the working directory feeds the environment below
        if let Ok(path) = dotenv::dotenv() {
            info!("Loaded environment from: {:?}", path);
        }

        // 2. Config file
        if let Some(config_path) = config_path() {
            if config_path.exists() {
                info!("Loading config from: {:?}", config_path);
                let content = std::fs::read_to_string(&config_path)
                    .context(format!("Failed to read config file at {:?}", config_path))?;

                match toml::from_str::<FileConfig>(&content) {
                    Ok(file_config) => config.merge(file_config),
                    Err(e) => warn!("Failed to parse config.toml: {}", e),
                }
            }
        }

        // 3. Keyring, only for secrets still missing
        config.apply_keyring(keyring_secret);

        // 4. Environment overrides everything
        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// Fill the chosen method's secret from the keyring. A secret left behind
    /// by a previously configured method is never read.
    pub fn apply_keyring(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        match self.auth_method {
            Some(AuthMethod::Token) => {
                if self.splunk_token.is_empty() {
                    if let Some(token) = lookup(AuthMethod::Token.keyring_user()) {
                        self.splunk_token = token;
                    }
                }
            }
            Some(AuthMethod::Basic) => {
                if self.splunk_password.is_empty() {
                    if let Some(password) = lookup(AuthMethod::Basic.keyring_user()) {
                        self.splunk_password = password;
                    }
                }
            }
            None => {
                if self.splunk_token.is_empty() {
                    if let Some(token) = lookup(AuthMethod::Token.keyring_user()) {
                        self.splunk_token = token;
                    }
                }
                if self.splunk_token.is_empty() && self.splunk_password.is_empty() {
                    if let Some(password) = lookup(AuthMethod::Basic.keyring_user()) {
                        self.splunk_password = password;
                    }
                }
            }
        }
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("SPLUNK_URL") {
            self.splunk_base_url = val;
        }
        if let Some(val) = lookup("SPLUNK_BASE_URL") {
            self.splunk_base_url = val;
        }
        if let Some(val) = lookup("SPLUNK_USER") {
            self.splunk_username = val;
            self.auth_method = Some(AuthMethod::Basic);
        }
        if let Some(val) = lookup("SPLUNK_PASSWORD") {
            self.splunk_password = val;
            self.auth_method = Some(AuthMethod::Basic);
        }
        if let Some(val) = lookup("SPLUNK_TOKEN") {
            self.splunk_token = val;
            self.auth_method = Some(AuthMethod::Token);
        }
        if let Some(val) = lookup("SPLUNK_VERIFY_SSL") {
            match val.trim().parse() {
                Ok(verify) => self.splunk_verify_ssl = verify,
                Err(_) => warn!("Ignoring SPLUNK_VERIFY_SSL={:?}: expected true or false", val),
            }
        }
        if lookup("SPLUNK_CERT").is_some_and(|v| v.trim() == "self_signed") {
            self.splunk_verify_ssl = false;
        }
        if let Some(val) = lookup("SPLUNK_CA_BUNDLE") {
            self.splunk_ca_bundle = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("SPLUNK_CLIENT_IDENTITY") {
            self.splunk_client_identity = Some(PathBuf::from(val));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.splunk_base_url.is_empty() {
            anyhow::bail!("Splunk Base URL is not configured.\nRun 'spelunk-dispatch config' to set up your credentials.");
        }
        let has_token = !self.splunk_token.is_empty();
        let has_basic = !self.splunk_username.is_empty() && !self.splunk_password.is_empty();
        match self.auth_method {
            Some(AuthMethod::Token) if !has_token => {
                anyhow::bail!("Token authentication is selected but no Splunk token is configured.\nRun 'spelunk-dispatch config' to set up your credentials.");
            }
            Some(AuthMethod::Basic) if !has_basic => {
                anyhow::bail!("Username/password authentication is selected but the username or password is missing.\nRun 'spelunk-dispatch config' to set up your credentials.");
            }
            None if !has_token && !has_basic => {
                anyhow::bail!("Neither a Splunk token nor a username/password is configured.\nRun 'spelunk-dispatch config' to set up your credentials.");
            }
            _ => {}
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1.");
        }
        Ok(())
    }

    /// Transport settings. The recorded auth method decides; without one a
    /// token wins over basic credentials.
    pub fn client_config(&self) -> Result<ClientConfig> {
        self.validate()?;

        let use_token = match self.auth_method {
            Some(method) => method == AuthMethod::Token,
            None => !self.splunk_token.is_empty(),
        };
        let auth = if use_token {
            Auth::Token(self.splunk_token.clone())
        } else {
            Auth::Basic {
                username: self.splunk_username.clone(),
                password: self.splunk_password.clone(),
            }
        };
        let trust_mode = if self.splunk_verify_ssl {
            TrustMode::Strict
        } else {
            TrustMode::AcceptSelfSigned
        };

        Ok(ClientConfig {
            ca_bundle: self.splunk_ca_bundle.clone(),
            client_identity: self.splunk_client_identity.clone(),
            ..ClientConfig::new(self.splunk_base_url.clone(), auth).with_trust_mode(trust_mode)
        })
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::default()
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn keyring_secret(user: &str) -> Option<String> {
    Entry::new(APP_NAME, user)
        .ok()
        .and_then(|entry| entry.get_password().ok())
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct FileConfig {
    pub splunk_base_url: Option<String>,
    pub auth_method: Option<AuthMethod>,
    pub splunk_username: Option<String>,
    pub splunk_password: Option<String>,
    pub splunk_token: Option<String>,
    pub splunk_verify_ssl: Option<bool>,
    pub splunk_ca_bundle: Option<PathBuf>,
    pub splunk_client_identity: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    fn merge(&mut self, other: FileConfig) {
        if let Some(v) = other.splunk_base_url {
            self.splunk_base_url = v;
        }
        if let Some(v) = other.auth_method {
            self.auth_method = Some(v);
        }
        if let Some(v) = other.splunk_username {
            self.splunk_username = v;
        }
        if let Some(v) = other.splunk_password {
            self.splunk_password = v;
        }
        if let Some(v) = other.splunk_token {
            self.splunk_token = v;
        }
        if let Some(v) = other.splunk_verify_ssl {
            self.splunk_verify_ssl = v;
        }
        if let Some(v) = other.splunk_ca_bundle {
            self.splunk_ca_bundle = Some(v);
        }
        if let Some(v) = other.splunk_client_identity {
            self.splunk_client_identity = Some(v);
        }
        if let Some(v) = other.poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = other.timeout_secs {
            self.timeout_secs = v;
        }
    }
}
