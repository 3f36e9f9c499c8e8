use anyhow::Result;
use keyring::Entry;
use log::warn;
use spelunk_dispatch::config::{config_path, AuthMethod, FileConfig, APP_NAME};
use std::io::{self, Write};
use std::path::Path;

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Store a secret in the OS keyring; `false` if no keyring is available.
fn store_secret(user: &str, secret: &str) -> bool {
    match Entry::new(APP_NAME, user).and_then(|entry| entry.set_password(secret)) {
        Ok(()) => true,
        Err(e) => {
            println!("Could not store {} in the system keyring ({}).", user, e);
            false
        }
    }
}

/// Remove the keyring secret of a method that is no longer selected.
fn forget_secret(method: AuthMethod) {
    let user = method.keyring_user();
    match Entry::new(APP_NAME, user).and_then(|entry| entry.delete_credential()) {
        Ok(()) | Err(keyring::Error::NoEntry) => {}
        Err(e) => warn!("Failed to remove stale {} from the system keyring: {}", user, e),
    }
}

/// Existing file settings, or defaults when there is no file or it cannot be
/// parsed.
fn load_existing(config_path: &Path) -> Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(config_path)?;
    match toml::from_str(&content) {
        Ok(existing) => Ok(existing),
        Err(e) => {
            warn!("Failed to parse config.toml: {}", e);
            println!("The existing config.toml could not be parsed and will be replaced.");
            Ok(FileConfig::default())
        }
    }
}

pub fn run() -> Result<()> {
    println!("Welcome to spelunk-dispatch configuration wizard!");
    println!("Secrets go to the system keyring when one is available, otherwise to the config file.");
    println!();

    let Some(config_path) = config_path() else {
        anyhow::bail!("Could not determine configuration directory.");
    };

    // Read existing config to preserve timing settings
    let mut file_config = load_existing(&config_path)?;

    // 1. Management URL
    file_config.splunk_base_url = Some(prompt("Enter Splunk management URL (e.g. https://splunk:8089): ")?);

    // 2. Credentials
    let method = prompt("Authenticate with [t]oken or [u]sername/password? [T/u]: ")?;
    if matches!(method.to_lowercase().as_str(), "u" | "user" | "password") {
        file_config.auth_method = Some(AuthMethod::Basic);
        file_config.splunk_username = Some(prompt("Enter Splunk username: ")?);
        print!("Enter Splunk password (hidden): ");
        io::stdout().flush()?;
        let password = rpassword::read_password()?.trim().to_string();
        file_config.splunk_token = None;
        forget_secret(AuthMethod::Token);
        file_config.splunk_password = if store_secret(AuthMethod::Basic.keyring_user(), &password) {
            None
        } else {
            Some(password)
        };
    } else {
        print!("Enter Splunk Token (hidden): ");
        io::stdout().flush()?;
        let token = rpassword::read_password()?.trim().to_string();
        file_config.auth_method = Some(AuthMethod::Token);
        file_config.splunk_username = None;
        file_config.splunk_password = None;
        forget_secret(AuthMethod::Basic);
        file_config.splunk_token = if store_secret(AuthMethod::Token.keyring_user(), &token) {
            None
        } else {
            Some(token)
        };
    }

    // 3. Certificate trust
    let verify = prompt("Verify server certificate? Answer 'n' for self-signed certificates [Y/n]: ")?;
    file_config.splunk_verify_ssl = Some(!matches!(
        verify.to_lowercase().as_str(),
        "n" | "no" | "false"
    ));

    println!();
    println!("Saving configuration...");

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let toml_string = toml::to_string(&file_config)?;
    std::fs::write(&config_path, toml_string)?;
    println!("Configuration saved to: {}", config_path.display());
    println!();
    println!("Try it with: spelunk-dispatch search 'index=_internal | head 5'");

    println!("Setup complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push("spelunk-dispatch-tests");
        let _ = std::fs::create_dir_all(&path);
        path.push(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn existing_timing_settings_are_kept() {
        let path = scratch_file(
            "wizard-valid.toml",
            "poll_interval_secs = 5\ntimeout_secs = 600\nauth_method = \"basic\"\n",
        );
        let existing = load_existing(&path).unwrap();
        assert_eq!(existing.poll_interval_secs, Some(5));
        assert_eq!(existing.timeout_secs, Some(600));
        assert_eq!(existing.auth_method, Some(AuthMethod::Basic));
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let path = scratch_file("wizard-broken.toml", "timeout_secs = \"soon\"\n[[[");
        let existing = load_existing(&path).unwrap();
        assert_eq!(existing.timeout_secs, None);
        assert_eq!(existing.splunk_base_url, None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("spelunk-dispatch-tests/does-not-exist.toml");
        let existing = load_existing(&path).unwrap();
        assert!(existing.auth_method.is_none());
    }
}
