use std::{env, fmt, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

pub const USERNAME_VAR: &str = "browserstack_username";
pub const PASSWORD_VAR: &str = "browserstack_password";
pub const APP_PATH_VAR: &str = "ipa_path";
pub const TEST_SUITE_PATH_VAR: &str = "xcuitest_package_path";

pub const DEFAULT_DEVICE: &str = "iPhone XS-12";
pub const DEFAULT_OUTPUT_KEY: &str = "BROWSERSTACK_BUILD_ID";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Username and access key attached to every API call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub app_path: PathBuf,
    pub test_suite_path: PathBuf,
    pub devices: Vec<String>,
    pub device_logs: bool,
    pub poll_interval: Duration,
    pub output_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the required inputs through `lookup`. Absent and empty values are
    /// both rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(Error::Config {
                    key: key.to_string(),
                }),
            }
        };

        let username = required(USERNAME_VAR)?;
        let password = required(PASSWORD_VAR)?;
        let app_path = required(APP_PATH_VAR)?;
        let test_suite_path = required(TEST_SUITE_PATH_VAR)?;

        Ok(Self {
            credentials: Credentials::new(username, password),
            app_path: PathBuf::from(app_path),
            test_suite_path: PathBuf::from(test_suite_path),
            devices: vec![DEFAULT_DEVICE.to_string()],
            device_logs: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
        })
    }

    /// Replaces the device list. Blank entries are dropped and at least one
    /// device must remain.
    pub fn with_devices<I, S>(mut self, devices: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let devices: Vec<String> = devices
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if devices.is_empty() {
            return Err(Error::Config {
                key: "devices".into(),
            });
        }
        self.devices = devices;
        Ok(self)
    }

    /// Sets the delay between status checks, between zero (exclusive) and
    /// [`MAX_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() || interval > MAX_POLL_INTERVAL {
            return Err(Error::Config {
                key: "poll_interval".into(),
            });
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn with_device_logs(mut self, enabled: bool) -> Self {
        self.device_logs = enabled;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::Config {
                key: "output_key".into(),
            });
        }
        self.output_key = key;
        Ok(self)
    }
}
