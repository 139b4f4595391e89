//! Exposing the build identifier to the surrounding CI pipeline.

use std::future::Future;
use std::pin::Pin;

use tokio::process::Command;
use tracing::info;

use crate::error::{Error, Result};

/// Something that can hand a key-value pair to the pipeline.
pub trait Publisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Publishes through `bitrise envman add`.
#[derive(Debug, Clone)]
pub struct EnvmanPublisher {
    program: String,
    base_args: Vec<String>,
}

impl Default for EnvmanPublisher {
    fn default() -> Self {
        Self {
            program: "bitrise".into(),
            base_args: vec!["envman".into(), "add".into()],
        }
    }
}

impl EnvmanPublisher {
    /// Uses a different executable; `base_args` come before `--key`/`--value`.
    pub fn with_command(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

impl Publisher for EnvmanPublisher {
    fn publish<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run(key, value))
    }
}

impl EnvmanPublisher {
    async fn run(&self, key: &str, value: &str) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.base_args)
            .args(["--key", key, "--value", value])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Publish {
                key: key.to_string(),
                reason: format!("could not run {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::Publish {
                key: key.to_string(),
                reason: format!("{} exited with {}: {}", self.program, output.status, combined.trim()),
            });
        }

        info!(key, value, "published");
        Ok(())
    }
}
