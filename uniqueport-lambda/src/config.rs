//! Configuration management

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uniqueport_handler::{DumpLimits, LauncherConfig, DEFAULT_PROGRAM};

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub child: ChildConfig,

    #[serde(default)]
    pub dump: DumpLimits,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            child: ChildConfig::default(),
            dump: DumpLimits::default(),
            log_level: default_log_level(),
        }
    }
}

/// How the bundled executable is launched
#[derive(Debug, Deserialize)]
pub struct ChildConfig {
    #[serde(default = "default_program")]
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ChildConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            working_dir: None,
            timeout_secs: None,
        }
    }
}

impl ChildConfig {
    pub fn launcher_config(&self) -> LauncherConfig {
        LauncherConfig {
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from(DEFAULT_PROGRAM)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path, `uniqueport-lambda.toml` in the working
    /// directory is read if present. `UNIQUEPORT__CHILD__PROGRAM` style
    /// variables override the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("uniqueport-lambda").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("UNIQUEPORT").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Reject settings that can never work, before any event is taken
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.child.working_dir {
            if !dir.is_dir() {
                anyhow::bail!("child.working_dir {} is not a directory", dir.display());
            }
        }
        if self.child.timeout_secs == Some(0) {
            anyhow::bail!("child.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
