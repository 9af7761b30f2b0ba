use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vigil_experiment::{FlankerConfig, PvtConfig};

use crate::cli::RunArgs;

/// Contents of `vigil.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pvt: PvtConfig,
    pub flanker: FlankerConfig,
    pub store: StoreSection,
    pub flow: FlowSection,
    pub notes: NotesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vigil-data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSection {
    pub debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesSection {
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads `path` if given, otherwise `vigil.toml` in the working
    /// directory when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from("vigil.toml"), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pvt.validate().context("[pvt]")?;
        self.flanker.validate().context("[flanker]")?;
        Ok(())
    }

    /// Applies command-line overrides.
    pub fn apply_run_args(&mut self, args: &RunArgs) {
        if let Some(dir) = &args.store_dir {
            self.store.dir = dir.clone();
        }
        if let Some(dir) = &args.notes_dir {
            self.notes.dir = Some(dir.clone());
        }
        self.flow.debug |= args.debug;
    }
}
