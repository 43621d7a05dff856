use anyhow::{Context, Result};
use ragchunk_chunker::{ChunkerConfig, DocumentKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT: &str = "chunks.jsonl";

/// Top-level `ragchunk.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub chunker: ChunkerConfig,
    pub inputs: InputsConfig,
}

/// Input directories per document kind plus the JSONL output path
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputsConfig {
    pub python: Vec<PathBuf>,
    pub web: Vec<PathBuf>,
    pub api: Vec<PathBuf>,
    pub notebook: Vec<PathBuf>,
    pub pdf: Vec<PathBuf>,
    pub output: PathBuf,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            python: Vec::new(),
            web: Vec::new(),
            api: Vec::new(),
            notebook: Vec::new(),
            pdf: Vec::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl InputsConfig {
    /// Directories in processing order, each with the kind its files hold
    pub fn directories(&self) -> Vec<(DocumentKind, &Path)> {
        let groups = [
            (DocumentKind::Source, &self.python),
            (DocumentKind::Web, &self.web),
            (DocumentKind::Web, &self.api),
            (DocumentKind::Notebook, &self.notebook),
            (DocumentKind::Pdf, &self.pdf),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, dirs)| dirs.iter().map(move |dir| (kind, dir.as_path())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.directories().is_empty()
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config
            .chunker
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [chunker] section in {}: {e}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
