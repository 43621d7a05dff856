//! Token accounting.
//!
//! Every size decision in the engine goes through one [`TokenCounter`], so limits
//! stay comparable across document formats.

use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;

/// Loaded BPE tables, keyed by encoding. The tables are immutable once built.
static BPE_TABLES: OnceCell<Mutex<HashMap<TokenEncoding, Arc<CoreBPE>>>> = OnceCell::new();

/// Supported tokenizer schemes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEncoding {
    /// GPT-4 / GPT-3.5 family encoding
    #[default]
    Cl100kBase,
    /// GPT-4o family encoding
    O200kBase,
    /// Codex family encoding
    P50kBase,
    /// GPT-2 / GPT-3 encoding
    R50kBase,
}

impl TokenEncoding {
    /// Resolve an encoding by name, falling back to `cl100k_base` for unknown names
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "cl100k_base" => Self::Cl100kBase,
            "o200k_base" => Self::O200kBase,
            "p50k_base" => Self::P50kBase,
            "r50k_base" => Self::R50kBase,
            other => {
                log::warn!("Unknown token encoding '{other}', falling back to cl100k_base");
                Self::Cl100kBase
            }
        }
    }

    /// Encoding name as used by tiktoken
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
            Self::P50kBase => "p50k_base",
            Self::R50kBase => "r50k_base",
        }
    }

    fn build(self) -> Result<CoreBPE> {
        let bpe = match self {
            Self::Cl100kBase => tiktoken_rs::cl100k_base(),
            Self::O200kBase => tiktoken_rs::o200k_base(),
            Self::P50kBase => tiktoken_rs::p50k_base(),
            Self::R50kBase => tiktoken_rs::r50k_base(),
        };
        bpe.map_err(|e| ChunkerError::tokenizer(format!("{}: {e}", self.as_str())))
    }

    fn load(self) -> Result<Arc<CoreBPE>> {
        let tables = BPE_TABLES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut tables = tables
            .lock()
            .map_err(|_| ChunkerError::tokenizer("tokenizer table cache poisoned"))?;
        if let Some(bpe) = tables.get(&self) {
            return Ok(Arc::clone(bpe));
        }

        log::debug!("Loading {} tokenizer tables", self.as_str());
        let bpe = Arc::new(self.build()?);
        tables.insert(self, Arc::clone(&bpe));
        Ok(bpe)
    }
}

impl<'de> Deserialize<'de> for TokenEncoding {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

impl fmt::Display for TokenEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts tokens with a fixed encoding and carries the immutable safe limit.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
    encoding: TokenEncoding,
    target_limit: usize,
    safe_limit: usize,
}

impl TokenCounter {
    /// Build a counter from a validated configuration
    pub fn new(config: &ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;

        Ok(Self {
            bpe: config.encoding.load()?,
            encoding: config.encoding,
            target_limit: config.target_limit,
            safe_limit: config.safe_limit(),
        })
    }

    /// Number of tokens in `text`. Special-token text is counted as ordinary text.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    /// Whether `text` fits within the safe limit
    pub fn fits(&self, text: &str) -> bool {
        self.count(text) <= self.safe_limit
    }

    #[must_use]
    pub const fn safe_limit(&self) -> usize {
        self.safe_limit
    }

    #[must_use]
    pub const fn target_limit(&self) -> usize {
        self.target_limit
    }

    #[must_use]
    pub const fn encoding(&self) -> TokenEncoding {
        self.encoding
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding)
            .field("target_limit", &self.target_limit)
            .field("safe_limit", &self.safe_limit)
            .finish()
    }
}
