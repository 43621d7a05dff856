use crate::tokens::TokenEncoding;
use serde::{Deserialize, Serialize};

/// Configuration for the chunking engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Nominal token budget per chunk
    pub target_limit: usize,

    /// Fraction of `target_limit` reserved for downstream overhead
    pub safety_margin: f64,

    /// Tokenizer scheme used for every size decision
    pub encoding: TokenEncoding,

    /// Overlap (tokens) when force-splitting plain text buffers
    pub text_overlap: usize,

    /// Overlap (tokens) when splitting oversized protected spans and code cells
    pub block_overlap: usize,

    /// Overlap (tokens) for the source-code fallback splitter
    pub source_overlap: usize,

    /// Overlap for oversized web/API sections, as a fraction of the safe limit
    pub section_overlap_ratio: f64,

    /// Overlap (tokens) for oversized PDF-markdown sections
    pub pdf_section_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_limit: 2000,
            safety_margin: 0.10,
            encoding: TokenEncoding::default(),
            text_overlap: 100,
            block_overlap: 50,
            source_overlap: 200,
            section_overlap_ratio: 0.10,
            pdf_section_overlap: 100,
        }
    }
}

impl ChunkerConfig {
    /// Config with a different target limit and every other knob at its default
    #[must_use]
    pub fn with_target_limit(target_limit: usize) -> Self {
        Self {
            target_limit,
            ..Default::default()
        }
    }

    /// Token budget every emitted chunk must respect
    #[must_use]
    pub fn safe_limit(&self) -> usize {
        safe_limit(self.target_limit, self.safety_margin)
    }

    /// Overlap for section sub-splits, derived from the safe limit
    #[must_use]
    pub fn section_overlap(&self) -> usize {
        (self.safe_limit() as f64 * self.section_overlap_ratio) as usize
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target_limit == 0 {
            return Err("target_limit must be > 0".to_string());
        }

        if !(0.0..1.0).contains(&self.safety_margin) {
            return Err(format!(
                "safety_margin ({}) must be within [0, 1)",
                self.safety_margin
            ));
        }

        if !(0.0..1.0).contains(&self.section_overlap_ratio) {
            return Err(format!(
                "section_overlap_ratio ({}) must be within [0, 1)",
                self.section_overlap_ratio
            ));
        }

        if self.safe_limit() == 0 {
            return Err(format!(
                "safe limit is 0 for target_limit {} and safety_margin {}",
                self.target_limit, self.safety_margin
            ));
        }

        Ok(())
    }
}

/// `floor(target_limit * (1 - safety_margin))`
#[must_use]
pub fn safe_limit(target_limit: usize, safety_margin: f64) -> usize {
    (target_limit as f64 * (1.0 - safety_margin)).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.safe_limit(), 1800);
    }

    #[test]
    fn test_safe_limit_floors() {
        assert_eq!(safe_limit(250, 0.10), 225);
        assert_eq!(safe_limit(1000, 0.10), 900);
        assert_eq!(safe_limit(333, 0.10), 299);
        assert_eq!(safe_limit(100, 0.0), 100);
    }

    #[test]
    fn test_section_overlap_tracks_safe_limit() {
        let config = ChunkerConfig::with_target_limit(1000);
        assert_eq!(config.section_overlap(), 90);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChunkerConfig::default();

        // Invalid: no budget
        config.target_limit = 0;
        assert!(config.validate().is_err());

        // Invalid: margin eats the whole budget
        config.target_limit = 2000;
        config.safety_margin = 1.0;
        assert!(config.validate().is_err());

        config.safety_margin = -0.5;
        assert!(config.validate().is_err());

        // Invalid: rounds down to nothing
        config.target_limit = 1;
        config.safety_margin = 0.5;
        assert!(config.validate().is_err());

        // Valid configuration
        config.target_limit = 512;
        config.safety_margin = 0.2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ChunkerConfig =
            serde_json::from_str(r#"{"target_limit": 500, "encoding": "o200k_base"}"#).unwrap();
        assert_eq!(config.target_limit, 500);
        assert_eq!(config.encoding, TokenEncoding::O200kBase);
        assert_eq!(config.text_overlap, 100);
        assert!((config.safety_margin - 0.10).abs() < f64::EPSILON);
    }
}
