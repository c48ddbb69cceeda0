//! Entity extraction from message bodies.
//!
//! Strategies are a closed set resolved when the rule set is loaded. Every
//! strategy also contributes the raw body and the channel id.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use mailroom_core::types::MessageMeta;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Entity key holding the full raw message body.
pub const FULL_TEXT_BODY: &str = "full_text_body";
/// Entity key holding the channel id from message metadata.
pub const CHANNEL_ID: &str = "channel_id";
/// Order identifier, e.g. `ORD-12345`.
pub const EXTRACTED_ORDER_ID: &str = "extracted_order_id";
/// Mexican tax id (RFC), 12 characters for companies, 13 for individuals.
pub const EXTRACTED_RFC: &str = "extracted_rfc";

/// Extracted entities keyed by entity name.
///
/// A key is absent when its pattern did not match; values are never empty
/// placeholders.
pub type EntityMap = BTreeMap<String, String>;

/// Named extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Fixed table of regular expressions, first match per entity.
    RegexSimple,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategy::RegexSimple => write!(f, "regex_simple"),
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex_simple" => Ok(ExtractionStrategy::RegexSimple),
            _ => Err(PipelineError::Configuration(format!(
                "Unknown extraction strategy: {}",
                s
            ))),
        }
    }
}

/// Compiled entity patterns, built once and shared by every run.
pub struct EntityExtractor {
    regex_simple: Vec<(&'static str, Regex)>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    /// Create an extractor with all strategy patterns compiled.
    pub fn new() -> Self {
        let regex_simple: Vec<(&'static str, &str)> = vec![
            (EXTRACTED_ORDER_ID, r"(?i)\b(ORD-\d+)\b"),
            (EXTRACTED_RFC, r"(?i)\b([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})\b"),
        ];

        Self {
            regex_simple: regex_simple
                .into_iter()
                .map(|(key, pat)| (key, Regex::new(pat).expect("Invalid entity regex")))
                .collect(),
        }
    }

    /// Extract entities from `body` with the given strategy.
    ///
    /// Pure: the same inputs always produce the same map.
    pub fn extract(
        &self,
        body: &str,
        meta: MessageMeta<'_>,
        strategy: ExtractionStrategy,
    ) -> EntityMap {
        let mut entities = EntityMap::new();

        match strategy {
            ExtractionStrategy::RegexSimple => {
                for (key, regex) in &self.regex_simple {
                    if let Some(m) = regex.captures(body).and_then(|caps| caps.get(1)) {
                        entities.insert((*key).to_string(), m.as_str().to_string());
                    }
                }
            }
        }

        entities.insert(FULL_TEXT_BODY.to_string(), body.to_string());
        entities.insert(CHANNEL_ID.to_string(), meta.channel_id.to_string());

        tracing::debug!(
            strategy = %strategy,
            entities = entities.len(),
            "Entities extracted"
        );
        entities
    }
}
