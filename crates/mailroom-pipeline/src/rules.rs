//! Intent rule set: wire format, validation, and loading.
//!
//! The rule document is JSON:
//!
//! ```json
//! { "intent-rules": [ {
//!     "intent_id": "INTENT_INVOICE_REQ",
//!     "detection_rules": { "keywords": ["factura", "rfc"], "min_match_count": 1 },
//!     "extraction_strategy": "regex_simple",
//!     "target_action": {
//!         "type": "stored_procedure",
//!         "name": "sp_finance_process_invoice_request",
//!         "params_map": {
//!             "@order_ref": "extracted_order_id",
//!             "@notes": { "source": "full_text_body", "required": false },
//!             "@request_source": "_meta.channel_id"
//!         }
//!     }
//! } ] }
//! ```
//!
//! Rule order is significant: the classifier evaluates rules in document
//! order and the first rule reaching its threshold wins.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use mailroom_core::types::MessageMeta;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::extractor::ExtractionStrategy;

/// Prefix marking a parameter source as a message metadata field.
pub const META_PREFIX: &str = "_meta.";

// =============================================================================
// Validated model
// =============================================================================

/// Kind of downstream action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    StoredProcedure,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::StoredProcedure => write!(f, "stored_procedure"),
        }
    }
}

/// Where a parameter value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePath {
    /// Key in the extracted entity map.
    Entity(String),
    /// Message metadata field (written `_meta.<field>`).
    Meta(String),
}

impl SourcePath {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(META_PREFIX) {
            Some(field) => SourcePath::Meta(field.to_string()),
            None => SourcePath::Entity(raw.to_string()),
        }
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePath::Entity(key) => write!(f, "{}", key),
            SourcePath::Meta(field) => write!(f, "{}{}", META_PREFIX, field),
        }
    }
}

/// Binding of one action parameter to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub source: SourcePath,
    /// Unresolved required bindings fail the run; optional ones bind `NULL`.
    pub required: bool,
}

impl ParamBinding {
    pub fn required(source: &str) -> Self {
        Self {
            source: SourcePath::parse(source),
            required: true,
        }
    }

    pub fn optional(source: &str) -> Self {
        Self {
            source: SourcePath::parse(source),
            required: false,
        }
    }
}

/// The downstream procedure to call and how to fill its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub action_type: ActionType,
    pub name: String,
    pub params_map: BTreeMap<String, ParamBinding>,
}

/// A single intent rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRule {
    pub intent_id: String,
    /// Detection keywords in configured order, duplicates removed.
    pub keywords: Vec<String>,
    pub min_match_count: usize,
    /// Informational only; carried through to logs and `/rules`.
    pub priority_flag: Option<String>,
    pub extraction_strategy: ExtractionStrategy,
    pub target_action: ActionDescriptor,
    folded_keywords: Vec<String>,
}

impl IntentRule {
    pub fn new(
        intent_id: impl Into<String>,
        keywords: Vec<String>,
        min_match_count: usize,
        extraction_strategy: ExtractionStrategy,
        target_action: ActionDescriptor,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(keywords.len());
        let mut folded_keywords = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let folded = keyword.to_lowercase();
            if seen.insert(folded.clone()) {
                unique.push(keyword);
                folded_keywords.push(folded);
            }
        }

        Self {
            intent_id: intent_id.into(),
            keywords: unique,
            min_match_count,
            priority_flag: None,
            extraction_strategy,
            target_action,
            folded_keywords,
        }
    }

    pub fn with_priority_flag(mut self, flag: impl Into<String>) -> Self {
        self.priority_flag = Some(flag.into());
        self
    }

    /// Lower-cased keywords, aligned with `keywords`.
    pub fn folded_keywords(&self) -> &[String] {
        &self.folded_keywords
    }

    /// Whether the threshold can be reached at all.
    pub fn is_reachable(&self) -> bool {
        self.min_match_count <= self.keywords.len()
    }
}

/// Ordered, validated, immutable rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<IntentRule>,
}

impl RuleSet {
    /// Validate and wrap a list of rules.
    pub fn new(rules: Vec<IntentRule>) -> Result<Self, PipelineError> {
        if rules.is_empty() {
            return Err(PipelineError::Configuration(
                "Rule set contains no intent rules".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for rule in &rules {
            validate_rule(rule)?;
            if !ids.insert(rule.intent_id.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "Duplicate intent_id: {}",
                    rule.intent_id
                )));
            }
            if !rule.is_reachable() {
                warn!(
                    intent_id = %rule.intent_id,
                    min_match_count = rule.min_match_count,
                    keywords = rule.keywords.len(),
                    "Rule threshold exceeds its keyword count; it can never match"
                );
            }
        }

        Ok(Self { rules })
    }

    /// Parse and validate a JSON rule document.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let document: RuleDocument = serde_json::from_str(json).map_err(|e| {
            PipelineError::Configuration(format!("Invalid rule document: {}", e))
        })?;
        let rules = document
            .intent_rules
            .into_iter()
            .map(RawIntentRule::into_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    /// Load and validate the rule document at `path`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read rule file {}: {}",
                path.display(),
                e
            ))
        })?;
        let rule_set = Self::from_json_str(&content).map_err(|e| match e {
            PipelineError::Configuration(msg) => {
                PipelineError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!(
            rules = rule_set.len(),
            "Intent rules loaded from {}",
            path.display()
        );
        Ok(rule_set)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IntentRule> {
        self.rules.iter()
    }

    pub fn get(&self, intent_id: &str) -> Option<&IntentRule> {
        self.rules.iter().find(|r| r.intent_id == intent_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn validate_rule(rule: &IntentRule) -> Result<(), PipelineError> {
    let fail = |msg: String| {
        Err(PipelineError::Configuration(format!(
            "Rule '{}': {}",
            rule.intent_id, msg
        )))
    };

    if rule.intent_id.trim().is_empty() {
        return fail("intent_id must not be empty".to_string());
    }
    if rule.keywords.is_empty() {
        return fail("keywords must not be empty".to_string());
    }
    if rule.keywords.iter().any(|k| k.trim().is_empty()) {
        return fail("keywords must not be blank".to_string());
    }
    if rule.min_match_count == 0 {
        return fail("min_match_count must be at least 1".to_string());
    }
    if rule.target_action.name.trim().is_empty() {
        return fail("target_action.name must not be empty".to_string());
    }
    for (param, binding) in &rule.target_action.params_map {
        if param.trim().is_empty() {
            return fail("params_map contains an empty parameter name".to_string());
        }
        match &binding.source {
            SourcePath::Entity(key) if key.trim().is_empty() => {
                return fail(format!("parameter '{}' has an empty source", param));
            }
            SourcePath::Meta(field) if !MessageMeta::FIELDS.contains(&field.as_str()) => {
                return fail(format!(
                    "parameter '{}' references unknown metadata field '{}'",
                    param, field
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(rename = "intent-rules", alias = "intent_rules")]
    intent_rules: Vec<RawIntentRule>,
}

#[derive(Debug, Deserialize)]
struct RawIntentRule {
    intent_id: String,
    detection_rules: RawDetectionRules,
    extraction_strategy: String,
    #[serde(default)]
    target_action: Option<RawAction>,
    /// Older rule files name the action `et_action`; `target_action` wins
    /// when both are present.
    #[serde(default)]
    et_action: Option<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawDetectionRules {
    keywords: Vec<String>,
    #[serde(default = "default_min_match_count")]
    min_match_count: usize,
    #[serde(default)]
    priority_flag: Option<String>,
}

fn default_min_match_count() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    name: String,
    #[serde(default)]
    params_map: BTreeMap<String, RawParam>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawParam {
    Source(String),
    Detailed {
        source: String,
        #[serde(default = "default_required")]
        required: bool,
    },
}

fn default_required() -> bool {
    true
}

impl RawIntentRule {
    fn into_rule(self) -> Result<IntentRule, PipelineError> {
        let extraction_strategy: ExtractionStrategy =
            self.extraction_strategy.parse().map_err(|e: PipelineError| {
                PipelineError::Configuration(format!("Rule '{}': {}", self.intent_id, e))
            })?;

        let action = match self.target_action.or(self.et_action) {
            Some(action) => action,
            None => {
                return Err(PipelineError::Configuration(format!(
                    "Rule '{}': missing target_action",
                    self.intent_id
                )))
            }
        };

        let action_type = match action.action_type.as_str() {
            "stored_procedure" => ActionType::StoredProcedure,
            other => {
                return Err(PipelineError::Configuration(format!(
                    "Rule '{}': unsupported action type '{}'",
                    self.intent_id, other
                )))
            }
        };

        let params_map = action
            .params_map
            .into_iter()
            .map(|(param, raw)| {
                let binding = match raw {
                    RawParam::Source(source) => ParamBinding::required(&source),
                    RawParam::Detailed { source, required } => ParamBinding {
                        source: SourcePath::parse(&source),
                        required,
                    },
                };
                (param, binding)
            })
            .collect();

        let mut rule = IntentRule::new(
            self.intent_id,
            self.detection_rules.keywords,
            self.detection_rules.min_match_count,
            extraction_strategy,
            ActionDescriptor {
                action_type,
                name: action.name,
                params_map,
            },
        );
        rule.priority_flag = self.detection_rules.priority_flag;
        Ok(rule)
    }
}
