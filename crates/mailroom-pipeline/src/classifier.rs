//! Keyword-threshold intent classification.

use crate::rules::{IntentRule, RuleSet};

/// Outcome of classifying one message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult<'r> {
    /// The winning rule, if any rule reached its threshold.
    pub matched_rule: Option<&'r IntentRule>,
    /// Distinct keywords of the winning rule found in the body.
    pub match_count: usize,
}

impl<'r> MatchResult<'r> {
    pub fn no_match() -> Self {
        Self {
            matched_rule: None,
            match_count: 0,
        }
    }

    pub fn intent_id(&self) -> Option<&'r str> {
        self.matched_rule.map(|r| r.intent_id.as_str())
    }

    pub fn is_match(&self) -> bool {
        self.matched_rule.is_some()
    }
}

/// Number of distinct rule keywords contained in the lower-cased body.
///
/// Substring containment, so "factura" also counts inside "facturación".
/// A keyword occurring several times counts once.
pub fn count_matches(folded_body: &str, rule: &IntentRule) -> usize {
    rule.folded_keywords()
        .iter()
        .filter(|kw| folded_body.contains(kw.as_str()))
        .count()
}

/// Classify `body` against `rules`.
///
/// Rules are tried in order; the first whose match count reaches its
/// `min_match_count` wins, even if a later rule would match more keywords.
pub fn classify<'r>(body: &str, rules: &'r RuleSet) -> MatchResult<'r> {
    let folded = body.to_lowercase();

    for rule in rules.iter() {
        let count = count_matches(&folded, rule);
        if count >= rule.min_match_count {
            tracing::debug!(
                intent_id = %rule.intent_id,
                match_count = count,
                "Intent classified"
            );
            return MatchResult {
                matched_rule: Some(rule),
                match_count: count,
            };
        }
    }

    tracing::debug!("No intent rule reached its threshold");
    MatchResult::no_match()
}
