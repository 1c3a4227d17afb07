//! Core data structures for the field and weather pipelines.
//!
//! Defines the column swap directive, the crop value rename map, compiled
//! measurement pattern rules, extracted measurements, and the pipeline
//! state machine shared by both processors.

use crate::error::{PipelineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Two existing column names whose contents must be exchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSwap {
    pub first: String,
    pub second: String,
}

impl ColumnSwap {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

/// Raw categorical value to canonical value. Unmapped values pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueRenameMap(HashMap<String, String>);

impl ValueRenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        self.0.insert(raw.into(), canonical.into());
    }

    /// Canonical value for `raw`, or `raw` itself when it has no mapping
    pub fn apply<'a>(&'a self, raw: &'a str) -> &'a str {
        self.0.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ValueRenameMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(raw, canonical)| (raw.into(), canonical.into()))
                .collect(),
        )
    }
}

/// A typed measurement extracted from one station message
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub kind: String,
    pub value: f64,
}

/// Uncompiled rule as it appears in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub kind: String,
    pub pattern: String,
}

impl PatternSpec {
    pub fn new(kind: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            pattern: pattern.into(),
        }
    }
}

/// A measurement kind paired with its compiled pattern
#[derive(Debug, Clone)]
pub struct PatternRule {
    kind: String,
    pattern: Regex,
}

impl PatternRule {
    /// Compile a rule. The pattern must contain at least one capture group.
    pub fn new(kind: impl Into<String>, pattern: &str) -> Result<Self> {
        let kind = kind.into();
        let regex = Regex::new(pattern).map_err(|e| PipelineError::Pattern {
            kind: kind.clone(),
            reason: e.to_string(),
        })?;

        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 2 {
            return Err(PipelineError::Pattern {
                kind,
                reason: "pattern has no capture group for the value".to_string(),
            });
        }

        Ok(Self {
            kind,
            pattern: regex,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Ordered rules; the first rule whose pattern matches a message wins
#[derive(Debug, Clone, Default)]
pub struct PatternRuleSet {
    rules: Vec<PatternRule>,
}

impl PatternRuleSet {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Compile rules from configuration, preserving their order
    pub fn compile(specs: &[PatternSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .map(|spec| PatternRule::new(spec.kind.clone(), &spec.pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Lifecycle of a pipeline's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PipelineState {
    #[default]
    Uninitialized,
    Loaded,
    Processed,
    Aggregated,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Loaded => "loaded",
            PipelineState::Processed => "processed",
            PipelineState::Aggregated => "aggregated",
        };
        f.write_str(name)
    }
}
