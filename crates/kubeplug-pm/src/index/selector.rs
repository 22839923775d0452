//! Kubernetes-style label selectors.
//!
//! A selector is a conjunction of requirements over a string label set.
//! `matchLabels` entries are equality requirements; `matchExpressions`
//! support `In`, `NotIn`, `Exists` and `DoesNotExist`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{PluginError, Result};

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Selector requiring each of the given labels.
    pub fn with_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            match_expressions: Vec::new(),
        }
    }

    /// Validate the selector and turn it into a predicate.
    pub fn compile(&self) -> Result<Selector> {
        let mut requirements = Vec::with_capacity(self.match_labels.len() + self.match_expressions.len());

        for (key, value) in &self.match_labels {
            validate_key(key)?;
            requirements.push(Requirement {
                key: key.clone(),
                operator: SelectorOperator::In,
                values: vec![value.clone()],
            });
        }

        for expr in &self.match_expressions {
            validate_key(&expr.key)?;
            match expr.operator {
                SelectorOperator::In | SelectorOperator::NotIn if expr.values.is_empty() => {
                    return Err(PluginError::InvalidSelector(format!(
                        "operator {:?} on key {:?} requires at least one value",
                        expr.operator, expr.key
                    )));
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist if !expr.values.is_empty() => {
                    return Err(PluginError::InvalidSelector(format!(
                        "operator {:?} on key {:?} must not have values",
                        expr.operator, expr.key
                    )));
                }
                _ => {}
            }
            requirements.push(Requirement {
                key: expr.key.clone(),
                operator: expr.operator,
                values: expr.values.clone(),
            });
        }

        Ok(Selector { requirements })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A compiled selector.
#[derive(Debug, Clone)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

#[derive(Debug, Clone)]
struct Requirement {
    key: String,
    operator: SelectorOperator,
    values: Vec<String>,
}

impl Selector {
    /// Every requirement must hold; labels not mentioned are ignored.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|req| {
            let value = labels.get(&req.key);
            match req.operator {
                SelectorOperator::In => value.is_some_and(|v| req.values.contains(v)),
                SelectorOperator::NotIn => value.map_or(true, |v| !req.values.contains(v)),
                SelectorOperator::Exists => value.is_some(),
                SelectorOperator::DoesNotExist => value.is_none(),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

fn key_regex() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| {
        Regex::new(
            r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$",
        )
        .expect("label key regex is valid")
    })
}

fn validate_key(key: &str) -> Result<()> {
    if key_regex().is_match(key) {
        Ok(())
    } else {
        Err(PluginError::InvalidSelector(format!("invalid label key {:?}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_match_labels_requires_all_keys() {
        let selector = LabelSelector::with_labels([("os", "linux"), ("arch", "amd64")])
            .compile()
            .unwrap();

        assert!(selector.matches(&labels(&[("os", "linux"), ("arch", "amd64")])));
        assert!(selector.matches(&labels(&[("os", "linux"), ("arch", "amd64"), ("extra", "x")])));
        assert!(!selector.matches(&labels(&[("os", "linux")])));
        assert!(!selector.matches(&labels(&[("os", "linux"), ("arch", "arm64")])));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::default().compile().unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&Labels::new()));
        assert!(selector.matches(&labels(&[("os", "windows")])));
    }

    #[test]
    fn test_match_expressions() {
        let selector = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![
                LabelSelectorRequirement {
                    key: "os".to_string(),
                    operator: SelectorOperator::In,
                    values: vec!["linux".to_string(), "darwin".to_string()],
                },
                LabelSelectorRequirement {
                    key: "arch".to_string(),
                    operator: SelectorOperator::NotIn,
                    values: vec!["386".to_string()],
                },
                LabelSelectorRequirement {
                    key: "legacy".to_string(),
                    operator: SelectorOperator::DoesNotExist,
                    values: Vec::new(),
                },
            ],
        }
        .compile()
        .unwrap();

        assert!(selector.matches(&labels(&[("os", "darwin"), ("arch", "arm64")])));
        assert!(!selector.matches(&labels(&[("os", "windows"), ("arch", "amd64")])));
        assert!(!selector.matches(&labels(&[("os", "linux"), ("arch", "386")])));
        assert!(!selector.matches(&labels(&[("os", "linux"), ("arch", "amd64"), ("legacy", "1")])));
    }

    #[test]
    fn test_malformed_selectors() {
        let bad_key = LabelSelector::with_labels([("os name", "linux")]);
        assert!(matches!(bad_key.compile(), Err(PluginError::InvalidSelector(_))));

        let in_without_values = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![LabelSelectorRequirement {
                key: "os".to_string(),
                operator: SelectorOperator::In,
                values: Vec::new(),
            }],
        };
        assert!(in_without_values.compile().is_err());

        let exists_with_values = LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![LabelSelectorRequirement {
                key: "os".to_string(),
                operator: SelectorOperator::Exists,
                values: vec!["linux".to_string()],
            }],
        };
        assert!(exists_with_values.compile().is_err());
    }
}
