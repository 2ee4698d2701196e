//! Label selector compiler
//!
//! Turns the `bindingRules` / `bindingExcludedRules` maps of a
//! PolicyGenTemplate into a Kubernetes `matchExpressions` selector.
//! Each label becomes one `In` (included) or `NotIn` (excluded) expression.

use std::fmt;

use indexmap::IndexMap;
use pgt2acm_core::Value;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SelectorError;

/// Label key to the values it may (or may not) take
pub type LabelRules = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    In,
    NotIn,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
        })
    }
}

/// One label constraint before compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelectorRule {
    pub key: String,
    pub values: Vec<String>,
    pub included: bool,
}

impl LabelSelectorRule {
    pub fn operator(&self) -> Operator {
        if self.included {
            Operator::In
        } else {
            Operator::NotIn
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorExpression {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

/// A `matchExpressions` label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSelector {
    pub match_expressions: Vec<SelectorExpression>,
}

impl CompiledSelector {
    pub fn is_empty(&self) -> bool {
        self.match_expressions.is_empty()
    }
}

/// Included rules in input order, then excluded rules in input order
pub fn label_to_selector(include: &LabelRules, exclude: &LabelRules) -> Vec<LabelSelectorRule> {
    let rules = |rules: &LabelRules, included: bool| {
        rules
            .iter()
            .map(move |(key, values)| LabelSelectorRule {
                key: key.clone(),
                values: values.clone(),
                included,
            })
            .collect::<Vec<_>>()
    };

    let mut out = rules(include, true);
    out.extend(rules(exclude, false));
    out
}

/// Compile rules into a selector.
///
/// Expressions are sorted by key; for the same key the `In` expression comes
/// before the `NotIn` one. Values keep their given order.
pub fn output_generic(rules: &[LabelSelectorRule]) -> Result<CompiledSelector, SelectorError> {
    let mut sorted: Vec<&LabelSelectorRule> = rules.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key).then(b.included.cmp(&a.included)));

    let match_expressions = sorted
        .into_iter()
        .map(|rule| {
            if rule.values.is_empty() {
                return Err(SelectorError {
                    key: rule.key.clone(),
                    operator: rule.operator(),
                });
            }
            Ok(SelectorExpression {
                key: rule.key.clone(),
                operator: rule.operator(),
                values: rule.values.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledSelector { match_expressions })
}

/// Shorthand for [`label_to_selector`] followed by [`output_generic`]
pub fn compile(include: &LabelRules, exclude: &LabelRules) -> Result<CompiledSelector, SelectorError> {
    output_generic(&label_to_selector(include, exclude))
}

/// Deserialize label rules whose values are a scalar or a list of scalars.
///
/// `common: "true"`, `common: true` and `common: ["true"]` all read as
/// `["true"]`; `null` reads as no values.
pub fn deserialize_rules<'de, D>(deserializer: D) -> Result<LabelRules, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw: IndexMap<String, Value> = IndexMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let values = match value {
                Value::Null => Vec::new(),
                Value::Sequence(items) => items
                    .iter()
                    .map(scalar_string)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| D::Error::custom(format!("label '{key}' has a non-scalar value")))?,
                other => vec![scalar_string(&other).ok_or_else(|| {
                    D::Error::custom(format!("label '{key}' has a non-scalar value"))
                })?],
            };
            Ok((key, values))
        })
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
