//! Validation rule expressions and their resolution.

pub mod registry;
pub mod resolver;

pub use registry::{RuleContext, RuleRegistry, RuleScope};
pub use resolver::{RuleResolver, UploadDefaults};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid rule expression: {0}")]
pub struct RuleParseError(String);

/// A single named rule expression, e.g. `max:5120` or `extensions:jpg,png`.
///
/// Expressions are written as `name:comma,separated,params`; a bare name
/// carries no parameters. Rule names are matched case-insensitively against
/// the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rule {
    name: String,
    params: Vec<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn max_size(kilobytes: u64) -> Self {
        Self::new("max", vec![kilobytes.to_string()])
    }

    pub fn extensions<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            "extensions",
            allowed.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
        )
    }

    pub fn mime_types<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            "mimes",
            allowed.into_iter().map(|s| s.as_ref().to_string()).collect(),
        )
    }

    pub fn max_files(limit: u64) -> Self {
        Self::new("max_files", vec![limit.to_string()])
    }

    /// Message shown to the caller when this rule rejects the upload.
    pub fn message(&self, field: &str) -> String {
        match self.name.as_str() {
            "max" => format!(
                "{} exceeds the maximum size of {} KB",
                field,
                self.params.first().map(String::as_str).unwrap_or("?")
            ),
            "extensions" => format!(
                "{} must have one of the following extensions: {}",
                field,
                self.params.join(", ")
            ),
            "mimes" => format!(
                "{} must be one of the following types: {}",
                field,
                self.params.join(", ")
            ),
            "max_files" => format!(
                "{}: no more than {} files may be uploaded",
                field,
                self.params.first().map(String::as_str).unwrap_or("?")
            ),
            other => format!("{} failed the {} rule", field, other),
        }
    }
}

impl TryFrom<String> for Rule {
    type Error = RuleParseError;

    fn try_from(expression: String) -> Result<Self, Self::Error> {
        let expression = expression.trim();
        let (name, body) = match expression.split_once(':') {
            Some((name, body)) => (name.trim(), Some(body)),
            None => (expression, None),
        };

        if name.is_empty() {
            return Err(RuleParseError(expression.to_string()));
        }

        let params = body
            .map(|body| {
                body.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Rule::new(name, params))
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.params.join(","))
        }
    }
}

/// Ordered list of named validation constraints applied to an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<Rule>);

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    /// Parses a list of `name:params` expressions in order.
    pub fn parse<I, S>(expressions: I) -> Result<Self, RuleParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        expressions
            .into_iter()
            .map(|e| Rule::try_from(e.as_ref().to_string()))
            .collect()
    }

    pub fn push(&mut self, rule: Rule) {
        self.0.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_with_single_param() {
        let rule = Rule::try_from("max:5120".to_string()).unwrap();
        assert_eq!(rule.name(), "max");
        assert_eq!(rule.params(), &["5120".to_string()]);
    }

    #[test]
    fn test_parse_rule_with_param_list() {
        let rule = Rule::try_from("extensions:jpg, png".to_string()).unwrap();
        assert_eq!(rule.name(), "extensions");
        assert_eq!(rule.params(), &["jpg".to_string(), "png".to_string()]);
    }

    #[test]
    fn test_parse_bare_rule_name() {
        let rule = Rule::try_from("required".to_string()).unwrap();
        assert_eq!(rule.name(), "required");
        assert!(rule.params().is_empty());
    }

    #[test]
    fn test_parse_empty_expression_fails() {
        assert!(Rule::try_from("".to_string()).is_err());
        assert!(Rule::try_from(":jpg".to_string()).is_err());
    }

    #[test]
    fn test_rule_display_round_trips() {
        for expression in ["max:5120", "extensions:jpg,png", "required"] {
            let rule = Rule::try_from(expression.to_string()).unwrap();
            assert_eq!(rule.to_string(), expression);
        }
    }

    #[test]
    fn test_rule_name_is_lowercased() {
        let rule = Rule::try_from("MAX:100".to_string()).unwrap();
        assert_eq!(rule.name(), "max");
    }

    #[test]
    fn test_ruleset_parse_preserves_order() {
        let rules = RuleSet::parse(["max:5120", "extensions:jpg,png", "max_files:5"]).unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["max", "extensions", "max_files"]);
    }

    #[test]
    fn test_ruleset_deserializes_from_expression_list() {
        let rules: RuleSet = serde_json::from_str(r#"["max:2048", "mimes:image/png"]"#).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.iter().next().unwrap(), &Rule::max_size(2048));
    }
}
