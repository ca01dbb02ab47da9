//! Effective-rule resolution for an upload target.

use crate::upload::relation::ModelRules;
use super::{Rule, RuleSet};

/// Fallback limits sourced from application configuration.
#[derive(Debug, Clone)]
pub struct UploadDefaults {
    pub max_file_size_kb: u64,
    pub accepted_mime_types: Vec<String>,
}

impl Default for UploadDefaults {
    fn default() -> Self {
        Self {
            max_file_size_kb: 10 * 1024,
            accepted_mime_types: Vec::new(),
        }
    }
}

/// Determines the rules an upload is validated against.
///
/// Precedence, first match wins: rules declared on the widget instance, then
/// rules the owning model exposes for the field, then built-in defaults. The
/// result is never empty: the defaults always carry at least the size rule.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    defaults: UploadDefaults,
}

impl RuleResolver {
    pub fn new(defaults: UploadDefaults) -> Self {
        Self { defaults }
    }

    pub fn resolve(
        &self,
        field_name: &str,
        declared: Option<&RuleSet>,
        model: Option<&dyn ModelRules>,
        accepted_file_types: Option<&[String]>,
        accepted_mime_types: Option<&[String]>,
    ) -> RuleSet {
        if let Some(rules) = declared {
            if !rules.is_empty() {
                return rules.clone();
            }
        }

        if let Some(model) = model {
            if let Some(rules) = model.file_upload_rules().remove(field_name) {
                if !rules.is_empty() {
                    return rules;
                }
            }
        }

        let mut rules = RuleSet::default();
        rules.push(Rule::max_size(self.defaults.max_file_size_kb));

        if let Some(types) = accepted_file_types {
            if !types.is_empty() {
                rules.push(Rule::extensions(types));
            }
        }

        let mimes = accepted_mime_types.unwrap_or(&self.defaults.accepted_mime_types);
        if !mimes.is_empty() {
            rules.push(Rule::mime_types(mimes));
        }

        rules
    }
}
