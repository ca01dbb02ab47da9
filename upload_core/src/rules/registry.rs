//! Named rule registry: rule name mapped to a pure predicate.
//!
//! The registry is constructed once at startup and passed by reference to
//! the validator; registering custom rules never touches global state.

use std::collections::HashMap;

use crate::upload::models::UploadedFile;
use super::Rule;

/// Counting context supplied by the transaction before validation runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleContext {
    /// Files already attached to the owning relation for this field.
    pub existing_count: u64,
    /// Files carried by the current request.
    pub incoming_count: u64,
}

/// Whether a rule judges each file or the request as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    PerFile,
    PerRequest,
}

type RulePredicate = Box<dyn Fn(&UploadedFile, &[String], &RuleContext) -> bool + Send + Sync>;

pub struct RuleRegistry {
    predicates: HashMap<String, (RuleScope, RulePredicate)>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            predicates: HashMap::new(),
        }
    }

    /// Registry with the standard upload rules registered: `max`,
    /// `extensions`, `mimes` and the counting rule `max_files`.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();

        registry.register("max", RuleScope::PerFile, |file, params, _ctx| {
            match params.first().and_then(|p| p.parse::<u64>().ok()) {
                Some(kilobytes) => file.size() <= kilobytes * 1024,
                None => true,
            }
        });

        registry.register("extensions", RuleScope::PerFile, |file, params, _ctx| {
            match file.extension() {
                Some(extension) => params.iter().any(|p| p.eq_ignore_ascii_case(&extension)),
                None => false,
            }
        });

        registry.register("mimes", RuleScope::PerFile, |file, params, _ctx| {
            params.iter().any(|p| p.eq_ignore_ascii_case(file.content_type()))
        });

        // The relation accepts many files per field, so the limit bounds the
        // total: files already attached plus files in this request.
        registry.register("max_files", RuleScope::PerRequest, |_file, params, ctx| {
            match params.first().and_then(|p| p.parse::<u64>().ok()) {
                Some(limit) => ctx.existing_count + ctx.incoming_count <= limit,
                None => true,
            }
        });

        registry
    }

    pub fn register<F>(&mut self, name: &str, scope: RuleScope, predicate: F)
    where
        F: Fn(&UploadedFile, &[String], &RuleContext) -> bool + Send + Sync + 'static,
    {
        self.predicates
            .insert(name.to_lowercase(), (scope, Box::new(predicate)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn scope(&self, name: &str) -> Option<RuleScope> {
        self.predicates.get(name).map(|(scope, _)| *scope)
    }

    /// Evaluates a rule against a file. `None` when the rule name is unknown.
    pub fn evaluate(&self, rule: &Rule, file: &UploadedFile, context: &RuleContext) -> Option<bool> {
        self.predicates
            .get(rule.name())
            .map(|(_, predicate)| predicate(file, rule.params(), context))
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}
