//! Rule evaluation over uploaded files.

use tracing::warn;

use crate::rules::{RuleContext, RuleRegistry, RuleScope, RuleSet};
use super::models::{UploadedFile, ValidationOutcome};

/// Runs uploaded files against a resolved rule set through the registry.
pub struct UploadValidator<'a> {
    registry: &'a RuleRegistry,
}

impl<'a> UploadValidator<'a> {
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self { registry }
    }

    /// Evaluates every rule and collects all violations in one pass, so the
    /// caller receives the complete list rather than the first failure.
    /// Per-request rules (`max_files`) are evaluated once, not per file.
    /// Unknown rule names are skipped; a manifest typo must not reject
    /// every upload.
    pub fn validate(
        &self,
        field: &str,
        files: &[UploadedFile],
        rules: &RuleSet,
        context: &RuleContext,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for rule in rules.iter() {
            let scope = match self.registry.scope(rule.name()) {
                Some(scope) => scope,
                None => {
                    warn!(rule = rule.name(), "skipping unknown validation rule");
                    continue;
                }
            };

            match scope {
                RuleScope::PerRequest => {
                    if let Some(file) = files.first() {
                        if self.registry.evaluate(rule, file, context) == Some(false) {
                            outcome.add(field, rule.message(field));
                        }
                    }
                }
                RuleScope::PerFile => {
                    for file in files {
                        if self.registry.evaluate(rule, file, context) == Some(false) {
                            outcome.add(field, rule.message(field));
                        }
                    }
                }
            }
        }

        outcome
    }
}
