//! Pattern-driven bulk field rewriting.
//!
//! A [`RewriteRule`] selects the fields of a record whose names match its
//! glob patterns and overwrites each of them with the output of a template.
//!
//! The set of fields to rewrite is fixed before the first write, so a field
//! created during the pass is never itself selected. Rendering, on the other
//! hand, sees the record as it is at that moment: a template evaluated for a
//! later field observes the new values of fields rewritten before it, and
//! the old values of fields still to come. Fields are visited in record
//! order (insertion order).

use crate::condition::ConditionRef;
use crate::pipeline::context::RecordContext;
use crate::pipeline::stream::RecordProcessor;
use crate::record::Record;
use crate::selector::FieldSelector;
use crate::template::TemplateRef;
use std::fmt;

/// Rewrites every selected field of a record with a shared template.
///
/// Cloning gives the clone its own copy of the selector and shares the
/// template and condition with the original.
#[derive(Clone)]
pub struct RewriteRule {
    name: String,
    selector: FieldSelector,
    template: TemplateRef,
    condition: Option<ConditionRef>,
}

impl RewriteRule {
    pub fn new(name: &str, template: TemplateRef) -> Self {
        RewriteRule {
            name: name.to_string(),
            selector: FieldSelector::new(),
            template,
            condition: None,
        }
    }

    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        self.selector.add_pattern(pattern);
    }

    pub fn add_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            self.selector.add_pattern(pattern);
        }
    }

    pub fn exclude_pattern(&mut self, pattern: impl Into<String>) {
        self.selector.exclude_pattern(pattern);
    }

    pub fn set_condition(&mut self, condition: ConditionRef) {
        self.condition = Some(condition);
    }

    pub fn with_condition(mut self, condition: ConditionRef) -> Self {
        self.set_condition(condition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &FieldSelector {
        &self.selector
    }

    pub fn template(&self) -> &TemplateRef {
        &self.template
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    /// Apply the rule to `record` in place.
    pub fn process(&self, record: &mut Record) {
        if let Some(condition) = &self.condition {
            if !condition.evaluate(record) {
                tracing::debug!(rule = %self.name, "condition false, record left unchanged");
                return;
            }
        }

        let matched: Vec<(String, String)> = self
            .selector
            .matches(record)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        for (name, original) in &matched {
            let rendered = self.template.render(record, original);
            tracing::trace!(rule = %self.name, field = %name, "rewriting field");
            record.set(name.as_str(), rendered);
        }

        tracing::debug!(rule = %self.name, rewritten = matched.len(), "rule applied");
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

impl RecordProcessor for RewriteRule {
    fn process(&self, record: &mut Record, ctx: &RecordContext) {
        let _span =
            tracing::debug_span!("rewrite", rule = %self.name, line = ctx.line_number).entered();
        RewriteRule::process(self, record);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clone_processor(&self) -> Box<dyn RecordProcessor> {
        Box::new(self.clone())
    }
}
