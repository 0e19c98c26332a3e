use crate::condition::StarlarkCondition;
use crate::error::CompilationError;
use crate::rewrite::RewriteRule;
use crate::template::StarlarkTemplate;
use serde::Deserialize;
use std::sync::Arc;

/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub error_strategy: ErrorStrategy,
    pub buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            error_strategy: ErrorStrategy::Skip,
            buffer_size: 65536,       // 64KB
            max_line_length: 1048576, // 1MB
        }
    }
}

/// Simple error handling strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Skip problematic lines and continue processing
    Skip,
    /// Stop processing on first error
    FailFast,
}

/// Declarative description of one rewrite rule.
///
/// ```json
/// {"name": "mask", "fields": ["user.*"], "exclude": ["user.id"],
///  "template": "f\"{value}-masked\"", "condition": "data['level'] == 'info'"}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub template: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl RuleConfig {
    /// Configured name, or `"rewrite"` when none was given
    pub fn rule_name(&self) -> &str {
        self.name.as_deref().unwrap_or("rewrite")
    }

    pub fn build(&self) -> Result<RewriteRule, CompilationError> {
        if self.fields.is_empty() {
            return Err(CompilationError::ConfigError(format!(
                "rule '{}' has no field patterns",
                self.rule_name()
            )));
        }

        let template = StarlarkTemplate::compile(&self.template)?;
        let mut rule = RewriteRule::new(self.rule_name(), Arc::new(template));
        rule.add_patterns(self.fields.iter().cloned());
        for pattern in &self.exclude {
            rule.exclude_pattern(pattern.clone());
        }
        rule.selector().validate()?;

        if let Some(source) = &self.condition {
            rule.set_condition(Arc::new(StarlarkCondition::compile(source)?));
        }

        Ok(rule)
    }
}
