use crate::error::CompilationError;
use crate::record::Record;
use crate::script;
use std::fmt;
use std::sync::Arc;

/// Boolean predicate gating whether a rule runs on a record.
pub trait Condition: Send + Sync {
    fn evaluate(&self, record: &Record) -> bool;
}

/// Shared handle to a compiled condition.
pub type ConditionRef = Arc<dyn Condition>;

impl<F> Condition for F
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    fn evaluate(&self, record: &Record) -> bool {
        self(record)
    }
}

/// Condition written as a Starlark expression over `data`.
///
/// An expression that fails to evaluate counts as false.
pub struct StarlarkCondition {
    source: String,
}

impl StarlarkCondition {
    pub fn compile(source: &str) -> Result<Self, CompilationError> {
        script::check_syntax("condition", source)?;
        Ok(StarlarkCondition {
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Condition for StarlarkCondition {
    fn evaluate(&self, record: &Record) -> bool {
        script::evaluate("condition", &self.source, record, None, script::value_to_bool)
            .unwrap_or_else(|err| {
                tracing::warn!(
                    condition = %self.source,
                    error = %err,
                    "condition evaluated as false"
                );
                false
            })
    }
}

impl fmt::Debug for StarlarkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StarlarkCondition").field(&self.source).finish()
    }
}
