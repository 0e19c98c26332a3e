use crate::error::CompilationError;
use crate::record::Record;
use crate::script;
use std::fmt;
use std::sync::Arc;

/// A compiled template producing the new text of a rewritten field.
///
/// `render` receives the record as it is *now* (including rewrites done
/// earlier in the same pass) and the original value of the field being
/// rewritten. It never fails: anything it cannot resolve renders as empty
/// text.
pub trait Template: Send + Sync {
    fn render(&self, record: &Record, value: &str) -> String;
}

/// Shared handle to a compiled template.
pub type TemplateRef = Arc<dyn Template>;

impl<F> Template for F
where
    F: Fn(&Record, &str) -> String + Send + Sync,
{
    fn render(&self, record: &Record, value: &str) -> String {
        self(record, value)
    }
}

/// Template written as a Starlark expression.
///
/// `data` holds the record's current fields and `value` the original value
/// of the field being rewritten, e.g. `f"{value}-masked"` or
/// `value.upper()`.
pub struct StarlarkTemplate {
    source: String,
}

impl StarlarkTemplate {
    pub fn compile(source: &str) -> Result<Self, CompilationError> {
        script::check_syntax("template", source)?;
        Ok(StarlarkTemplate {
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Template for StarlarkTemplate {
    fn render(&self, record: &Record, value: &str) -> String {
        script::evaluate("template", &self.source, record, Some(value), script::value_to_text)
            .unwrap_or_else(|err| {
                tracing::warn!(
                    template = %self.source,
                    error = %err,
                    "template rendered as empty text"
                );
                String::new()
            })
    }
}

impl fmt::Debug for StarlarkTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StarlarkTemplate").field(&self.source).finish()
    }
}
