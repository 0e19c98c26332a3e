//! Glob-based selection of record fields.

use crate::error::CompilationError;
use crate::record::Record;
use glob::Pattern;

/// One configured pattern, with the polarity it was added with.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    include: bool,
    compiled: Option<Pattern>,
}

impl GlobPattern {
    fn new(source: String, include: bool) -> Self {
        // A malformed pattern is kept so it can be reported by `validate`,
        // but it never matches anything.
        let compiled = Pattern::new(&source).ok();
        GlobPattern {
            source,
            include,
            compiled,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_include(&self) -> bool {
        self.include
    }

    pub fn matches(&self, name: &str) -> bool {
        self.compiled
            .as_ref()
            .is_some_and(|pattern| pattern.matches(name))
    }
}

/// Ordered set of glob patterns over field names.
///
/// A field is selected when the last pattern matching its name is an include
/// pattern. With include patterns only, that is any field matching at least
/// one of them.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    patterns: Vec<GlobPattern>,
}

impl FieldSelector {
    pub fn new() -> Self {
        FieldSelector::default()
    }

    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        self.patterns.push(GlobPattern::new(pattern.into(), true));
    }

    pub fn exclude_pattern(&mut self, pattern: impl Into<String>) {
        self.patterns.push(GlobPattern::new(pattern.into(), false));
    }

    pub fn patterns(&self) -> &[GlobPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Report the first pattern the glob engine rejects.
    pub fn validate(&self) -> Result<(), CompilationError> {
        for pattern in &self.patterns {
            if let Err(err) = Pattern::new(&pattern.source) {
                return Err(CompilationError::InvalidPattern {
                    pattern: pattern.source.clone(),
                    message: format!("{} at position {}", err.msg, err.pos),
                });
            }
        }
        Ok(())
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.patterns
            .iter()
            .rev()
            .find(|pattern| pattern.matches(name))
            .is_some_and(GlobPattern::is_include)
    }

    /// Lazily yield the selected fields of `record`, in record order.
    ///
    /// Each field is yielded at most once, however many patterns match it.
    pub fn matches<'r>(
        &'r self,
        record: &'r Record,
    ) -> impl Iterator<Item = (&'r str, &'r str)> + 'r {
        record.iter().filter(move |(name, _)| self.is_selected(name))
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSelector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selector = FieldSelector::new();
        for pattern in iter {
            selector.add_pattern(pattern);
        }
        selector
    }
}
