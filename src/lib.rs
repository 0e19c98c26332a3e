// src/lib.rs
pub mod condition;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod rewrite;
mod script;
pub mod selector;
pub mod template;

pub use error::*;
pub use pipeline::*;

pub use condition::{Condition, ConditionRef, StarlarkCondition};
pub use record::Record;
pub use rewrite::RewriteRule;
pub use selector::{FieldSelector, GlobPattern};
pub use template::{StarlarkTemplate, Template, TemplateRef};
