// Starlark evaluation shared by templates and conditions
use crate::error::CompilationError;
use crate::record::Record;
use once_cell::sync::Lazy;
use starlark::collections::SmallMap;
use starlark::environment::{Globals, GlobalsBuilder, Module};
use starlark::eval::Evaluator;
use starlark::syntax::{AstModule, Dialect};
use starlark::values::{dict::Dict, Heap, Value};

static GLOBALS: Lazy<Globals> = Lazy::new(|| GlobalsBuilder::standard().build());

fn dialect() -> Dialect {
    Dialect {
        enable_f_strings: true,
        ..Dialect::Extended
    }
}

/// Syntax-check a script once at configuration time.
pub(crate) fn check_syntax(label: &str, source: &str) -> Result<(), CompilationError> {
    AstModule::parse(label, source.to_string(), &dialect())?;
    Ok(())
}

/// Evaluate `source` with `data` bound to the record and, when given,
/// `value` bound to the field's original text.
pub(crate) fn evaluate<T>(
    label: &str,
    source: &str,
    record: &Record,
    value: Option<&str>,
    convert: impl for<'v> FnOnce(Value<'v>) -> T,
) -> anyhow::Result<T> {
    let module = Module::new();
    let heap = module.heap();

    module.set("data", record_to_dict(heap, record)?);
    if let Some(value) = value {
        module.set("value", heap.alloc(value));
    }

    let ast = AstModule::parse(label, source.to_string(), &dialect())
        .map_err(|e| anyhow::anyhow!("{} parse error: {}", label, e))?;

    let mut eval = Evaluator::new(&module);
    let result = eval
        .eval_module(ast, &GLOBALS)
        .map_err(|e| anyhow::anyhow!("{} execution error: {}", label, e))?;

    Ok(convert(result))
}

fn record_to_dict<'v>(heap: &'v Heap, record: &Record) -> anyhow::Result<Value<'v>> {
    let mut content = SmallMap::new();
    for (name, value) in record {
        let key = heap.alloc(name);
        content.insert_hashed(
            key.get_hashed().map_err(|e| anyhow::anyhow!("{}", e))?,
            heap.alloc(value),
        );
    }
    Ok(heap.alloc(Dict::new(content)))
}

/// Text of a Starlark value: strings verbatim, `None` empty.
pub(crate) fn value_to_text(value: Value) -> String {
    if value.is_none() {
        String::new()
    } else if let Some(s) = value.unpack_str() {
        s.to_string()
    } else {
        value.to_string()
    }
}

/// Starlark truthiness for the scalar values a condition produces.
pub(crate) fn value_to_bool(value: Value) -> bool {
    if value.is_none() {
        false
    } else if let Some(b) = value.unpack_bool() {
        b
    } else {
        !(value.unpack_str().is_some_and(|s| s.is_empty()) || value.unpack_i32() == Some(0))
    }
}
