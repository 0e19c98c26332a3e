#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error("Starlark syntax error: {0}")]
    SyntaxError(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<starlark::Error> for CompilationError {
    fn from(err: starlark::Error) -> Self {
        CompilationError::SyntaxError(format!("{}", err))
    }
}
