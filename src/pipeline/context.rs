use std::time::Duration;

/// Context passed to each processor for a record
pub struct RecordContext {
    pub line_number: usize,
}

/// Parse error details for deferred reporting
#[derive(Debug, Clone)]
pub struct ParseErrorInfo {
    pub line_number: usize,
    pub error: String,
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_processed: usize,
    pub records_output: usize,
    pub errors: usize,
    pub processing_time: Duration,
    pub parse_errors: Vec<ParseErrorInfo>,
}

impl ProcessingStats {
    /// Fold the stats of one stream into running totals
    pub fn accumulate(&mut self, other: &ProcessingStats) {
        self.records_processed += other.records_processed;
        self.records_output += other.records_output;
        self.errors += other.errors;
        self.processing_time += other.processing_time;
        self.parse_errors.extend(other.parse_errors.iter().cloned());
    }
}
