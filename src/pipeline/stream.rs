// src/pipeline/stream.rs
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ProcessingError;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{ParseErrorInfo, ProcessingStats, RecordContext};
use crate::record::Record;

/// Main trait for record processing steps
///
/// `process` takes `&self`: a processor is immutable once configured and may
/// be shared by several workers, each handing it records it owns exclusively.
pub trait RecordProcessor: Send + Sync {
    fn process(&self, record: &mut Record, ctx: &RecordContext);
    fn name(&self) -> &str;
    fn clone_processor(&self) -> Box<dyn RecordProcessor>;
}

/// Main pipeline orchestrator
pub struct StreamPipeline {
    processors: Vec<Box<dyn RecordProcessor>>,
    config: PipelineConfig,
    stats: ProcessingStats,
    line_number: usize,
}

impl StreamPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        StreamPipeline {
            processors: Vec::new(),
            config,
            stats: ProcessingStats::default(),
            line_number: 0,
        }
    }

    pub fn add_processor(&mut self, processor: Box<dyn RecordProcessor>) {
        self.processors.push(processor);
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Copy of this pipeline for another worker: same config, cloned
    /// processors, fresh stats.
    pub fn fork(&self) -> StreamPipeline {
        StreamPipeline {
            processors: self.processors.iter().map(|p| p.clone_processor()).collect(),
            config: self.config.clone(),
            stats: ProcessingStats::default(),
            line_number: 0,
        }
    }

    /// Run every processor over a record this caller owns.
    pub fn process_record(&self, record: &mut Record) {
        let ctx = RecordContext {
            line_number: self.line_number,
        };
        for processor in &self.processors {
            processor.process(record, &ctx);
        }
    }

    /// Check out a possibly shared record, then process the private copy.
    pub fn process_shared(&self, shared: Arc<Record>) -> Record {
        let mut record = Record::checkout(shared);
        self.process_record(&mut record);
        record
    }

    /// Process one JSON-lines stream
    pub fn process_stream<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        output: &mut W,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();

        self.line_number = 0;
        let mut stream_stats = ProcessingStats::default();

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProcessingError::IoError(e)),
            }

            self.line_number += 1;
            let line = trim_line_terminator(&buf);

            if line.len() > self.config.max_line_length {
                let error = ProcessingError::LineTooLong {
                    length: line.len(),
                    max_length: self.config.max_line_length,
                };
                self.handle_error(error, &mut stream_stats)?;
                continue;
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let mut record = match parse_record(line) {
                Ok(record) => record,
                Err(message) => {
                    let error = ProcessingError::ParseError {
                        line: self.line_number,
                        message,
                    };
                    self.handle_error(error, &mut stream_stats)?;
                    continue;
                }
            };

            stream_stats.records_processed += 1;

            self.process_record(&mut record);

            if let Err(e) = write_record(output, &record) {
                // Downstream closed, stop quietly
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    break;
                }
                return Err(ProcessingError::IoError(e));
            }
            stream_stats.records_output += 1;
        }

        stream_stats.processing_time = start_time.elapsed();
        self.stats.accumulate(&stream_stats);

        tracing::debug!(
            processed = stream_stats.records_processed,
            output = stream_stats.records_output,
            errors = stream_stats.errors,
            elapsed = ?stream_stats.processing_time,
            "stream complete"
        );

        Ok(stream_stats)
    }

    fn handle_error(
        &self,
        error: ProcessingError,
        stats: &mut ProcessingStats,
    ) -> Result<(), ProcessingError> {
        match self.config.error_strategy {
            ErrorStrategy::FailFast => Err(error),
            ErrorStrategy::Skip => {
                stats.errors += 1;
                stats.parse_errors.push(ParseErrorInfo {
                    line_number: self.line_number,
                    error: error.to_string(),
                });
                tracing::warn!(
                    line = self.line_number,
                    error = %error,
                    "skipping input line"
                );
                Ok(())
            }
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }
}

fn trim_line_terminator(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_record(line: &[u8]) -> Result<Record, String> {
    let text = std::str::from_utf8(line).map_err(|e| format!("invalid UTF-8: {}", e))?;
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    Record::from_json(&value)
}

fn write_record<W: Write>(output: &mut W, record: &Record) -> std::io::Result<()> {
    serde_json::to_writer(&mut *output, &record.to_json())?;
    writeln!(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RewriteRule;
    use crate::template::{StarlarkTemplate, TemplateRef};
    use std::io::Cursor;

    fn upper_rule(pattern: &str) -> Box<dyn RecordProcessor> {
        let template = StarlarkTemplate::compile("value.upper()").unwrap();
        let mut rule = RewriteRule::new("upper", Arc::new(template));
        rule.add_pattern(pattern);
        Box::new(rule)
    }

    #[test]
    fn test_stream_rewrites_json_lines() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("user.*"));

        let input =
            Cursor::new("{\"user\":{\"name\":\"alice\"},\"msg\":\"hi\"}\n\n{\"msg\":\"x\"}\n");
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.records_output, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "{\"user.name\":\"ALICE\",\"msg\":\"hi\"}\n{\"msg\":\"x\"}\n"
        );
    }

    #[test]
    fn test_processors_run_in_order() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("a"));
        let template: TemplateRef = Arc::new(|_: &Record, value: &str| format!("{}!", value));
        let mut bang = RewriteRule::new("bang", template);
        bang.add_pattern("a");
        pipeline.add_processor(Box::new(bang));
        assert_eq!(pipeline.processor_names(), vec!["upper", "bang"]);

        let mut record: Record = [("a", "x")].into_iter().collect();
        pipeline.process_record(&mut record);
        assert_eq!(record.get("a"), Some("X!"));
    }

    #[test]
    fn test_skip_strategy_counts_bad_lines() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("*"));

        let input = Cursor::new("not json\n[1,2]\n{\"a\":\"b\"}\n");
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.records_processed, 1);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.parse_errors.len(), 2);
        assert_eq!(stats.parse_errors[0].line_number, 1);
        assert_eq!(stats.parse_errors[1].line_number, 2);
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":\"B\"}\n");
    }

    #[test]
    fn test_colliding_keys_are_a_parse_error() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("a.b"));

        let input = Cursor::new("{\"a.b\":\"1\",\"a\":{\"b\":\"2\"}}\n{\"a\":{\"b\":\"3\"}}\n");
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.records_processed, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.parse_errors[0].line_number, 1);
        assert!(stats.parse_errors[0].error.contains("duplicate field 'a.b'"));
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a.b\":\"3\"}\n");
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("*"));

        let input = Cursor::new(b"{\"a\":\"x\"}\n\xff\xfe garbage\n{\"a\":\"y\"}\n".to_vec());
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.parse_errors[0].line_number, 2);
        assert!(stats.parse_errors[0].error.contains("invalid UTF-8"));
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":\"X\"}\n{\"a\":\"Y\"}\n");
    }

    #[test]
    fn test_invalid_utf8_fails_fast_with_line_number() {
        let config = PipelineConfig {
            error_strategy: ErrorStrategy::FailFast,
            ..PipelineConfig::default()
        };
        let mut pipeline = StreamPipeline::new(config);

        let input = Cursor::new(b"{\"a\":\"x\"}\n\xff\n".to_vec());
        let mut output = Vec::new();
        let err = pipeline.process_stream(input, &mut output).unwrap_err();
        assert!(matches!(err, ProcessingError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("*"));

        let input = Cursor::new("{\"a\":\"x\"}\r\n{\"a\":\"y\"}");
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.errors, 0);
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":\"X\"}\n{\"a\":\"Y\"}\n");
    }

    #[test]
    fn test_fail_fast_stops_on_bad_line() {
        let config = PipelineConfig {
            error_strategy: ErrorStrategy::FailFast,
            ..PipelineConfig::default()
        };
        let mut pipeline = StreamPipeline::new(config);

        let input = Cursor::new("{\"a\":\"b\"}\nnot json\n{\"c\":\"d\"}\n");
        let mut output = Vec::new();
        let err = pipeline.process_stream(input, &mut output).unwrap_err();

        assert!(matches!(err, ProcessingError::ParseError { line: 2, .. }));
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":\"b\"}\n");
    }

    #[test]
    fn test_line_too_long() {
        let config = PipelineConfig {
            max_line_length: 10,
            ..PipelineConfig::default()
        };
        let mut pipeline = StreamPipeline::new(config);

        let input = Cursor::new("{\"long\":\"xxxxxxxxxxxx\"}\n{\"a\":\"b\"}\n");
        let mut output = Vec::new();
        let stats = pipeline.process_stream(input, &mut output).unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.records_output, 1);
    }

    #[test]
    fn test_stats_accumulate_across_streams() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        let mut output = Vec::new();
        pipeline
            .process_stream(Cursor::new("{\"a\":\"1\"}\n"), &mut output)
            .unwrap();
        pipeline
            .process_stream(Cursor::new("{\"a\":\"2\"}\n{\"a\":\"3\"}\n"), &mut output)
            .unwrap();
        assert_eq!(pipeline.get_stats().records_processed, 3);
    }

    #[test]
    fn test_process_shared_leaves_original() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("*"));

        let shared = Arc::new(Record::from_iter([("a", "x")]));
        let result = pipeline.process_shared(Arc::clone(&shared));

        assert_eq!(shared.get("a"), Some("x"));
        assert_eq!(result.get("a"), Some("X"));
    }

    #[test]
    fn test_fork_behaves_like_original() {
        let mut pipeline = StreamPipeline::new(PipelineConfig::default());
        pipeline.add_processor(upper_rule("a"));
        let forked = pipeline.fork();

        let mut left: Record = [("a", "x"), ("b", "y")].into_iter().collect();
        let mut right = left.clone();
        pipeline.process_record(&mut left);
        forked.process_record(&mut right);
        assert_eq!(left, right);
        assert_eq!(forked.processor_names(), vec!["upper"]);
    }
}
