use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use std::io::{self, BufReader, Write};
use tracing_subscriber::EnvFilter;

use groupset::{ErrorStrategy, PipelineConfig, RuleConfig, StreamPipeline};

#[derive(Parser)]
#[command(name = "groupset")]
#[command(about = "Rewrite groups of JSON log fields selected by glob pattern")]
#[command(version)]
struct Args {
    /// Glob pattern selecting fields to rewrite
    #[arg(short = 'f', long = "field", value_name = "PATTERN", action = ArgAction::Append)]
    fields: Vec<String>,

    /// Glob pattern removing fields from the selection
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN", action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Starlark expression producing the new value (`value` is the old one, `data` the record)
    #[arg(short = 't', long = "template", value_name = "EXPR")]
    template: Option<String>,

    /// Starlark expression over `data`; the rule only runs when it is true
    #[arg(short = 'c', long = "condition", value_name = "EXPR")]
    condition: Option<String>,

    /// Additional rule as a JSON object (applied after the flag-defined rule)
    #[arg(short = 'r', long = "rule", value_name = "JSON", action = ArgAction::Append)]
    rules: Vec<String>,

    /// Debug mode - log processing details to stderr
    #[arg(long)]
    debug: bool,

    /// Fail on first bad input line instead of skipping it
    #[arg(long)]
    fail_fast: bool,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,
}

impl Args {
    fn rule_configs(&self) -> anyhow::Result<Vec<RuleConfig>> {
        let mut configs = Vec::new();

        match (&self.template, self.fields.is_empty()) {
            (Some(template), false) => configs.push(RuleConfig {
                name: Some("rewrite".to_string()),
                fields: self.fields.clone(),
                exclude: self.exclude.clone(),
                template: template.clone(),
                condition: self.condition.clone(),
            }),
            (Some(_), true) => bail!("--template requires at least one --field pattern"),
            (None, false) => bail!("--field requires a --template"),
            (None, true) => {
                if !self.exclude.is_empty() || self.condition.is_some() {
                    bail!("--exclude and --condition require --field and --template");
                }
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let mut config: RuleConfig = serde_json::from_str(rule)
                .with_context(|| format!("Invalid --rule #{}", i + 1))?;
            if config.name.is_none() {
                config.name = Some(format!("rule_{}", i + 1));
            }
            configs.push(config);
        }

        if configs.is_empty() {
            bail!("Must provide --field/--template or at least one --rule");
        }
        Ok(configs)
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = PipelineConfig {
        error_strategy: if args.fail_fast {
            ErrorStrategy::FailFast
        } else {
            ErrorStrategy::Skip
        },
        buffer_size: args.buffer_size,
        max_line_length: args.max_line_length,
    };

    let mut pipeline = StreamPipeline::new(config);
    for rule_config in args.rule_configs()? {
        let name = rule_config.rule_name();
        let rule = rule_config
            .build()
            .with_context(|| format!("Failed to compile rule '{}'", name))?;
        pipeline.add_processor(Box::new(rule));
    }

    let buffer_size = pipeline.config().buffer_size;
    let input = BufReader::with_capacity(buffer_size, io::stdin());
    let mut output = io::BufWriter::with_capacity(buffer_size, io::stdout());

    let stats = pipeline
        .process_stream(input, &mut output)
        .context("Processing failed")?;

    output.flush()?;

    if args.debug {
        eprintln!("Final statistics:");
        eprintln!("  Records processed: {}", stats.records_processed);
        eprintln!("  Records output: {}", stats.records_output);
        eprintln!("  Errors: {}", stats.errors);
        eprintln!("  Processing time: {:?}", stats.processing_time);
    }

    Ok(())
}
