#![cfg_attr(test, allow(clippy::expect_used))]
// Forbid unwrap() in production code to prevent panics from malformed input.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::io;
use std::path::PathBuf;

use bplus::shell::{DisplayOptions, Feedback};
use bplus::{BPlusTree, KeySelector, RecordSource, Shell, ShellOptions, TreeConfig, load_index};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "bplus=info";
const TRACE_FILTER: &str = "bplus=trace";

/// Interactive B+tree index over a line-oriented record file.
#[derive(Debug, Parser)]
#[command(name = "bplus", version)]
struct Args {
    /// Most keys a node may hold
    #[arg(short = 'k', long, env = "BPLUS_MAX_KEYS", default_value_t = TreeConfig::DEFAULT_MAX_KEYS)]
    max_keys: usize,

    /// Fraction of the fan-out every non-root node keeps
    #[arg(long, env = "BPLUS_FILL_RATE", default_value_t = TreeConfig::DEFAULT_FILL_RATE)]
    fill_rate: f64,

    /// Keys are signed integers
    #[arg(short, long)]
    numeric: bool,

    /// Field separator of the record file
    #[arg(short, long, default_value_t = TreeConfig::DEFAULT_FIELD_SEPARATOR)]
    separator: char,

    /// Fields forming the key, e.g. "2,1" (default: first field)
    #[arg(short, long)]
    fields: Option<String>,

    /// Show empty slots and links in tree displays
    #[arg(short = 'x', long)]
    extended: bool,

    /// No prompt and no display after changes
    #[arg(short, long)]
    quiet: bool,

    /// Echo changes before applying them
    #[arg(short, long)]
    echo: bool,

    /// Record file to index
    file: Option<PathBuf>,
}

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn init_tracing() -> ReloadHandle {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
    handle
}

fn main() {
    let args = Args::parse();
    let handle = init_tracing();

    if let Err(e) = run(args, handle) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args, handle: ReloadHandle) -> Result<(), Box<dyn std::error::Error>> {
    let config = TreeConfig::default()
        .with_max_keys(args.max_keys)
        .with_fill_rate(args.fill_rate)
        .with_numeric(args.numeric)
        .with_field_separator(args.separator);

    // Rejects several fields in numeric mode before anything is read.
    let selector = match args.fields.as_deref() {
        Some(list) => KeySelector::parse(list, &config)?,
        None => KeySelector::FirstField,
    };
    let mut tree = BPlusTree::new(config)?;
    tracing::debug!(max_keys = args.max_keys, fill_rate = args.fill_rate, "tree created");

    let source = match &args.file {
        Some(path) => {
            let mut source = RecordSource::open(path)?;
            let rows = load_index(&mut tree, &mut source, &selector)?;
            println!("Indexed rows: {rows}");
            Some(source)
        }
        None => None,
    };

    let options = ShellOptions {
        feedback: if args.quiet {
            Feedback::Nothing
        } else {
            Feedback::Tree
        },
        display: DisplayOptions {
            show_ids: true,
            extended: args.extended,
        },
        echo: args.echo,
        prompt: !args.quiet,
    };

    let trace_hook = Box::new(move |on: bool| {
        let directive = if on { TRACE_FILTER } else { DEFAULT_FILTER };
        if let Err(e) = handle.reload(EnvFilter::new(directive)) {
            tracing::warn!("failed to switch log filter: {e}");
        }
    });

    let mut shell =
        Shell::new(tree, source, io::stdout().lock(), options).with_trace_hook(trace_hook);
    shell.run(io::stdin().lock())?;
    Ok(())
}
