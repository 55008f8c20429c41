mod replay;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use clap::{Args, Parser, Subcommand};
use movable::area::AreaController;
use movable::config::{AreaOptions, ItemOptions};
use tracing_subscriber::EnvFilter;

use crate::replay::{CliError, Replay};

#[derive(Parser, Debug)]
#[command(name = "movable-cli", about = "Replay pointer traces through the movable-area engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON-lines trace through an area and print emitted events.
    Replay(ReplayArgs),
    /// Validate area and item configs and print them with defaults filled in.
    Check(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long, env = "MOVABLE_AREA", help = "Area options JSON file")]
    area: String,

    #[arg(long = "item", help = "Item options JSON file; repeat for several items")]
    items: Vec<String>,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, default_value = "-", help = "Trace file path, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = false, help = "Only print the final summary")]
    quiet: bool,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => run_replay(&args),
        Command::Check(args) => run_check(&args),
    }
}

fn run_replay(args: &ReplayArgs) -> Result<(), CliError> {
    let (area_options, item_options) = load_config(&args.config)?;
    let mut area = AreaController::new(area_options);
    for options in item_options {
        area.add_item(options);
    }

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input).map_err(|source| CliError::Read { path: args.input.clone(), source })?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let summary = Replay::new(&mut area, BufWriter::new(stdout.lock()), args.quiet).run(reader)?;
    let rendered = serde_json::to_string(&serde_json::json!({ "summary": summary }))?;
    let mut out = stdout.lock();
    writeln!(out, "{rendered}")?;
    Ok(())
}

fn run_check(args: &ConfigArgs) -> Result<(), CliError> {
    let (area, items) = load_config(args)?;
    let rendered = serde_json::to_string_pretty(&serde_json::json!({ "area": area, "items": items }))?;
    println!("{rendered}");
    Ok(())
}

/// Read and validate the area file and every item file. No item files means
/// one item with default options.
fn load_config(args: &ConfigArgs) -> Result<(AreaOptions, Vec<ItemOptions>), CliError> {
    let area = AreaOptions::from_json(&read(&args.area)?)
        .map_err(|source| CliError::Config { path: args.area.clone(), source })?;
    if args.items.is_empty() {
        return Ok((area, vec![ItemOptions::default()]));
    }
    let items = args
        .items
        .iter()
        .map(|path| {
            ItemOptions::from_json(&read(path)?).map_err(|source| CliError::Config { path: path.clone(), source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((area, items))
}

fn read(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_owned(), source })
}
