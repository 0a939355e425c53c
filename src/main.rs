use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use areacollect::area::{AreaStats, AssemblerConfig, MultipolygonCollector, RoleAssembler};
use areacollect::config::{get_config_path, load_config, save_config, CollectorConfig};
use areacollect::reader::ItemReader;
use areacollect::relations::{Collector, CollectorStats};
use areacollect::types::{Item, ObjectId};

/// Assemble areas from multipolygon relations and closed ways.
#[derive(Parser)]
#[command(name = "areacollect", about = "Assemble areas from multipolygon relations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory or file path (default: current directory)
        path: Option<String>,
    },
    /// Run both passes over a JSON-lines file and write the areas
    Assemble {
        /// Input file with one item per line
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Configuration file (default: ./areacollect.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Keep the relation's type tag on assembled areas
        #[arg(long)]
        keep_type_tag: bool,
        /// Print run statistics as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Validate a configuration file
    Check {
        /// Configuration file
        config: PathBuf,
    },
}

/// Statistics printed after an `assemble` run.
#[derive(Serialize)]
struct RunSummary {
    collector: CollectorStats,
    areas: AreaStats,
    flushes: usize,
    incomplete_relations: Vec<ObjectId>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> areacollect::errors::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let path = resolve_config_path(path);
            save_config(&path, &CollectorConfig::default())?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Assemble {
            input,
            output,
            config,
            keep_type_tag,
            json,
        } => {
            let config_path = config.unwrap_or_else(|| resolve_config_path(None));
            let config = load_config(&config_path)?;
            let summary = assemble(&input, output, &config, keep_type_tag)?;

            if json {
                eprintln!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                eprintln!("Relations kept:       {}", summary.collector.relations_kept);
                eprintln!("Relations completed:  {}", summary.collector.relations_completed);
                eprintln!("Relations incomplete: {}", summary.collector.relations_incomplete);
                eprintln!("Areas from ways:      {}", summary.areas.ways_assembled);
                eprintln!("Areas from relations: {}", summary.areas.relations_assembled);
                eprintln!("Output flushes:       {}", summary.flushes);
            }
        }
        Commands::Check { config } => {
            load_config(&config)?;
            println!("{}: ok", config.display());
        }
    }
    Ok(())
}

fn assemble(
    input: &Path,
    output: Option<PathBuf>,
    config: &CollectorConfig,
    keep_type_tag: bool,
) -> areacollect::errors::Result<RunSummary> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let writer = Rc::new(RefCell::new(BufWriter::new(sink)));

    let assembler_config = AssemblerConfig {
        keep_type_tag,
        debug: false,
    };
    let mut collector: MultipolygonCollector<RoleAssembler> =
        Collector::multipolygon(assembler_config, config)?;

    let callback_writer = Rc::clone(&writer);
    collector.set_callback(move |buffer| {
        let mut out = callback_writer.borrow_mut();
        for area in buffer.areas()? {
            serde_json::to_writer(&mut *out, &Item::Area(area))?;
            out.write_all(b"\n")?;
        }
        Ok(())
    });

    let incomplete = collector.run(ItemReader::open(input)?, ItemReader::open(input)?)?;
    collector.flush()?;
    writer.borrow_mut().flush()?;

    let policy = collector.policy();
    Ok(RunSummary {
        collector: collector.stats().clone(),
        areas: policy.stats().clone(),
        flushes: policy.output().flushes(),
        incomplete_relations: incomplete,
    })
}

/// Resolves an optional path argument to a configuration file path.
///
/// Directories (and the default, the current directory) get the default
/// file name appended.
fn resolve_config_path(path: Option<String>) -> PathBuf {
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    if path.is_dir() {
        get_config_path(&path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areacollect::types::{Location, TagList, Way, WayNode};

    #[test]
    fn assemble_writes_areas_and_a_json_summary() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.jsonl");
        let output = dir.path().join("areas.jsonl");

        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        let way = Item::Way(Way {
            id: 5,
            tags: TagList::from_pairs([("building", "yes")]),
            nodes: corners
                .iter()
                .enumerate()
                .map(|(i, &(lon, lat))| {
                    WayNode::new(1 + (i % 4) as ObjectId, Location::new(lon, lat))
                })
                .collect(),
        });
        std::fs::write(&input, format!("{}\n", serde_json::to_string(&way).unwrap())).unwrap();

        let summary =
            assemble(&input, Some(output.clone()), &CollectorConfig::default(), false).unwrap();

        assert_eq!(summary.areas.ways_assembled, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 1);
        let json = serde_json::to_string_pretty(&summary).unwrap();
        assert!(json.contains("\"ways_assembled\": 1"));
    }
}
