mod debug_report;

use std::ffi::OsString;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use trellis::contrib::{reduce_whitespaces, remove_empty_nodes};
use trellis::{Element, Overrides, Transformation};

const TRANSFORMATIONS: &[&str] = &["remove-empty-nodes", "reduce-whitespaces"];

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let level = match config.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(&config) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct CliConfig {
    transformation: String,
    input: PathBuf,
    inplace: bool,
    stats: bool,
    verbose: u8,
    color: bool,
}

fn run(config: &CliConfig) -> Result<(), String> {
    let transformation = lookup(&config.transformation).map_err(|err| format!("error: {err}"))?;
    let source = fs::read_to_string(&config.input)
        .map_err(|err| format!("error: failed to read '{}': {err}", config.input.display()))?;
    let root = Element::parse(&source).map_err(|err| format!("error: {}: {err}", config.input.display()))?;

    let run = transformation
        .invoke_with_metrics(&root, Overrides::new().copy(false))
        .map_err(|err| format!("error: {} failed: {err}", config.transformation))?;
    let output = match run.result.as_node() {
        Some(node) => node.to_xml(),
        None => return Err(format!("error: {} produced no document", config.transformation)),
    };

    if config.inplace {
        let mut backup = OsString::from(config.input.as_os_str());
        backup.push(".orig");
        fs::copy(&config.input, &backup)
            .map_err(|err| format!("error: failed to back up '{}': {err}", config.input.display()))?;
        fs::write(&config.input, output)
            .map_err(|err| format!("error: failed to write '{}': {err}", config.input.display()))?;
    } else {
        println!("{output}");
    }

    if config.stats {
        debug_report::print_run(&config.input.display().to_string(), &run.metrics, config.color);
    }
    Ok(())
}

fn lookup(name: &str) -> trellis::Result<Transformation> {
    match name {
        "remove-empty-nodes" => remove_empty_nodes(),
        "reduce-whitespaces" => reduce_whitespaces(),
        _ => Err(trellis::Error::InvalidStep(format!("unknown transformation `{name}`"))),
    }
}

fn parse_args() -> Result<CliConfig, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut inplace = false;
    let mut stats = false;
    let mut verbose = 0u8;
    let mut color = io::stderr().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("trellis {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-i" | "--inplace" => inplace = true,
            "-s" | "--stats" => stats = true,
            "-v" | "--verbose" => verbose = verbose.saturating_add(1),
            "-vv" => verbose = verbose.saturating_add(2),
            "--color" => color = true,
            "--no-color" => color = false,
            "--" => {
                positional.extend(args.by_ref());
                break;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let (Some(transformation), Some(input)) = (positional.next(), positional.next()) else {
        return Err(format!("error: expected a transformation and an input file\n\n{}", help_text()));
    };
    if let Some(extra) = positional.next() {
        return Err(format!("error: unexpected argument '{extra}'"));
    }
    if !TRANSFORMATIONS.contains(&transformation.as_str()) {
        return Err(format!(
            "error: unknown transformation '{transformation}' (available: {})",
            TRANSFORMATIONS.join(", ")
        ));
    }

    Ok(CliConfig { transformation, input: PathBuf::from(input), inplace, stats, verbose, color })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "trellis {version}

Applies a bundled transformation to an XML document.

Usage:
  trellis [OPTIONS] <TRANSFORMATION> <INPUT>

Transformations:
  {transformations}

Options:
  -i, --inplace              Write the result back to INPUT, keeping INPUT.orig.
  -s, --stats                Print per-step timings and node counts to stderr.
  -v, --verbose              Log more (repeat for debug output). RUST_LOG wins.
  --color                    Force ANSI color in the stats report.
  --no-color                 Disable ANSI color in the stats report.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  The transformation or file access failed.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
        transformations = TRANSFORMATIONS.join("\n  "),
    )
}
