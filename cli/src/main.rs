use std::fs;
use std::io;
use std::process::ExitCode;

use blockforge_core::graph::GraphDocument;
use blockforge_core::{BackendId, CompileError, CompileOptions, compile_document};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

mod output;

use output::{DiagnosticFormat, Reporter};

/// Malformed input: unreadable or structurally invalid graph, bad options.
const EXIT_MALFORMED: u8 = 2;
/// `--strict` and the compilation produced diagnostics, or output failed.
const EXIT_DIAGNOSTICS: u8 = 1;

fn main() -> ExitCode {
    let cli = Command::new("blockforge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile visual block programs to Arduino or MicroPython source");

    let cli = setup_cli(cli);
    let matches = cli.get_matches();

    init_logging(matches.get_count("verbose"));
    dispatch_commands(&matches)
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.arg(
        Arg::new("verbose")
            .help("Increase log output (-v info, -vv debug, -vvv trace)")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .global(true),
    )
    .subcommand(
        Command::new("build")
            .about("Compile a block graph document")
            .arg(
                Arg::new("file")
                    .help("The graph document (JSON) to compile")
                    .required(true)
                    .index(1),
            )
            .arg(
                Arg::new("target")
                    .help("Target language backend: arduino (alias cpp) or micropython (alias python)")
                    .short('t')
                    .long("target")
                    .value_parser(clap::value_parser!(BackendId))
                    .default_value("arduino")
                    .value_name("TARGET"),
            )
            .arg(
                Arg::new("output")
                    .help("Write the generated source to this file instead of stdout")
                    .short('o')
                    .long("output")
                    .value_parser(clap::value_parser!(String))
                    .value_name("FILE"),
            )
            .arg(
                Arg::new("format")
                    .help("How diagnostics are printed on stderr")
                    .short('f')
                    .long("format")
                    .value_parser(["text", "json", "table"])
                    .default_value("text")
                    .value_name("FORMAT"),
            )
            .arg(
                Arg::new("config")
                    .help("Compile options file (JSON)")
                    .short('c')
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .value_name("FILE"),
            )
            .arg(
                Arg::new("no-banner")
                    .help("Omit the generated-by banner comment")
                    .long("no-banner")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("no-placeholders")
                    .help("Omit placeholder comments for skipped top-level blocks")
                    .long("no-placeholders")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("strict")
                    .help("Exit with status 1 when any diagnostic is reported")
                    .long("strict")
                    .action(ArgAction::SetTrue),
            ),
    )
    .subcommand(Command::new("targets").about("List the available target backends"))
}

/// Log records from the compiler go to stderr. `BLOCKFORGE_LOG` takes a
/// tracing filter directive and wins over `-v`.
fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("BLOCKFORGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to install logger: {}", e);
    }
}

/// Dispatches the command based on the parsed arguments.
fn dispatch_commands(matches: &ArgMatches) -> ExitCode {
    match matches.subcommand() {
        Some(("build", sub_m)) => build(sub_m),
        Some(("targets", _)) => targets(),
        _ => {
            eprintln!("No valid subcommand was used. Use --help for more information.");
            ExitCode::from(EXIT_MALFORMED)
        }
    }
}

fn build(sub_m: &ArgMatches) -> ExitCode {
    let mut reporter = Reporter::new(io::stderr());

    let Some(file) = sub_m.get_one::<String>("file") else {
        return ExitCode::from(EXIT_MALFORMED);
    };
    let target = sub_m
        .get_one::<BackendId>("target")
        .copied()
        .unwrap_or(BackendId::Arduino);
    let format = sub_m
        .get_one::<String>("format")
        .and_then(|f| f.parse().ok())
        .unwrap_or(DiagnosticFormat::Text);

    let mut options = match sub_m.get_one::<String>("config") {
        Some(path) => match CompileOptions::load_from_file(path) {
            Ok(options) => options,
            Err(e) => {
                let _ = reporter.fatal(&e);
                return ExitCode::from(EXIT_MALFORMED);
            }
        },
        None => CompileOptions::default(),
    };
    if sub_m.get_flag("no-banner") {
        options.banner = false;
    }
    if sub_m.get_flag("no-placeholders") {
        options.placeholders = false;
    }

    let result = match GraphDocument::load_from_file(file)
        .map_err(CompileError::from)
        .and_then(|doc| compile_document(doc, target.as_str(), &options))
    {
        Ok(result) => result,
        Err(e) => {
            log::error!("{} not compiled", file);
            let _ = reporter.fatal(&e);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };

    match sub_m.get_one::<String>("output") {
        Some(path) => {
            if let Err(e) = fs::write(path, &result.source) {
                eprintln!("Failed to write output file {}: {}", path, e);
                return ExitCode::from(EXIT_DIAGNOSTICS);
            }
            log::info!("wrote {} bytes to {}", result.source.len(), path);
        }
        None => print!("{}", result.source),
    }

    if let Err(e) = reporter.diagnostics(&result, format) {
        eprintln!("Failed to print diagnostics: {}", e);
    }

    if sub_m.get_flag("strict") && !result.is_clean() {
        return ExitCode::from(EXIT_DIAGNOSTICS);
    }
    ExitCode::SUCCESS
}

fn targets() -> ExitCode {
    let mut reporter = Reporter::new(io::stdout());
    if reporter.title("Targets").is_err() {
        return ExitCode::from(EXIT_DIAGNOSTICS);
    }
    println!("{}", output::targets_table());
    ExitCode::SUCCESS
}
