//! MCP stdio server binary for AptaNexus.

use aptanexus::{
    about,
    loader::{self, DATASET_PATH_ENV, DATASET_URL_ENV, DEFAULT_DATASET_PATH},
    mcp_server::run_stdio_server,
    record::AptamerRecord,
};
use std::env;

fn usage() {
    println!(
        "Usage:\n  \
aptanexus_mcp [--data PATH|--url URL] [--allow-fallback] [--help|-h] [--version|-V]\n\n  \
Starts a MCP stdio server with tools:\n  \
  - search_by_target\n  \
  - top_by_pkd\n  \
  - get_by_doi\n  \
  - list_targets\n  \
  - get_by_external_id\n\n  \
Dataset resolution: --data/--url, then ${DATASET_URL_ENV}, then ${DATASET_PATH_ENV},\n  \
then {default_path}. With --allow-fallback a failed load substitutes the\n  \
built-in snapshot instead of aborting.\n",
        default_path = DEFAULT_DATASET_PATH
    );
}

struct McpArgs {
    data_path: Option<String>,
    data_url: Option<String>,
    allow_fallback: bool,
}

fn parse_args(args: &[String]) -> Result<McpArgs, String> {
    let mut parsed = McpArgs {
        data_path: None,
        data_url: None,
        allow_fallback: false,
    };
    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--data" => {
                if idx + 1 >= args.len() {
                    return Err(format!("Missing PATH after {}", args[idx]));
                }
                parsed.data_path = Some(args[idx + 1].clone());
                idx += 2;
            }
            "--url" => {
                if idx + 1 >= args.len() {
                    return Err(format!("Missing URL after {}", args[idx]));
                }
                parsed.data_url = Some(args[idx + 1].clone());
                idx += 2;
            }
            "--allow-fallback" => {
                parsed.allow_fallback = true;
                idx += 1;
            }
            "--help" | "-h" | "--version" | "-V" => {
                idx += 1;
            }
            other => {
                return Err(format!("Unknown argument '{other}'. Use --help for usage."));
            }
        }
    }
    Ok(parsed)
}

fn load_collection(parsed: &McpArgs) -> Result<Vec<AptamerRecord>, String> {
    let source = loader::resolve_source(parsed.data_path.as_deref(), parsed.data_url.as_deref());
    match loader::load(&source) {
        Ok((records, stats)) => {
            eprintln!(
                "Loaded {} aptamer records from {source} ({} parse failures, {} validation failures)",
                stats.loaded, stats.parse_failures, stats.validation_failures
            );
            Ok(records)
        }
        Err(e) if parsed.allow_fallback => {
            let (records, _) = loader::builtin_snapshot();
            eprintln!(
                "Could not load aptamer dataset from {source}, serving built-in snapshot \
({} records): {e:#}",
                records.len()
            );
            Ok(records)
        }
        Err(e) => Err(format!("Could not load aptamer dataset from {source}: {e:#}")),
    }
}

fn run() -> Result<(), String> {
    let args = env::args().collect::<Vec<_>>();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    let parsed = parse_args(&args)?;
    let records = load_collection(&parsed)?;
    run_stdio_server(&records)
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
