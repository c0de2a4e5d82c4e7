//! Command-line query access to the aptamer collection.

use aptanexus::{
    about, groups,
    loader::{self, LoadStats},
    record::AptamerRecord,
    search::{
        DEFAULT_SEARCH_LIMIT, DEFAULT_TOP_N, get_by_doi, get_by_external_id, list_targets,
        search_by_target, top_by_pkd,
    },
};
use std::env;

fn usage() {
    eprintln!(
        "Usage:\n  \
  aptanexus_cli --version\n  \
  aptanexus_cli [OPTIONS] search QUERY [--limit N] [--offset N]\n  \
  aptanexus_cli [OPTIONS] top QUERY [--top N]\n  \
  aptanexus_cli [OPTIONS] bydoi DOI\n  \
  aptanexus_cli [OPTIONS] byid ID\n  \
  aptanexus_cli [OPTIONS] targets [QUERY]\n  \
  aptanexus_cli [OPTIONS] groups [QUERY]\n\n  \
  Options:\n  \
    --data PATH        read the JSONL dataset from PATH\n  \
    --url URL          fetch the JSONL dataset from URL\n  \
    --allow-fallback   serve the built-in snapshot when loading fails\n  \
    --stats            print load statistics to stderr\n\n  \
  Results are printed as pretty JSON on stdout."
    );
}

struct CliOptions {
    data_path: Option<String>,
    data_url: Option<String>,
    allow_fallback: bool,
    stats: bool,
    rest: Vec<String>,
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        data_path: None,
        data_url: None,
        allow_fallback: false,
        stats: false,
        rest: Vec::new(),
    };
    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--data" => {
                if idx + 1 >= args.len() {
                    return Err("Missing PATH after --data".to_string());
                }
                options.data_path = Some(args[idx + 1].clone());
                idx += 2;
            }
            "--url" => {
                if idx + 1 >= args.len() {
                    return Err("Missing URL after --url".to_string());
                }
                options.data_url = Some(args[idx + 1].clone());
                idx += 2;
            }
            "--allow-fallback" => {
                options.allow_fallback = true;
                idx += 1;
            }
            "--stats" => {
                options.stats = true;
                idx += 1;
            }
            other => {
                options.rest.push(other.to_string());
                idx += 1;
            }
        }
    }
    Ok(options)
}

fn numeric_flag(rest: &[String], flag: &str, default: usize) -> Result<usize, String> {
    let mut idx = 0usize;
    while idx < rest.len() {
        if rest[idx] == flag {
            let Some(value) = rest.get(idx + 1) else {
                return Err(format!("Missing value after {flag}"));
            };
            return value
                .parse::<usize>()
                .map_err(|e| format!("Invalid value '{value}' for {flag}: {e}"));
        }
        idx += 1;
    }
    Ok(default)
}

fn load_collection(options: &CliOptions) -> Result<Vec<AptamerRecord>, String> {
    let source = loader::resolve_source(options.data_path.as_deref(), options.data_url.as_deref());
    let (records, stats) = match loader::load(&source) {
        Ok(loaded) => loaded,
        Err(e) if options.allow_fallback => {
            eprintln!("Could not load aptamer dataset from {source}, using built-in snapshot: {e:#}");
            loader::builtin_snapshot()
        }
        Err(e) => return Err(format!("Could not load aptamer dataset from {source}: {e:#}")),
    };
    if options.stats {
        print_stats(&stats);
    }
    Ok(records)
}

fn print_stats(stats: &LoadStats) {
    eprintln!(
        "lines: {}, loaded: {}, parse failures: {}, validation failures: {}",
        stats.lines, stats.loaded, stats.parse_failures, stats.validation_failures
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize result: {e}"))?;
    println!("{text}");
    Ok(())
}

fn run() -> Result<(), String> {
    let args = env::args().collect::<Vec<_>>();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(());
    }
    let options = parse_options(&args)?;
    let Some(command) = options.rest.first().cloned() else {
        usage();
        return Err("Missing command".to_string());
    };
    let rest = &options.rest[1..];
    let records = load_collection(&options)?;

    match command.as_str() {
        "search" => {
            let Some(query) = rest.first() else {
                return Err("search requires a QUERY argument".to_string());
            };
            let limit = numeric_flag(rest, "--limit", DEFAULT_SEARCH_LIMIT)?;
            let offset = numeric_flag(rest, "--offset", 0)?;
            print_json(&search_by_target(&records, query, limit, offset))
        }
        "top" => {
            let Some(query) = rest.first() else {
                return Err("top requires a QUERY argument".to_string());
            };
            let top = numeric_flag(rest, "--top", DEFAULT_TOP_N)?;
            print_json(&top_by_pkd(&records, query, top))
        }
        "bydoi" => {
            let Some(doi) = rest.first() else {
                return Err("bydoi requires a DOI argument".to_string());
            };
            print_json(&get_by_doi(&records, doi))
        }
        "byid" => {
            let Some(id) = rest.first() else {
                return Err("byid requires an ID argument".to_string());
            };
            print_json(&get_by_external_id(&records, id))
        }
        "targets" => {
            let query = rest.first().map(String::as_str);
            print_json(&list_targets(&records, query))
        }
        "groups" => {
            let query = rest.first().map(String::as_str).unwrap_or("");
            print_json(&groups::group_by_target(&records, query))
        }
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
