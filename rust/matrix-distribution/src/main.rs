/// Matrix distribution comparison - CLI
///
/// Usage:
///   matrix-distribution --file=<path> [--mode=report] [--sentinel=-1|none] [--sequential] [--strict] [--json=<path>]
///   matrix-distribution <path> ...
///
/// Modes:
///   report      - equivalence groups and the full similarity matrix (default)
///   groups      - equivalence groups only
///   similarity  - similarity matrix only
///   dump        - sorted (value, count) pairs and normalized frequencies per matrix

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use matrix_distribution::analysis::{
    run, write_distributions, write_groups, write_header, write_report, write_similarity, Analysis,
    AnalysisConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let CliArgs { opts, positional } = parse_args(&args);

    let Some(path) = opts.get("file").or_else(|| positional.first()).cloned() else {
        eprintln!("Missing corpus file. Use --file=<path>");
        std::process::exit(1);
    };

    let sentinel = match parse_sentinel(&opts) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };
    let config = AnalysisConfig {
        sentinel,
        parallel: !opts.contains_key("sequential"),
        strict_count: opts.contains_key("strict"),
    };

    let mode = opts.get("mode").map(|s| s.as_str()).unwrap_or("report");
    if !matches!(mode, "report" | "groups" | "similarity" | "dump") {
        eprintln!("Unknown mode: {mode}. Use --mode=report|groups|similarity|dump");
        std::process::exit(1);
    }

    let analysis = match run(&path, &config) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = print_mode(mode, &analysis, &config) {
        eprintln!("Error: could not write output: {e}");
        std::process::exit(1);
    }

    if let Some(json_path) = opts.get("json") {
        match write_json(&analysis.report(&config), json_path) {
            Ok(()) => println!("\nResults written to {json_path}"),
            Err(e) => {
                eprintln!("Error: could not write {json_path}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_mode(mode: &str, analysis: &Analysis, config: &AnalysisConfig) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        "groups" => {
            write_header(&mut out, analysis, config)?;
            write_groups(&mut out, &analysis.grouping)?;
        }
        "similarity" => {
            write_header(&mut out, analysis, config)?;
            write_similarity(&mut out, &analysis.similarity)?;
        }
        "dump" => {
            write_header(&mut out, analysis, config)?;
            write_distributions(&mut out, &analysis.distributions)?;
        }
        _ => write_report(&mut out, analysis, config)?,
    }
    out.flush()
}

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

/// `--key=value` options (bare `--flag` maps to "true") and positional arguments.
struct CliArgs {
    opts: HashMap<String, String>,
    positional: Vec<String>,
}

fn parse_args(args: &[String]) -> CliArgs {
    let mut opts = HashMap::new();
    let mut positional = Vec::new();
    for arg in args {
        match arg.strip_prefix("--") {
            Some(kv) => {
                let (k, v) = kv.split_once('=').unwrap_or((kv, "true"));
                opts.insert(k.to_string(), v.to_string());
            }
            None => positional.push(arg.clone()),
        }
    }
    CliArgs { opts, positional }
}

fn parse_sentinel(opts: &HashMap<String, String>) -> Result<Option<f64>, String> {
    match opts.get("sentinel").map(|s| s.as_str()) {
        None => Ok(AnalysisConfig::default().sentinel),
        Some("none") => Ok(None),
        Some(v) => match v.parse::<f64>() {
            Ok(s) if s.is_finite() => Ok(Some(s)),
            _ => Err(format!("Invalid sentinel: {v}. Use a finite number or 'none'")),
        },
    }
}

/// Write `value` as pretty JSON, creating missing parent directories.
fn write_json<T: serde::Serialize>(value: &T, path: &str) -> io::Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_parse_args_splits_options_and_positionals() {
        let cli = parse_args(&strings(&["corpus.txt", "--mode=dump", "--strict", "--sentinel=none"]));
        assert_eq!(cli.positional, vec!["corpus.txt".to_string()]);
        assert_eq!(cli.opts.get("mode").map(String::as_str), Some("dump"));
        assert_eq!(cli.opts.get("strict").map(String::as_str), Some("true"));
        assert_eq!(parse_sentinel(&cli.opts), Ok(None));
    }

    #[test]
    fn test_parse_sentinel_values() {
        let cli = parse_args(&strings(&["--sentinel=0"]));
        assert_eq!(parse_sentinel(&cli.opts), Ok(Some(0.0)));
        let cli = parse_args(&strings(&["--sentinel=nan"]));
        assert!(parse_sentinel(&cli.opts).is_err());
        assert_eq!(parse_sentinel(&HashMap::new()), Ok(Some(-1.0)));
    }

    #[test]
    fn test_write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        write_json(&vec![1, 2, 3], path.to_str().unwrap()).unwrap();
        let written: Vec<u32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[test]
    fn test_write_json_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("report.json");
        assert!(write_json(&1, path.to_str().unwrap()).is_err());
    }
}
