//! Netpulse - internet adoption dataset analysis & chart generation
//!
//! Loads the adoption CSV, runs every analysis, and writes the chart images
//! and JSON summary to the output directory.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use netpulse::config::Settings;
use netpulse::data::DatasetLoader;
use netpulse::report;

const USAGE: &str = "Usage: netpulse <data.csv> [out_dir] [--config settings.json]";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    let settings = parse_args(args)?;

    fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("creating {}", settings.output_dir.display()))?;

    println!("Loading {}", settings.data_path.display());
    let df = DatasetLoader::load(&settings.data_path)
        .with_context(|| format!("loading {}", settings.data_path.display()))?;
    println!("Loaded {} rows, {} columns", df.height(), df.width());

    let outcomes = report::run_all(&df, &settings);

    let mut failures = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(files) => {
                for file in files {
                    println!("[{}] wrote {}", outcome.name, file.display());
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("[{}] failed: {e:#}", outcome.name);
            }
        }
    }

    match report::write_summary(&df, &settings) {
        Ok(path) => println!("[summary] wrote {}", path.display()),
        Err(e) => {
            failures += 1;
            eprintln!("[summary] failed: {e:#}");
        }
    }

    if failures == outcomes.len() + 1 {
        bail!("every analysis failed");
    }
    println!("Done ({failures} failed)");
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Settings> {
    let mut settings = Settings::default();
    let mut positional: Vec<String> = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let Some(path) = iter.next() else {
                bail!("--config needs a file path\n{USAGE}");
            };
            settings = Settings::from_json_file(&PathBuf::from(path))?;
        } else {
            positional.push(arg);
        }
    }

    if let Some(data) = positional.first() {
        settings.data_path = PathBuf::from(data);
    }
    if let Some(out) = positional.get(1) {
        settings.output_dir = PathBuf::from(out);
    }
    Ok(settings)
}
