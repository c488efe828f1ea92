use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use contextslice::cli::{Cli, Command};
use contextslice::{ContextSliceBuilder, SliceOptions, intent_keywords};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    info!("contextslice starting");

    match cli.command {
        Command::Slice {
            intent,
            max_files,
            max_lines,
            exclude,
        } => {
            let defaults = SliceOptions::default();
            let options = SliceOptions {
                max_files: max_files.unwrap_or(defaults.max_files),
                max_lines_per_file: max_lines.unwrap_or(defaults.max_lines_per_file),
                exclude,
                ..defaults
            };
            let slice = ContextSliceBuilder::new(&cli.root).with_options(options).build(&intent)?;
            if slice.is_empty() {
                println!("No relevant files for: {}", intent.cyan());
            } else {
                for hit in &slice.files {
                    println!("{} {}", hit.path.yellow(), format!("(score {})", hit.score).dimmed());
                    for (line_num, line) in &hit.lines {
                        println!("  {} {}", line_num.to_string().dimmed(), line);
                    }
                }
            }
        }
        Command::Keywords { intent } => {
            let keywords = intent_keywords(&intent);
            if keywords.is_empty() {
                println!("No keywords");
            } else {
                println!("{}", keywords.join(" ").green());
            }
        }
    }

    Ok(())
}
