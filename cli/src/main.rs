use std::fs;
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;

use moodle2ultra_backend::convert::{convert, load_quiz};
use moodle2ultra_backend::logger;
use moodle2ultra_backend::DEFAULT_OUTPUT_DIR;

#[derive(Parser, Debug)]
#[command(author, version, about = "Moodle to Blackboard Ultra quiz converter", long_about = None)]
struct Cli {
    /// Moodle XML quiz export to convert
    #[arg(value_name = "FILENAME")]
    filename: PathBuf,

    /// Directory the upload files are written to
    #[arg(
        long,
        value_name = "DIRECTORY_PATH",
        env = "MOODLE2ULTRA_OUTPUT_DIR",
        default_value = DEFAULT_OUTPUT_DIR
    )]
    output_dir: PathBuf,
}

fn run(cli: &Cli) -> Result<()> {
    let text = fs::read_to_string(&cli.filename)
        .with_context(|| format!("failed to read {:?}", cli.filename))?;

    let records = load_quiz(&text)?;
    let exports = convert(&records);

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create output directory {:?}", cli.output_dir))?;

    for export in &exports {
        println!("\nCategory {}:", export.category);
        for (type_key, count) in &export.counts {
            println!("\t{} questions of type {}", count, type_key);
        }
        for file in &export.files {
            let path = cli.output_dir.join(&file.filename);
            fs::write(&path, &file.content)
                .with_context(|| format!("failed to write {:?}", path))?;
        }
    }

    Ok(())
}

fn main() {
    // A .env file can set MOODLE2ULTRA_OUTPUT_DIR and RUST_LOG; clap picks
    // the former up via `env = "MOODLE2ULTRA_OUTPUT_DIR"`.
    if dotenv().is_err() {
        println!("Info: No .env file found or failed to load.");
    }

    logger::init_tracing();

    let cli = Cli::parse();

    println!("Moodle to Blackboard Ultra quiz converter");
    println!("=========================================");

    if let Err(e) = run(&cli) {
        eprintln!("Error executing command: {}", e);
        exit(1);
    }
}
