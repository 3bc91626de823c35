use anyhow::{Context, Result};
use clap::Parser;
use qa_search::batch::{self, BatchMode};
use qa_search::cli::{CliArgs, Command};
use qa_search::extractor::{self, extract_with};
use qa_search::history::write_batch_csv;
use qa_search::{IngestReport, RetrievalService, SearchResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let settings = args.resolve_settings().await?;

    match args.command {
        Command::Extract { file } => {
            let records = extract_with(&file, &settings.extract_options())?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Ingest { paths } => {
            let files = expand_inputs(&paths)?;
            let mut service = RetrievalService::open(&settings).await?;
            let report = service.ingest_files(&files).await?;
            print_report(&report);
        }
        Command::Rebuild { dir } => {
            let dir = dir.unwrap_or_else(|| settings.raw_data_dir.clone());
            let mut service = RetrievalService::open(&settings).await?;
            let report = service
                .rebuild(&dir)
                .await
                .with_context(|| format!("rebuild from {}", dir.display()))?;
            print_report(&report);
        }
        Command::Search {
            query,
            top_k,
            threshold,
            json,
        } => {
            let service = RetrievalService::open(&settings).await?;
            let results = service
                .search(
                    &query,
                    top_k.unwrap_or(settings.default_top_k),
                    threshold.unwrap_or(settings.default_threshold),
                )
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No matching question found.");
            } else {
                for (rank, result) in results.iter().enumerate() {
                    print_result(rank + 1, result);
                }
            }
        }
        Command::Batch {
            input,
            column,
            mode,
            top_k,
            threshold,
            output,
        } => {
            let queries = read_batch_input(&input, mode, column.as_deref())?;
            let service = RetrievalService::open(&settings).await?;
            let matches = service
                .batch_search(
                    &queries,
                    top_k.unwrap_or(1),
                    threshold.unwrap_or(settings.default_threshold),
                )
                .await?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("create {}", path.display()))?;
                    write_batch_csv(file, &matches)?;
                    println!("Wrote {} rows to {}", matches.len(), path.display());
                }
                None => {
                    for m in &matches {
                        println!("> {}", m.query);
                        match m.best() {
                            Some(best) => print_result(1, best),
                            None => println!("   (no match)\n"),
                        }
                    }
                }
            }
        }
        Command::Reset => {
            let mut service = RetrievalService::open(&settings).await?;
            service.reset().await?;
            println!("Store cleared.");
        }
        Command::Stats => {
            let service = RetrievalService::open(&settings).await?;
            let stats = service.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Directories expand to the supported files beneath them.
fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(extractor::collect_files_recursive(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn read_batch_input(input: &Path, mode: BatchMode, column: Option<&str>) -> Result<Vec<String>> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(batch::queries_from_text(&text, mode));
    }
    Ok(batch::load_queries(input, mode, column)?)
}

fn print_result(rank: usize, result: &SearchResult) {
    println!(
        "{}. [{:.1}%] {}\n   {}\n   ({})\n",
        rank,
        result.similarity_score * 100.0,
        result.record.question,
        result.record.answer.replace('\n', "\n   "),
        result.record.source_label()
    );
}

fn print_report(report: &IngestReport) {
    println!(
        "Processed {} file(s), added {} record(s).",
        report.files_processed, report.records_added
    );
    for file in &report.per_file {
        println!("  {:>5}  {}", file.records, file.path.display());
    }
    for failure in &report.failures {
        println!("  FAILED {}: {}", failure.path.display(), failure.error);
    }
}
