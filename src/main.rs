mod auth;
mod config;
mod document_ai;
mod document_db;
mod error;
mod heuristics;
mod pdf_check;
mod pipeline;
mod response;
mod retry;
mod server;
mod simple_refresh;
mod simplestore;

use config::Config;
use document_ai::DocumentAiClient;
use document_db::DocumentStore;
use pipeline::Pipeline;
use response::ProcessResponse;
use std::{env, fs, path::Path, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = ".config/docuparse.toml";

const USAGE: &str = "usage:
  docuparse parse <file.pdf>        send a PDF to Document AI and print its line items
  docuparse merge <response.json>   rebuild line items from a saved Document AI response
  docuparse serve                   run the HTTP API
  docuparse history                 list processed documents

config: $DOCUPARSE_CONFIG or .config/docuparse.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing; stdout is reserved for JSON output
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    document_ai::install_crypto_provider();

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["parse", path] => parse_file(path).await?,
        ["merge", path] => merge_file(path)?,
        ["serve"] => serve().await?,
        ["history"] => history()?,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let path = env::var("DOCUPARSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    info!(path = %path, "Loading config");
    Ok(Config::load(&path)?)
}

fn open_store(cfg: &Config) -> Result<DocumentStore, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(&cfg.db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(DocumentStore::new(&cfg.db_path)?)
}

fn build_pipeline(cfg: &Config) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let client = DocumentAiClient::new(cfg)?;
    let store = open_store(cfg)?;
    Ok(Pipeline::new(
        Arc::new(client),
        Arc::new(Mutex::new(store)),
        cfg.reuse_cached,
    ))
}

async fn parse_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config()?;
    let pipeline = build_pipeline(&cfg)?;

    let pdf_bytes = fs::read(path)?;
    let filename = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |f| f.to_string_lossy().into_owned());

    let result = pipeline.parse(&filename, &pdf_bytes).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn merge_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let response: ProcessResponse = serde_json::from_str(&content)?;
    let result = heuristics::extract_line_items(&response);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config()?;
    let pipeline = Arc::new(build_pipeline(&cfg)?);
    server::serve(&cfg, pipeline).await?;
    Ok(())
}

fn history() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config()?;
    let store = open_store(&cfg)?;
    info!(documents = store.count()?, db_path = %cfg.db_path, "Document history");
    let docs = store.list_documents()?;
    println!("{}", serde_json::to_string_pretty(&docs)?);
    Ok(())
}
