mod loader;

use anyhow::Result;
use clap::Parser;
use loader::load_document;
use qfs_common::{logger, AppConfig, ExtractorKind};
use qfs_llm::{LlmClient, OllamaClient, RateLimitedClient};
use qfs_refine::{
    render_json, render_print, write_report, DocumentView, EmbeddingExtractor, EvidenceExtractor,
    IterationController, LexicalExtractor, LlmCritic, LlmSynthesizer, OutputFormat, RetryPolicy,
    RunReport, RunResult,
};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        // Fallback to default dotenv behavior
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "qfs")]
#[command(about = "QFS - query-focused summarization with iterative critique", long_about = None)]
struct Cli {
    /// Plain-text or PDF document to summarize
    #[arg(long)]
    file: PathBuf,

    /// Question the summary should answer
    #[arg(long)]
    query: String,

    /// Refinement budget (defaults to MAX_ITERATIONS)
    #[arg(long = "max_iterations")]
    max_iterations: Option<u32>,

    /// print or json
    #[arg(long = "output_format", default_value = "print")]
    output_format: OutputFormat,

    /// Write the json output to this file instead of stdout
    #[arg(long = "json_path")]
    json_path: Option<PathBuf>,

    /// Maximum LLM requests per second
    #[arg(long)]
    limiter: Option<f64>,

    /// lexical or embedding
    #[arg(long)]
    extractor: Option<ExtractorKind>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    load_dotenv_from_project_root();

    let mut config = AppConfig::from_env()?;
    if let Some(kind) = cli.extractor {
        config.extractor = kind;
    }
    if let Some(rate) = cli.limiter {
        config.requests_per_second = Some(rate);
    }
    config.validate()?;
    config.ensure_directories()?;

    logger::setup_logging(&config.log_dir, &config.log_level)?;

    let max_iterations = cli.max_iterations.unwrap_or(config.max_iterations);

    info!("QFS starting...");
    info!("  Document: {}", cli.file.display());
    info!("  Extractor: {:?}", config.extractor);
    info!("  Models: {} (critic: {})", config.llm_model, config.critic_model);
    info!("  Budget: {} iterations", max_iterations);

    let (result, document_text) = match load_document(&cli.file).await {
        Ok(text) => {
            let result = summarize(&config, &text, &cli.query, max_iterations).await?;
            (result, text)
        }
        Err(e) => {
            warn!("Cannot use document: {}", e);
            let result = RunResult::input_invalid(cli.query.trim(), max_iterations, e.to_string());
            (result, String::new())
        }
    };

    let exit_code = result.exit_code();
    emit(&cli, result, &document_text).await?;

    Ok(ExitCode::from(exit_code))
}

fn build_client(config: &AppConfig) -> qfs_common::Result<Arc<dyn LlmClient>> {
    let client = OllamaClient::new(
        &config.ollama_base_url,
        Duration::from_secs(config.delegate_timeout_secs),
    )?;

    match config.requests_per_second {
        Some(rate) => {
            info!("  Rate limit: {} requests/sec", rate);
            Ok(Arc::new(RateLimitedClient::new(client, rate)?))
        }
        None => Ok(Arc::new(client)),
    }
}

fn build_extractor(
    config: &AppConfig,
    client: Arc<dyn LlmClient>,
) -> qfs_common::Result<Arc<dyn EvidenceExtractor>> {
    let extractor: Arc<dyn EvidenceExtractor> = match config.extractor {
        ExtractorKind::Lexical => Arc::new(LexicalExtractor::new(config.evidence_top_k)?),
        ExtractorKind::Embedding => Arc::new(EmbeddingExtractor::new(
            client,
            &config.embedding_model,
            config.evidence_top_k,
        )),
    };
    Ok(extractor)
}

async fn summarize(
    config: &AppConfig,
    text: &str,
    query: &str,
    max_iterations: u32,
) -> Result<RunResult> {
    let client = build_client(config)?;
    if !client.test_connection().await.unwrap_or(false) {
        warn!("Ollama is not reachable at {}", config.ollama_base_url);
    }

    let controller = IterationController::new(
        build_extractor(config, client.clone())?,
        Arc::new(LlmSynthesizer::new(client.clone(), &config.llm_model)),
        Arc::new(LlmCritic::new(client, &config.critic_model, text)),
    )
    .with_policy(RetryPolicy::from_config(config));

    let document = DocumentView::with_passage_limit(text, config.passage_max_chars);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if second_interrupt(&cancel, tokio::signal::ctrl_c).await {
                warn!("Interrupted again; exiting immediately");
                std::process::exit(130);
            }
        }
    });

    let result = controller
        .run_with_cancellation(&document, query, max_iterations, &cancel)
        .await;
    watcher.abort();

    Ok(result)
}

/// The first interrupt cancels the run at the next iteration boundary; returns
/// true once a second interrupt arrives. A failing signal listener returns false.
async fn second_interrupt<F, Fut>(cancel: &CancellationToken, mut next_interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupted; stopping after the current iteration (press Ctrl-C again to exit now)");
    cancel.cancel();

    next_interrupt().await.is_ok()
}

async fn emit(cli: &Cli, result: RunResult, document_text: &str) -> Result<()> {
    match cli.output_format {
        OutputFormat::Print => {
            if cli.json_path.is_some() {
                warn!("--json_path is ignored with print output");
            }
            print!("{}", render_print(&result));
        }
        OutputFormat::Json => {
            let json = render_json(&RunReport::new(result, document_text))?;
            match &cli.json_path {
                Some(path) => {
                    write_report(path, &json).await?;
                    info!("Result written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}
