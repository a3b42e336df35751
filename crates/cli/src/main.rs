use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use vietgo_agents::TourConciergeAgent;
use vietgo_completion::{Completion, OpenAiCompletion, TemplateCompletion};
use vietgo_core::{ChatInput, ResponseStatus, TourCatalog};
use vietgo_observability::{init_tracing, AppMetrics};
use vietgo_retrieval::{load_tour_records, EmbeddingModel, HashEmbeddingModel, TourIndex};
use vietgo_storage::Store;

type Agent = TourConciergeAgent<Store, Completion, TourIndex>;

#[derive(Debug, Parser)]
#[command(name = "vietgo")]
#[command(about = "VietGo tour concierge CLI")]
struct Cli {
    /// Directory holding the tour JSON files.
    #[arg(long, default_value = "data", env = "VIETGO_DATA_ROOT")]
    data_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat with session carry-over.
    Chat,
    /// One-shot question, prints the full response envelope.
    Ask {
        query: String,
        #[arg(long)]
        session: Option<String>,
    },
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    /// List every supported route.
    Routes,
    /// Score tours against a free-form query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("vietgo_cli");
    let cli = Cli::parse();

    let agent = build_agent(&cli.data_root).await?;

    match cli.command {
        Command::Chat => run_chat(agent).await?,
        Command::Ask { query, session } => {
            let reply = agent
                .handle_query(ChatInput {
                    session_id: session,
                    text: query,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Catalog { command } => match command {
            CatalogCommand::Routes => {
                for route in agent.catalog().supported_routes() {
                    println!("{}", route.display());
                }
            }
            CatalogCommand::Search { query, limit } => {
                let hits = agent.search_tours(&query, limit).await?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
        },
    }

    Ok(())
}

async fn run_chat(agent: Agent) -> Result<()> {
    let mut session_id: Option<String> = None;

    println!("VietGo concierge chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let reply = agent
            .handle_query(ChatInput {
                session_id: session_id.clone(),
                text: message.to_string(),
            })
            .await?;

        if let Some(id) = reply
            .data
            .as_ref()
            .and_then(|data| data.get("session_id"))
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
        {
            session_id = Some(id);
        }

        match reply.status {
            ResponseStatus::Error => {
                println!("\n{}\n", reply.error.unwrap_or_default());
            }
            _ => println!("\n{}\n", reply.message),
        }
    }

    Ok(())
}

async fn build_agent(data_root: &PathBuf) -> Result<Agent> {
    let metrics = AppMetrics::shared();

    let records = load_tour_records(data_root)
        .with_context(|| format!("failed loading tours from {}", data_root.display()))?;
    let catalog = Arc::new(TourCatalog::from_records(records.clone()));

    let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::default());
    let index = Arc::new(TourIndex::from_records(records, Some(embedder)));

    let store = if let Ok(database_url) = env::var("VIETGO_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    let completion = match env::var("OPENAI_API_KEY") {
        Ok(api_key) => {
            let mut backend = OpenAiCompletion::new(api_key);
            if let Ok(model) = env::var("VIETGO_OPENAI_MODEL") {
                backend = backend.with_model(model);
            }
            Completion::OpenAi(backend)
        }
        Err(_) => Completion::Template(TemplateCompletion),
    };

    info!(
        backend = completion.backend_name(),
        tours = catalog.len(),
        routes = catalog.supported_routes().len(),
        "agent ready"
    );

    Ok(TourConciergeAgent::new(
        catalog,
        index,
        Arc::new(completion),
        Arc::new(store),
        metrics,
    ))
}
