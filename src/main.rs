use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workspace_symbols::{
    config::ObservabilityConfig,
    lsp::LanguageServerRegistry,
    symbols::{ProjectScope, SymbolBackend, SymbolsProvider, WorkspaceSymbolsProvider},
    AggregatedResult, Config,
};

#[derive(Parser)]
#[command(name = "wsym")]
#[command(about = "Search symbols across every language server in a workspace", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true, env = "WSYM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search workspace symbols
    Search {
        #[arg(value_name = "QUERY", default_value = "")]
        query: String,

        /// Project root to start language servers in
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Print records as JSON
        #[arg(short, long)]
        json: bool,

        /// Override search.max_results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Override search.timeout_ms
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Start the configured servers and list the ones answering symbol queries
    Servers {
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.observability);

    match cli.command {
        Commands::Search {
            query,
            project,
            json,
            limit,
            timeout_ms,
        } => {
            let mut settings = config.search.settings();
            if let Some(limit) = limit {
                settings.max_results = limit;
            }
            if let Some(timeout_ms) = timeout_ms {
                settings.deadline = Duration::from_millis(timeout_ms);
            }

            let scope = project_scope(&project)?;
            let registry = Arc::new(LanguageServerRegistry::new(config.servers.clone()));
            let provider = WorkspaceSymbolsProvider::for_project(registry.clone(), scope)
                .with_settings(settings);

            let result = provider.fetch(&query).await;
            registry.stop_all().await;
            let result = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_records(&result);
            }
        }

        Commands::Servers { project } => {
            let scope = project_scope(&project)?;
            let registry = LanguageServerRegistry::new(config.servers.clone());
            let backends = registry.start_for_project(&scope).await;
            registry.stop_all().await;

            let backends = backends?;
            if backends.is_empty() {
                println!("No language server started in {}", project.display());
            }
            for backend in backends {
                let caps = backend.capabilities();
                let support = match (caps.workspace_symbol, caps.workspace_symbol_resolve) {
                    (true, true) => "workspace symbols, resolve",
                    (true, false) => "workspace symbols",
                    (false, _) => "no workspace symbols",
                };
                println!("{:<40} {}", backend.id().to_string(), support);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("workspace_symbols={}", observability.log_level).into()
    });

    // Logs go to stderr so stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn project_scope(project: &Path) -> anyhow::Result<ProjectScope> {
    let root = project
        .canonicalize()
        .with_context(|| format!("Project root {} does not exist", project.display()))?;
    Ok(ProjectScope::new(root))
}

fn print_records(result: &AggregatedResult) {
    for record in result {
        let location = match record.location() {
            Some(location) => format!(
                "{}:{}:{}",
                location.uri,
                location.range.start.line + 1,
                location.range.start.character + 1
            ),
            None => record.uri().unwrap_or_default().to_string(),
        };
        let container = record
            .container_name()
            .map(|c| format!(" in {}", c))
            .unwrap_or_default();

        println!("{:<14} {}{}  {}", record.kind().to_string(), record.name(), container, location);
    }

    if result.truncated > 0 {
        println!("... {} more not shown", result.truncated);
    }
}
