//! Straylight CLI: evaluate applicants, route queries, inspect plugins.
//!
//! A thin adapter over the service layer for operation without the web
//! front-end. Configuration comes from the environment (see `config`).

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use straylight::config::Settings;
use straylight::evaluation::{EvaluationRequest, EvaluationService};
use straylight::logging;
use straylight::plugins::PluginManager;
use straylight::providers::factory::ProviderFactory;
use straylight::routing::reflection::AgenticFramework;
use straylight::routing::SemanticRouter;

#[derive(Parser)]
#[command(name = "straylight", version, about = "LLM-backed applicant evaluation and routing service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an applicant (text from --file or stdin).
    Evaluate {
        /// File with the applicant text; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Provider to use (defaults to LLM_PROVIDER).
        #[arg(long)]
        provider: Option<String>,
        /// Model to use (defaults to the provider's configured model).
        #[arg(long)]
        model: Option<String>,
        /// Evaluation criteria.
        #[arg(long, default_value = "")]
        criteria: String,
        /// Score a single axis instead of the full multi-axis template.
        #[arg(long)]
        single_axis: bool,
        /// Profile or document URL for enrichment.
        #[arg(long)]
        source_url: Option<String>,
        /// PDF resume URL for enrichment.
        #[arg(long)]
        pdf_url: Option<String>,
    },
    /// Route a natural-language query to a plugin and execute it.
    Query {
        /// The query text.
        text: String,
        /// Only print the routing decision, do not execute.
        #[arg(long)]
        analyze: bool,
        /// Run the full reflection loop instead of one-shot routing.
        #[arg(long)]
        reflect: bool,
    },
    /// List available plugins with their metadata.
    Plugins,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    logging::init_cli(&settings);

    let cli = Cli::parse();

    let factory = Arc::new(ProviderFactory::with_defaults());
    let plugin_manager = Arc::new(PluginManager::new(&settings, &factory));
    plugin_manager
        .initialize()
        .await
        .context("plugin manager initialization failed")?;

    let outcome = run(cli.command, &settings, &factory, &plugin_manager).await;

    plugin_manager.shutdown().await;
    outcome
}

async fn run(
    command: Command,
    settings: &Settings,
    factory: &Arc<ProviderFactory>,
    plugin_manager: &Arc<PluginManager>,
) -> anyhow::Result<()> {
    match command {
        Command::Evaluate {
            file,
            provider,
            model,
            criteria,
            single_axis,
            source_url,
            pdf_url,
        } => {
            let applicant_data = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("failed to read applicant text from stdin")?;
                    buffer
                }
            };

            let provider = provider.unwrap_or_else(|| settings.llm_provider.clone());
            let model = model.unwrap_or_else(|| settings.llm_model(&provider));
            let api_key = settings
                .llm_api_key(&provider)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;

            let use_plugin = source_url.is_some() || pdf_url.is_some();
            let service = EvaluationService::new(
                settings.clone(),
                Arc::clone(factory),
                Arc::clone(plugin_manager),
            );

            let response = service
                .evaluate(EvaluationRequest {
                    api_key,
                    provider,
                    model,
                    applicant_data,
                    criteria_string: criteria,
                    template_id: None,
                    custom_template: None,
                    ranking_keyword: None,
                    additional_instructions: None,
                    use_multi_axis: !single_axis,
                    use_plugin,
                    source_url,
                    pdf_url,
                    normalize_system: None,
                })
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Query {
            text,
            analyze,
            reflect,
        } => {
            let router = Arc::new(
                SemanticRouter::from_settings(settings, factory, Arc::clone(plugin_manager))
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?,
            );

            let result = if reflect {
                AgenticFramework::new(router)
                    .process_with_reflection(&text, None)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?
            } else if analyze {
                let decision = router
                    .route(&text)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                serde_json::to_value(decision)?
            } else {
                router
                    .process_query(&text)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?
            };

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Plugins => {
            let metadata = plugin_manager.all_plugin_metadata().await;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}
