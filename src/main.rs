//! # Persona: fact-grounded personal assistant
//!
//! Usage:
//!   persona search "what does chris eat"     # Show retrieved facts + confidence
//!   persona ask "what are his hobbies"       # Stream a reply, then verify it
//!   persona check                            # Validate the knowledge base
//!   persona serve --port 8080                # Start the HTTP gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use persona_agent::{Agent, TurnContext};
use persona_core::PersonaConfig;
use persona_knowledge::{KnowledgeBase, RetrievalEngine};
use persona_providers::ThinkFilter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "persona",
    version,
    about = "🧑 Persona: answers questions about one person from a fixed set of facts"
)]
struct Cli {
    /// Config file (default: ~/.persona/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve facts for a query without calling the model
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Ask a question and stream the answer
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
        /// Model override
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Load and validate the knowledge base, then probe the provider
    Check,
    /// Run the HTTP gateway
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
    },
}

fn load_config(path: Option<&str>) -> Result<PersonaConfig> {
    let config = match path {
        Some(p) => {
            let mut config = PersonaConfig::load_from(&PathBuf::from(shellexpand::tilde(p).to_string()))?;
            config.apply_env_overrides();
            config
        }
        None => PersonaConfig::load()?,
    };
    Ok(config)
}

/// `EnvFilter` directives used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "persona=debug,persona_knowledge=debug,persona_verifier=debug,persona_agent=debug,persona_providers=debug,persona_gateway=debug,tower_http=debug"
    } else {
        "persona=info,persona_knowledge=info,persona_verifier=info,persona_agent=info,persona_providers=info,persona_gateway=info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = default_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Search { query } => search(&config, &query.join(" ")),
        Commands::Ask { query, model } => ask(&config, &query.join(" "), model).await,
        Commands::Check => check(&config).await,
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            println!("🧑 Persona v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 Gateway:  http://{}:{}", config.gateway.host, config.gateway.port);
            println!("   🦙 Model:    {} @ {}", config.llm.model, config.llm.endpoint);
            println!();
            persona_gateway::start(&config).await
        }
    }
}

fn search(config: &PersonaConfig, query: &str) -> Result<()> {
    let kb = Arc::new(KnowledgeBase::from_config(config)?);
    let engine = RetrievalEngine::new(kb, config);

    let entries = engine.find_relevant_entries(query);
    let confidence = engine.calculate_confidence(query, &entries);

    println!("🔍 \"{query}\"");
    if entries.is_empty() {
        println!("   (no matching facts)");
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("   {}. [{}] {} ({})", i + 1, entry.id, entry.question, entry.category);
        println!("      {}", entry.answer);
    }
    if let Some(exact) = engine.find_exact_match(query) {
        println!("   🎯 Exact match: {}", exact.id);
    }
    println!("   📊 Confidence: {confidence:.2}");
    Ok(())
}

async fn ask(config: &PersonaConfig, query: &str, model: Option<String>) -> Result<()> {
    let agent = Agent::from_config(config)?;
    let turn = TurnContext {
        model,
        ..TurnContext::default()
    };

    let (prepared, mut stream) = agent.generate(query, &turn).await?;
    tracing::debug!("Confidence {:.2}", prepared.confidence);

    let mut filter = ThinkFilter::new();
    let mut stdout = std::io::stdout();
    while let Some(delta) = stream.next().await {
        if let Some(visible) = filter.push(&delta?) {
            print!("{visible}");
            stdout.flush()?;
        }
    }
    if let Some(rest) = filter.finish() {
        print!("{rest}");
    }
    println!();

    let generated = filter.cleaned();
    let verification = agent.verifier().verify(&generated, &prepared.entries);
    if verification.text.trim() != generated.trim() {
        println!("\n✅ Verified answer:\n{}", verification.text);
    }
    Ok(())
}

async fn check(config: &PersonaConfig) -> Result<()> {
    let kb = KnowledgeBase::from_config(config)?;
    println!("📚 Knowledge base: {} facts", kb.len());
    println!("   Categories: {}", kb.categories().join(", "));

    let weak: Vec<&str> = kb
        .entries()
        .iter()
        .filter(|e| !e.is_fuzzy_matchable())
        .map(|e| e.id.as_str())
        .collect();
    if !weak.is_empty() {
        println!("   ⚠️  Without keywords or variations: {}", weak.join(", "));
    }
    if kb.get(&config.subject.identity_entry_id).is_none() {
        println!(
            "   ⚠️  Identity entry '{}' is missing",
            config.subject.identity_entry_id
        );
    }

    let provider = persona_providers::create_provider(&config.llm)?;
    if provider.health_check().await? {
        println!("🦙 {} reachable at {}", provider.name(), config.llm.endpoint);
    } else {
        println!("❌ {} not reachable at {}", provider.name(), config.llm.endpoint);
    }
    Ok(())
}
