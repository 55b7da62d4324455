//! Agent Architect CLI entry point.
//!
//! One-shot subcommands over the local store: set up the runtime directory,
//! manage the API key, build agents from documents and sector research, run
//! simulations, improve instructions from failures and chat with an agent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use agent_architect::agent::{AgentDraft, IdentityFields, AUTO_MATCH_PREFIX};
use agent_architect::architect::Architect;
use agent_architect::config::{load_config, runtime_paths, Config, RuntimePaths};
use agent_architect::conversation::{Channel, ChatTurn};
use agent_architect::credentials::{load_env_file, resolve_api_key};
use agent_architect::discovery::CompanyContext;
use agent_architect::knowledge::source::SourceStatus;
use agent_architect::logging;
use agent_architect::providers::gemini::GeminiOracle;
use agent_architect::providers::{SearchOracle, TextOracle};
use agent_architect::simulation::{RunPhase, Verdict, DEFAULT_CATEGORIES};
use agent_architect::store::{Gateway, SqliteStore, Theme};

/// Agent Architect: design, test and tune LLM agent personas.
#[derive(Parser)]
#[command(name = "agent-architect", version, about)]
struct Cli {
    /// Runtime directory (defaults to ~/.agent-architect).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Create the runtime directory and a default config.toml.
    Init,
    /// Manage the stored API key.
    Key {
        /// Key action.
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show or set the UI theme.
    Theme {
        /// `light` or `dark`; omit to show the current theme.
        value: Option<Theme>,
    },
    /// Analyze a company website.
    Analyze {
        /// Website URL.
        #[arg(long)]
        url: String,
        /// Company name.
        #[arg(long)]
        name: String,
    },
    /// Discover sector references for a company.
    Discover {
        /// Company name.
        #[arg(long)]
        name: String,
        /// Company website.
        #[arg(long, default_value = "")]
        website: String,
        /// Business description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Build (or rebuild) an agent from persona fields and sources.
    Build(BuildArgs),
    /// Manage saved agents.
    Agents {
        /// Agent action.
        #[command(subcommand)]
        action: AgentsAction,
    },
    /// Generate scenarios and run a simulation against an agent.
    Test {
        /// Agent id.
        agent: String,
        /// Scenario categories (defaults to the built-in four).
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// List stored test runs.
    Runs {
        /// Only runs for this agent.
        #[arg(long)]
        agent: Option<String>,
    },
    /// Rewrite an agent's instructions from a run's failures.
    Improve {
        /// Agent id.
        agent: String,
        /// Run id.
        #[arg(long)]
        run: String,
        /// Extra guidance for the rewrite.
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Chat with an agent on stdin.
    Chat {
        /// Agent id.
        agent: String,
        /// Answer as on a social inbox (short replies).
        #[arg(long)]
        social: bool,
        /// Extra instruction for every reply.
        #[arg(long)]
        instruction: Option<String>,
    },
}

/// `key` actions.
#[derive(Subcommand)]
enum KeyAction {
    /// Store the API key.
    Set {
        /// The key.
        key: String,
    },
    /// Report whether a key resolves, without printing it.
    Status,
}

/// `agents` actions.
#[derive(Subcommand)]
enum AgentsAction {
    /// List agents.
    List,
    /// Print an agent as JSON.
    Show {
        /// Agent id.
        id: String,
    },
    /// Delete an agent.
    Delete {
        /// Agent id.
        id: String,
    },
}

/// Arguments for `build`.
#[derive(clap::Args)]
struct BuildArgs {
    /// Agent name.
    #[arg(long)]
    name: String,
    /// Company website.
    #[arg(long)]
    website: Option<String>,
    /// Role description.
    #[arg(long, default_value = "")]
    description: String,
    /// Interaction flow.
    #[arg(long, default_value = "")]
    flow: String,
    /// Tone / language style.
    #[arg(long, default_value = "")]
    tone: String,
    /// Reply in the user's language.
    #[arg(long)]
    auto_match: bool,
    /// Operational rules.
    #[arg(long, default_value = "")]
    rules: String,
    /// Document to ingest (repeatable).
    #[arg(long = "file")]
    files: Vec<PathBuf>,
    /// Link to add (repeatable).
    #[arg(long = "link")]
    links: Vec<String>,
    /// Import discovered sector references.
    #[arg(long)]
    sector: bool,
    /// Add a website analysis to the knowledge.
    #[arg(long)]
    analyze_website: bool,
    /// Rebuild this existing agent instead of creating one.
    #[arg(long)]
    update: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = match cli.home {
        Some(root) => RuntimePaths::under(root),
        None => runtime_paths()?,
    };

    match cli.command {
        Command::Init => handle_init(&paths),
        Command::Key { action } => handle_key(&paths, action).await,
        Command::Theme { value } => handle_theme(&paths, value).await,
        Command::Analyze { url, name } => {
            let (architect, _guard) = session(&paths, "analyze").await?;
            let profile = architect.analyze_website(&url, &name).await?;
            println!("{profile}");
            Ok(())
        }
        Command::Discover {
            name,
            website,
            description,
        } => handle_discover(&paths, name, website, description).await,
        Command::Build(args) => handle_build(&paths, args).await,
        Command::Agents { action } => handle_agents(&paths, action).await,
        Command::Test { agent, categories } => handle_test(&paths, &agent, categories).await,
        Command::Runs { agent } => handle_runs(&paths, agent.as_deref()).await,
        Command::Improve {
            agent,
            run,
            instruction,
        } => {
            let (architect, _guard) = session(&paths, "improve").await?;
            let updated = architect
                .improve_agent(&agent, &run, instruction.as_deref())
                .await?;
            println!("{}", updated.system_prompt);
            Ok(())
        }
        Command::Chat {
            agent,
            social,
            instruction,
        } => handle_chat(&paths, &agent, social, instruction.as_deref()).await,
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn load(paths: &RuntimePaths) -> anyhow::Result<Config> {
    load_config(&paths.config_file)
        .with_context(|| format!("failed to load {}", paths.config_file.display()))
}

async fn open_gateway(paths: &RuntimePaths, config: &Config) -> anyhow::Result<Gateway> {
    let database = paths.database_for(config);
    let store = SqliteStore::open(&database)
        .await
        .with_context(|| format!("failed to open {}", database.display()))?;
    Ok(Gateway::new(Arc::new(store)))
}

/// Store-only commands: console logging, no oracle.
async fn store_only(paths: &RuntimePaths) -> anyhow::Result<Gateway> {
    logging::init_cli();
    let config = load(paths)?;
    open_gateway(paths, &config).await
}

/// Oracle commands: file logging plus a resolved key. Fails before any
/// oracle call when no key is available.
async fn session(
    paths: &RuntimePaths,
    command: &str,
) -> anyhow::Result<(Architect, logging::LoggingGuard)> {
    let guard = logging::init_session(&paths.logs_dir, command)?;
    let config = load(paths)?;
    let gateway = open_gateway(paths, &config).await?;

    let stored = gateway.settings().api_key().await?;
    let env_file = load_env_file(&paths.env_file)
        .with_context(|| format!("failed to load {}", paths.env_file.display()))?;
    let key = resolve_api_key(stored.as_deref(), &env_file, |var| std::env::var(var).ok())?;

    let oracle = Arc::new(GeminiOracle::new(config.oracle.base_url.clone(), key));
    let text: Arc<dyn TextOracle> = oracle.clone();
    let search: Arc<dyn SearchOracle> = oracle;
    info!(
        session_id = guard.session_id(),
        root = %paths.root.display(),
        "session started"
    );
    Ok((Architect::new(&config, text, search, gateway), guard))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_init(paths: &RuntimePaths) -> anyhow::Result<()> {
    logging::init_cli();
    std::fs::create_dir_all(&paths.root)
        .with_context(|| format!("failed to create {}", paths.root.display()))?;
    std::fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;

    if paths.config_file.exists() {
        println!("config already exists at {}", paths.config_file.display());
        return Ok(());
    }
    let rendered =
        toml::to_string_pretty(&Config::default()).context("failed to render default config")?;
    std::fs::write(&paths.config_file, rendered)
        .with_context(|| format!("failed to write {}", paths.config_file.display()))?;
    println!("wrote {}", paths.config_file.display());
    Ok(())
}

async fn handle_key(paths: &RuntimePaths, action: KeyAction) -> anyhow::Result<()> {
    let gateway = store_only(paths).await?;
    match action {
        KeyAction::Set { key } => {
            gateway.settings().set_api_key(&key).await?;
            println!("API key stored");
        }
        KeyAction::Status => {
            let stored = gateway.settings().api_key().await?;
            let env_file = load_env_file(&paths.env_file)?;
            match resolve_api_key(stored.as_deref(), &env_file, |var| std::env::var(var).ok()) {
                Ok(_) => println!("API key configured"),
                Err(e) => println!("{e}"),
            }
        }
    }
    Ok(())
}

async fn handle_theme(paths: &RuntimePaths, value: Option<Theme>) -> anyhow::Result<()> {
    let gateway = store_only(paths).await?;
    match value {
        Some(theme) => {
            gateway.settings().set_theme(theme).await?;
            println!("theme set to {theme}");
        }
        None => println!("{}", gateway.settings().theme().await?),
    }
    Ok(())
}

async fn handle_discover(
    paths: &RuntimePaths,
    name: String,
    website: String,
    description: String,
) -> anyhow::Result<()> {
    let (architect, _guard) = session(paths, "discover").await?;
    let ctx = CompanyContext {
        name,
        website,
        description,
        existing_info: String::new(),
    };
    let candidates = architect.discover(&ctx).await?;
    if candidates.is_empty() {
        println!("no sources found");
    }
    for candidate in candidates {
        println!("{}\n  {}\n  {}", candidate.title, candidate.description(), candidate.uri);
    }
    Ok(())
}

async fn handle_build(paths: &RuntimePaths, args: BuildArgs) -> anyhow::Result<()> {
    let (architect, _guard) = session(paths, "build").await?;

    let existing = match &args.update {
        Some(id) => Some(architect.agent(id).await?),
        None => None,
    };
    let mut intake = match &existing {
        Some(agent) => architect.intake_with(AgentDraft::from_agent(agent).knowledge),
        None => architect.intake(),
    };

    if args.analyze_website {
        if let Some(url) = args.website.as_deref() {
            match architect.analyze_website(url, &args.name).await {
                Ok(profile) => {
                    let mut knowledge = intake.knowledge().clone();
                    knowledge.append_text(&format!("{profile}\n"));
                    intake.set_knowledge_text(&knowledge.render());
                }
                Err(e) => warn!(error = %e, "website analysis skipped"),
            }
        }
    }

    for path in &args.files {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        intake.ingest_file(&name, &bytes).await;
    }
    for link in &args.links {
        intake.add_link(link)?;
    }

    if args.sector {
        let ctx = CompanyContext {
            name: args.name.clone(),
            website: args.website.clone().unwrap_or_default(),
            description: args.description.clone(),
            existing_info: intake.knowledge().render(),
        };
        let candidates = architect.discover(&ctx).await?;
        if candidates.is_empty() {
            println!("no sector sources found");
        }
        intake.import_candidates(&candidates);
    }

    for source in intake.sources() {
        let marker = match source.status {
            SourceStatus::Ready => "ok",
            SourceStatus::Error => "failed",
            SourceStatus::Pending | SourceStatus::Processing => "pending",
        };
        println!("[{marker}] {} ({})", source.name, source.kind.as_str());
    }

    let tone = if args.auto_match {
        format!("{AUTO_MATCH_PREFIX}{}", args.tone)
    } else {
        args.tone
    };
    let sector_enriched = intake.has_sector_sources();
    let draft = AgentDraft {
        identity: IdentityFields {
            name: args.name,
            website: args.website,
            description: args.description,
            flow: args.flow,
            tone,
        },
        rules: args.rules,
        knowledge: intake.into_knowledge(),
    };
    let agent = architect
        .build_agent(&draft, sector_enriched, existing.as_ref())
        .await?;
    println!("saved agent {} ({})", agent.name(), agent.id);
    Ok(())
}

async fn handle_agents(paths: &RuntimePaths, action: AgentsAction) -> anyhow::Result<()> {
    let gateway = store_only(paths).await?;
    match action {
        AgentsAction::List => {
            for agent in gateway.agents().list().await? {
                println!("{}  {}", agent.id, agent.name());
            }
        }
        AgentsAction::Show { id } => match gateway.agents().get(&id).await? {
            Some(agent) => println!("{}", serde_json::to_string_pretty(&agent)?),
            None => anyhow::bail!("agent '{id}' not found"),
        },
        AgentsAction::Delete { id } => {
            if gateway.agents().delete(&id).await? {
                println!("deleted {id}");
            } else {
                anyhow::bail!("agent '{id}' not found");
            }
        }
    }
    Ok(())
}

async fn handle_test(
    paths: &RuntimePaths,
    agent_id: &str,
    categories: Vec<String>,
) -> anyhow::Result<()> {
    let (architect, _guard) = session(paths, "test").await?;
    let agent = architect.agent(agent_id).await?;

    let categories: Vec<&str> = if categories.is_empty() {
        DEFAULT_CATEGORIES.to_vec()
    } else {
        categories.iter().map(String::as_str).collect()
    };
    eprintln!("{}", RunPhase::GeneratingScenarios);
    let questions = architect.generate_scenarios(&agent, &categories).await?;
    if questions.is_empty() {
        anyhow::bail!("no scenarios generated; try again");
    }
    eprintln!("{} ({} scenarios)", RunPhase::ReadyToRun, questions.len());

    let run = architect
        .test_agent(&agent, &questions, |phase| match phase {
            RunPhase::Completed => eprintln!("\r{phase}      "),
            _ => eprint!("\r{phase}"),
        })
        .await?;

    for result in &run.results {
        println!(
            "[{}] {}\n    {}",
            result.verdict.as_str(),
            result.question_text,
            result.rationale
        );
    }
    println!(
        "score {}% ({} passed, {} warnings, {} failed) run {}",
        run.summary.score, run.summary.success, run.summary.warning, run.summary.failure, run.id
    );
    Ok(())
}

async fn handle_runs(paths: &RuntimePaths, agent: Option<&str>) -> anyhow::Result<()> {
    let gateway = store_only(paths).await?;
    let runs = match agent {
        Some(id) => gateway.runs().get_by_agent(id).await?,
        None => gateway.runs().list().await?,
    };
    for run in runs {
        let failures = run
            .results
            .iter()
            .filter(|r| r.verdict == Verdict::Failure)
            .count();
        println!(
            "{}  agent {}  score {}%  failures {}",
            run.id, run.agent_id, run.summary.score, failures
        );
    }
    Ok(())
}

async fn handle_chat(
    paths: &RuntimePaths,
    agent_id: &str,
    social: bool,
    instruction: Option<&str>,
) -> anyhow::Result<()> {
    let (architect, _guard) = session(paths, "chat").await?;
    let agent = architect.agent(agent_id).await?;
    let channel = if social { Channel::Social } else { Channel::Demo };

    let mut history: Vec<ChatTurn> = Vec::new();
    let stdin = std::io::stdin();
    print!("> ");
    std::io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let message = line?;
        let message = message.trim();
        if message.is_empty() {
            break;
        }
        match architect
            .reply(&agent, &history, message, instruction, channel)
            .await
        {
            Ok(reply) => {
                println!("{reply}");
                history.push(ChatTurn::user(message));
                history.push(ChatTurn::model(reply));
            }
            Err(e) => eprintln!("error: {e}"),
        }
        print!("> ");
        std::io::stdout().flush()?;
    }
    Ok(())
}
