mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use concerto_agent::{ChatCompletionAgent, ContextWindow};
use concerto_core::{ConcertoError, InvocationResult, Response, Task, Worker};
use concerto_orchestrator::{
    ConcurrentOrchestration, FailurePolicy, GroupChatOrchestration, InProcessRuntime,
    RoundRobinGroupChatManager,
};
use config::ConcertoConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CHAT_HISTORY_MESSAGES: usize = 50;

#[derive(Parser)]
#[command(name = "concerto", about = "Concerto: concurrent multi-agent orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "concerto.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one task to every selected agent concurrently
    Concurrent {
        /// The task text
        task: String,
        /// Agents to include (default: all configured agents)
        #[arg(short, long)]
        agent: Vec<String>,
        /// Seconds to wait for all agents before returning partial results
        #[arg(short, long, default_value_t = 60)]
        timeout: u64,
        /// Abort everything on the first agent failure
        #[arg(long)]
        fail_fast: bool,
    },
    /// Let the selected agents take turns on one task
    GroupChat {
        task: String,
        #[arg(short, long)]
        agent: Vec<String>,
        /// Total number of turns
        #[arg(long, default_value_t = 5)]
        max_rounds: usize,
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,
    },
    /// Interactive chat with a single agent; type `exit` to quit
    Chat {
        /// Agent to talk to (default: the first configured agent)
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Inspect configured agents
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
}

#[derive(Subcommand)]
enum AgentsAction {
    /// List configured agents
    List,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_members(config: &ConcertoConfig, names: &[String]) -> anyhow::Result<Vec<Arc<dyn Worker>>> {
    let profiles = config.select_agents(names)?;
    if profiles.is_empty() {
        anyhow::bail!("No agents configured. Add [[agents]] entries to the config file.");
    }
    Ok(profiles
        .into_iter()
        .map(|profile| Arc::new(ChatCompletionAgent::new(profile, &config.model)) as Arc<dyn Worker>)
        .collect())
}

fn print_response(response: &Response) {
    println!("# {}\n{}\n", response.worker_name, response.content);
}

fn print_invocation(result: &InvocationResult, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    for failure in &result.failures {
        println!("# {} (failed)\n{}\n", failure.worker_name, failure.error);
    }
    println!(
        "{} response(s), {} failure(s)",
        result.responses.len(),
        result.failures.len()
    );
    Ok(())
}

async fn run_concurrent(
    config: &ConcertoConfig,
    task: Task,
    agents: &[String],
    timeout: Duration,
    fail_fast: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    let members = build_members(config, agents)?;
    let policy = if fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::IsolateAndContinue
    };
    let mut orchestration = ConcurrentOrchestration::new(members).with_failure_policy(policy);
    if !as_json {
        orchestration = orchestration.with_response_callback(print_response);
    }

    let runtime = InProcessRuntime::with_config(config.runtime.clone());
    runtime.start()?;

    let outcome = orchestration.invoke(task, &runtime)?.get(timeout).await;
    runtime.stop_when_idle().await?;

    match outcome {
        Ok(result) => print_invocation(&result, as_json),
        Err(ConcertoError::OrchestrationTimeout { timeout, partial }) => {
            warn!(timeout_secs = timeout.as_secs(), "Not every agent answered in time");
            print_invocation(&partial, as_json)?;
            anyhow::bail!("timed out after {}s", timeout.as_secs())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_group_chat(
    config: &ConcertoConfig,
    task: Task,
    agents: &[String],
    max_rounds: usize,
    timeout: Duration,
    as_json: bool,
) -> anyhow::Result<()> {
    let members = build_members(config, agents)?;
    let mut chat = GroupChatOrchestration::new(members, RoundRobinGroupChatManager::new(max_rounds)?);
    if !as_json {
        chat = chat.with_response_callback(print_response);
    }

    let runtime = InProcessRuntime::with_config(config.runtime.clone());
    runtime.start()?;
    let outcome = chat.invoke(task, &runtime)?.get(timeout).await;
    runtime.stop_when_idle().await?;

    let result = outcome?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Final answer from {}:\n{}", result.result.worker_name, result.result.content);
    }
    Ok(())
}

async fn run_chat(config: &ConcertoConfig, agent: Option<String>) -> anyhow::Result<()> {
    let profile = match agent {
        Some(name) => config.select_agents(&[name])?.remove(0),
        None => config
            .agents
            .first()
            .context("No agents configured. Add [[agents]] entries to the config file.")?,
    };
    let agent = ChatCompletionAgent::new(profile, &config.model);
    let mut context = ContextWindow::new(CHAT_HISTORY_MESSAGES);
    info!(agent = %profile.name, "Chat session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("User > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        match agent.chat(&mut context, input).await {
            Ok(answer) => println!("{} > {}", profile.name, answer),
            Err(e) => eprintln!("{} failed: {e}", profile.name),
        }
    }

    info!(agent = %profile.name, messages = context.len(), "Chat session ended");
    Ok(())
}

fn list_agents(config: &ConcertoConfig, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let agents: Vec<_> = config
            .agents
            .iter()
            .map(|a| {
                serde_json::json!({
                    "name": a.name,
                    "description": a.description,
                    "model": a.model.as_ref().unwrap_or(&config.model).model_id,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if config.agents.is_empty() {
        println!("No agents configured.");
        println!("Configure agents in concerto.toml under [[agents]]");
        return Ok(());
    }
    println!("Configured agents:");
    for agent in &config.agents {
        let model = agent.model.as_ref().unwrap_or(&config.model);
        if agent.description.is_empty() {
            println!("  {} ({})", agent.name, model.model_id);
        } else {
            println!("  {} ({}): {}", agent.name, model.model_id, agent.description);
        }
    }
    println!("\nTotal: {} agent(s)", config.agents.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env file");
        }
    }

    let mut config = ConcertoConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Concurrent {
            task,
            agent,
            timeout,
            fail_fast,
        } => {
            config.prepare_models()?;
            run_concurrent(
                &config,
                Task::new(task)?,
                &agent,
                Duration::from_secs(timeout),
                fail_fast,
                cli.json,
            )
            .await?;
        }
        Commands::GroupChat {
            task,
            agent,
            max_rounds,
            timeout,
        } => {
            config.prepare_models()?;
            run_group_chat(
                &config,
                Task::new(task)?,
                &agent,
                max_rounds,
                Duration::from_secs(timeout),
                cli.json,
            )
            .await?;
        }
        Commands::Chat { agent } => {
            config.prepare_models()?;
            run_chat(&config, agent).await?;
        }
        Commands::Agents { action } => match action {
            AgentsAction::List => list_agents(&config, cli.json)?,
        },
    }

    Ok(())
}
