//! Line-oriented driver: feeds stdin to an [`Athena`] instance.
//!
//! Lines starting with `:` are commands, everything else is agent-language
//! text injected into the mind.

use athena_cognition::Athena;
use athena_core::{Error, PlanRule, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Think(String),
    Route { agents: Vec<String>, content: String },
    Persona(String),
    Context { kind: String, content: String },
    Reflect,
    Stop,
    Inject(String),
    Empty,
}

/// Parse one input line. Unknown `:` commands are injected as text and
/// fail there like any other malformed line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Inject(line.to_string());
    };
    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (rest, ""),
    };
    match verb {
        "ask" => Command::Ask(arg.to_string()),
        "think" => Command::Think(arg.to_string()),
        "route" => {
            let (agents, content) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
            Command::Route {
                agents: agents
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect(),
                content: content.trim().to_string(),
            }
        }
        "persona" => Command::Persona(arg.to_string()),
        "context" => {
            let (kind, content) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
            Command::Context {
                kind: kind.to_string(),
                content: content.trim().to_string(),
            }
        }
        "reflect" => Command::Reflect,
        "stop" | "quit" => Command::Stop,
        _ => Command::Inject(line.to_string()),
    }
}

/// Read a plan library: one plan per line, `//` and `#` lines ignored.
/// Unlabelled plans get `p<line>` labels.
pub fn load_behavior(path: &Path) -> Result<Vec<PlanRule>> {
    let content = std::fs::read_to_string(path)?;
    let mut plans = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        let mut plan = PlanRule::parse(line)?;
        if plan.label.is_none() {
            plan.label = Some(athena_core::Literal::new(format!("p{}", index + 1)));
        }
        plans.push(plan);
    }
    if plans.is_empty() {
        return Err(Error::Config(format!("no plans in {}", path.display())));
    }
    Ok(plans)
}

/// Run commands from `reader` until EOF or `:stop`.
pub async fn run<R>(athena: Arc<Athena>, reader: R, known_agents: Vec<String>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        athena.notify_activity();
        match parse_command(&line) {
            Command::Empty => {}
            Command::Stop => break,
            command => {
                if let Err(e) = execute(&athena, command, &known_agents) {
                    warn!("{}", e);
                    println!("error: {}", e);
                }
            }
        }
    }
    info!("[{}] Input closed", athena.session());
    Ok(())
}

fn execute(athena: &Arc<Athena>, command: Command, known_agents: &[String]) -> Result<()> {
    match command {
        Command::Ask(question) => {
            let handle = athena.ask(&question)?;
            tokio::spawn(async move {
                match handle.wait().await {
                    Ok(answer) => println!("{}", answer),
                    Err(e) => println!("error: {}", e),
                }
            });
        }
        Command::Think(message) => {
            let thought = athena.think("", None, &message, &[])?;
            tokio::spawn(async move {
                match thought.await {
                    Ok(Ok(report)) => println!(
                        "thought: {} plans, {} events, {} beliefs, {} skipped",
                        report.plans_added.len() + report.plans_reinforced.len(),
                        report.events,
                        report.beliefs,
                        report.skipped.len()
                    ),
                    Ok(Err(e)) => println!("error: {}", e),
                    Err(e) => println!("error: {}", e),
                }
            });
        }
        Command::Route { agents, content } => {
            let agents = if agents.is_empty() {
                known_agents.to_vec()
            } else {
                agents
            };
            let handle = athena.route_information(&content, &agents)?;
            tokio::spawn(async move {
                match handle.wait().await {
                    Ok(targets) => println!("route: {}", targets.replace('\n', ", ")),
                    Err(e) => println!("error: {}", e),
                }
            });
        }
        Command::Persona(persona) => athena.set_persona(&persona)?,
        Command::Context { kind, content } => athena.add_context(&kind, &content)?,
        Command::Reflect => athena.reflect_plans(),
        Command::Inject(text) => {
            let report = athena.inject(&text);
            for (line, reason) in &report.skipped {
                println!("skipped '{}': {}", line, reason);
            }
        }
        Command::Empty | Command::Stop => {}
    }
    Ok(())
}
