//! `wegweiser chat` — interactive advisory session in the terminal.
//!
//! Input is multi-line: the student can paste a whole paragraph about
//! themselves and finish it with `EOD` on its own line. `exit` quits.

use std::io::{BufRead, Write};
use std::sync::Arc;

use wegweiser_agent::{AgentLoop, Classified, LoopOutcome, RecommendationSet, classify, system_prompt};
use wegweiser_config::{AppConfig, ConfigError};
use wegweiser_core::message::{Conversation, Message};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Err(ConfigError::MissingCredentials(missing)) = config.require_credentials() {
        eprintln!();
        eprintln!("  ERROR: Missing required credentials:");
        for name in &missing {
            eprintln!("    - {name}");
        }
        eprintln!();
        eprintln!("  Set them as environment variables, or add them to:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("Missing credentials. See above for setup instructions.".into());
    }

    let provider = wegweiser_providers::build_from_config(&config)
        .ok_or("No provider configured")?;
    let tavily_key = config.tavily_api_key.clone().unwrap_or_default();
    let tools = Arc::new(wegweiser_tools::default_registry(tavily_key));

    let prompt = config
        .system_prompt_override
        .clone()
        .unwrap_or_else(|| system_prompt(&config.protocol));

    let agent = AgentLoop::new(
        provider,
        &config.default_model,
        config.default_temperature,
        tools,
        prompt,
    )
    .with_max_cycles(config.max_cycles)
    .with_max_tokens(config.default_max_tokens);

    let mut conversation = Conversation::new();

    if let Some(msg) = message {
        conversation.push(Message::user(&msg));
        run_until_settled(&agent, &mut conversation, &config).await?;
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Wegweiser — Study Advisory Session     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     web_search, scrape_page, find_links");
    println!();
    println!("  Tell me about yourself — interests, strengths, goals.");
    println!("  Finish your input with 'EOD' on its own line.");
    println!("  Type 'exit' to quit.");
    println!();

    loop {
        let Some(input) = read_multiline("  You > ")? else {
            break;
        };
        conversation.push(Message::user(&input));
        run_until_settled(&agent, &mut conversation, &config).await?;
    }

    println!("  Goodbye!");
    Ok(())
}

/// Run the loop, answering suspensions interactively, until the agent
/// terminates (or exhausts its cycle budget).
async fn run_until_settled(
    agent: &AgentLoop,
    conversation: &mut Conversation,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        eprint!("  Thinking...");
        let outcome = agent.run(conversation).await;
        eprint!("\r             \r");

        match outcome {
            Ok(LoopOutcome::Completed(content)) => {
                render_final(&content, config);
                return Ok(());
            }
            Ok(LoopOutcome::Suspended { question, tool_call_id }) => {
                println!();
                println!("  Advisor asks: {question}");
                println!();
                let Some(answer) = read_multiline("  You > ")? else {
                    return Err("Session ended while the advisor was waiting for an answer".into());
                };
                conversation.push(Message::tool_result(&tool_call_id, &answer));
            }
            Ok(LoopOutcome::Exhausted) => {
                println!();
                println!("  The advisor could not finish within the allowed number of steps.");
                println!("  Try again with a narrower question.");
                println!();
                return Ok(());
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
                return Ok(());
            }
        }
    }
}

fn render_final(content: &str, config: &AppConfig) {
    match classify(content, &config.protocol) {
        Classified::Structured(set) => render_recommendations(&set),
        Classified::Final(text)
        | Classified::Question(text)
        | Classified::Intermediate(text) => {
            println!();
            for line in text.lines() {
                println!("  Advisor > {line}");
            }
            println!();
        }
    }
}

fn render_recommendations(set: &RecommendationSet) {
    println!();
    println!("  ══════════════ Recommendations ══════════════");
    for (i, rec) in set.recommendations.iter().enumerate() {
        println!();
        println!("  {}. {}", i + 1, rec.title);
        println!("     Expected income: {}", rec.income);
        for line in rec.reasoning.lines() {
            println!("     {line}");
        }
    }
    println!();
    println!("  ─────────────────────────────────────────────");
    for line in set.summary.lines() {
        println!("  {line}");
    }
    println!("  ═════════════════════════════════════════════");
    println!();
}

/// Read lines from stdin until a lone `EOD`. Returns `None` on `exit`
/// or end of input.
fn read_multiline(prompt: &str) -> Result<Option<String>, std::io::Error> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let stdin = std::io::stdin();
    let mut lines = Vec::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if lines.is_empty() && trimmed.eq_ignore_ascii_case("exit") {
            return Ok(None);
        }
        if trimmed == "EOD" {
            break;
        }
        lines.push(line);
    }

    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(lines.join("\n")))
}
