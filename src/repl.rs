//! Interactive command loop

use crate::agent::RiskAgent;
use crate::token;
use crate::Result;
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROMPT: &str = "\n🤖 > ";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze(String),
    Quick(String),
    Holders(String),
    Trending,
    Help,
    Quit,
    /// Anything else is passed to the model as-is
    Chat(String),
    Empty,
}

impl Command {
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match (head.to_ascii_lowercase().as_str(), rest.is_empty()) {
            ("analyze", false) => Command::Analyze(rest.to_string()),
            ("quick", false) => Command::Quick(rest.to_string()),
            ("holders", false) => Command::Holders(rest.to_string()),
            ("trending", true) => Command::Trending,
            ("help", true) => Command::Help,
            ("quit" | "exit", true) => Command::Quit,
            _ => Command::Chat(line.to_string()),
        }
    }
}

pub fn help_text() -> String {
    let mut out = String::from(
        "\nAvailable commands:\n\
         ───────────────────────────────────────────────────────────────\n\
         \x20 analyze <token>    Full risk analysis for a token address\n\
         \x20 quick <token>      Quick lookup of token info\n\
         \x20 holders <token>    Check holder distribution\n\
         \x20 trending           Show trending tokens on Solana\n\
         \x20 help               Show this help message\n\
         \x20 quit / exit        Exit the agent\n\
         ───────────────────────────────────────────────────────────────\n\
         \nExample token addresses:\n",
    );
    for known in token::examples() {
        let _ = writeln!(out, "  {:<6} {}", format!("{}:", known.symbol), known.address);
    }
    out.push_str("\nOr just ask any question about DeFi tokens!\n");
    out
}

/// Run one command and render its output
pub async fn execute(agent: &RiskAgent, command: Command) -> Result<Option<String>> {
    let output = match command {
        Command::Empty => return Ok(Some(String::new())),
        Command::Quit => return Ok(None),
        Command::Help => help_text(),
        Command::Analyze(address) => agent.analyze(&address).await?.render_markdown(),
        Command::Quick(address) => agent.quick(&address).await?.render_markdown(),
        Command::Holders(address) => agent.holders(&address).await?,
        Command::Trending => agent.trending().await?,
        Command::Chat(message) => agent.chat(&message).await?,
    };
    Ok(Some(output))
}

/// Read commands from stdin until `quit`, end of input or Ctrl-C
pub async fn run(agent: &RiskAgent) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(help_text().as_bytes()).await?;

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                stdout.write_all("\n\n⚠️ Interrupted by user\n".as_bytes()).await?;
                break;
            }
        };

        let command = Command::parse_line(&line);
        if command == Command::Empty {
            continue;
        }
        if !matches!(command, Command::Help | Command::Quit) {
            stdout.write_all("\n💭 Processing...\n".as_bytes()).await?;
            stdout.flush().await?;
        }

        let output = tokio::select! {
            result = execute(agent, command) => result,
            _ = tokio::signal::ctrl_c() => {
                stdout.write_all("\n⚠️ Cancelled\n".as_bytes()).await?;
                continue;
            }
        };

        match output {
            Ok(Some(text)) => {
                stdout.write_all(text.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Command failed");
                stdout.write_all(format!("\n❌ Error: {}\n", e).as_bytes()).await?;
            }
        }
    }

    stdout.flush().await?;
    Ok(())
}
