//! Interactive chat loop on stdin/stdout.

use anyhow::Result;
use biosight_agent::{Composer, GenerationId, InsightsSession, Intent, SessionEvent, Settlement};
use biosight_core::{Config, Message, hero_headline, marquee_suggestions};
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A parsed line of chat input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Plain text for the composer
    Text(String),
    /// An intent that bypasses the composer
    Intent(Intent),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one input line; `/N` picks the N-th marquee suggestion
pub fn parse_chat_line(line: &str, suggestions: &[&str]) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return ChatCommand::Text(line.to_string());
    };

    match command {
        "regen" | "regenerate" => ChatCommand::Intent(Intent::Regenerate),
        "stop" => ChatCommand::Intent(Intent::Stop),
        "clear" => ChatCommand::Intent(Intent::Clear),
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "help" | "?" => ChatCommand::Help,
        other => match other.parse::<usize>() {
            Ok(n) if n >= 1 && n <= suggestions.len() => {
                ChatCommand::Intent(Intent::SuggestionSelected(suggestions[n - 1].to_string()))
            }
            _ => ChatCommand::Unknown(line.to_string()),
        },
    }
}

/// Tracks intents the session has not answered yet, from its events alone.
///
/// Every intent produces exactly one of `Started`, `Stopped`, `Cleared` or
/// `Ignored`; a started generation stays outstanding until it settles or is
/// stopped or cleared.
#[derive(Debug, Default)]
struct Outstanding {
    unacknowledged: usize,
    active: Option<GenerationId>,
}

impl Outstanding {
    fn sent(&mut self) {
        self.unacknowledged += 1;
    }

    fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started(id) => {
                self.acknowledge();
                self.active = Some(*id);
            }
            SessionEvent::Settled { id, .. } => {
                if self.active == Some(*id) {
                    self.active = None;
                }
            }
            SessionEvent::Stopped(_) | SessionEvent::Cleared => {
                self.acknowledge();
                self.active = None;
            }
            SessionEvent::Ignored(_) => self.acknowledge(),
        }
    }

    fn acknowledge(&mut self) {
        self.unacknowledged = self.unacknowledged.saturating_sub(1);
    }

    fn is_quiet(&self) -> bool {
        self.unacknowledged == 0 && self.active.is_none()
    }
}

/// Run the conversation until `/quit`, or until input ends and the last
/// reply has been printed.
pub async fn run_chat<R>(config: &Config, mut session: InsightsSession, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let suggestions = marquee_suggestions(&config.assistant.suggestions);
    print_hero(&config.assistant.display_name, &suggestions);

    let mut composer = Composer::new();
    let mut outstanding = Outstanding::default();
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        if !input_open && outstanding.is_quiet() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                match parse_chat_line(&line, &suggestions) {
                    ChatCommand::Text(text) => {
                        composer.set(text);
                        let generating = session.handle.snapshot().generating;
                        match composer.take_submission(generating) {
                            Some(intent) => {
                                session.handle.send(intent)?;
                                outstanding.sent();
                            }
                            None => println!(
                                "{} A reply is still generating. Use /stop to cancel it.",
                                "Info:".yellow().bold()
                            ),
                        }
                    }
                    ChatCommand::Intent(intent) => {
                        if intent == Intent::Clear {
                            composer.clear();
                        }
                        session.handle.send(intent)?;
                        outstanding.sent();
                    }
                    ChatCommand::Help => print_help(),
                    ChatCommand::Quit => break,
                    ChatCommand::Empty => {}
                    ChatCommand::Unknown(input) => {
                        println!("{} Unknown command {}. Type /help.", "Warning:".yellow().bold(), input.cyan())
                    }
                }
            }
            event = session.events.recv() => {
                let Some(event) = event else { break };
                outstanding.observe(&event);
                render_event(&event, config, &suggestions);
            }
        }
    }

    Ok(())
}

fn render_event(event: &SessionEvent, config: &Config, suggestions: &[&str]) {
    match event {
        SessionEvent::Started(_) => println!("{}", "Thinking...".dimmed()),
        SessionEvent::Settled { settlement, .. } => match settlement {
            Settlement::Replied(message) => print_message(message),
            Settlement::Apologized(message) => println!("{} {}", "assistant:".red().bold(), message.content()),
            Settlement::Discarded => {}
        },
        SessionEvent::Stopped(_) => println!("{}", "Stopped.".dimmed()),
        SessionEvent::Cleared => print_hero(&config.assistant.display_name, suggestions),
        SessionEvent::Ignored(reason) => tracing::debug!(reason = reason.as_str(), "intent ignored"),
    }
}

pub fn print_message(message: &Message) {
    if message.is_user() {
        println!("{} {}", "you:".cyan().bold(), message.content());
    } else {
        println!("{} {}", "assistant:".green().bold(), message.content());
    }
}

pub fn print_hero(display_name: &str, suggestions: &[&str]) {
    println!();
    println!("{}", hero_headline(display_name, &chrono::Local::now()).bold());
    println!("{}", "Ask about trends, gaps or hypotheses in the publication data.".dimmed());
    for (index, suggestion) in suggestions.iter().enumerate() {
        println!("  {} {}", format!("/{}", index + 1).cyan(), suggestion);
    }
    println!();
}

fn print_help() {
    println!("{}", "Commands".bold().underline());
    println!("  {}  ask a question", "<text>".cyan());
    println!("  {}      use a suggested prompt", "/1../3".cyan());
    println!("  {}     regenerate the last answer", "/regen".cyan());
    println!("  {}      stop the current generation", "/stop".cyan());
    println!("  {}     clear the conversation", "/clear".cyan());
    println!("  {}      exit", "/quit".cyan());
}
