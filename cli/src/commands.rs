// Slash command parsing and handling

use llm::ModelProvider;

use crate::AppState;
use crate::catalog::{self, CATALOG};

#[derive(Debug, PartialEq)]
pub enum Command {
    Quit,
    Help,
    Clear,
    SetModel(String),
    Models { all: bool },
    System(Option<String>),
    Stream(bool),
    History,
}

pub enum CommandResult {
    Continue,
    Exit,
}

impl Command {
    pub fn parse(input: &str) -> Result<Self, String> {
        let Some(body) = input.strip_prefix('/') else {
            return Err("Not a command".to_string());
        };

        let (name, rest) = match body.trim().split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body.trim(), ""),
        };
        if name.is_empty() {
            return Err("Empty command".to_string());
        }

        match name {
            "quit" | "exit" => Ok(Command::Quit),
            "help" => Ok(Command::Help),
            "clear" => Ok(Command::Clear),
            "history" => Ok(Command::History),
            "model" => {
                if rest.is_empty() {
                    return Err("Usage: /model <alias|id>".to_string());
                }
                Ok(Command::SetModel(rest.to_string()))
            }
            "models" => match rest {
                "" => Ok(Command::Models { all: false }),
                "all" => Ok(Command::Models { all: true }),
                _ => Err("Usage: /models [all]".to_string()),
            },
            "system" => Ok(Command::System((!rest.is_empty()).then(|| rest.to_string()))),
            "stream" => match rest {
                "on" => Ok(Command::Stream(true)),
                "off" => Ok(Command::Stream(false)),
                _ => Err("Usage: /stream on|off".to_string()),
            },
            _ => Err(format!(
                "Unknown command: /{}. Type /help for available commands.",
                name
            )),
        }
    }

    pub async fn execute(self, state: &mut AppState) -> CommandResult {
        match self {
            Command::Quit => {
                println!("Goodbye!");
                return CommandResult::Exit;
            }
            Command::Help => print_help(),
            Command::Clear => {
                state.client.clear_history();
                println!("Conversation history cleared.");
            }
            Command::SetModel(alias) => {
                let model_id = catalog::resolve(&alias);
                match state.provider.create_chat_model(&model_id) {
                    Some(model) => {
                        state.client.switch_model(model);
                        println!("Switched to {}", catalog::display_name(&model_id));
                        println!("(Conversation history preserved)");
                    }
                    None => eprintln!("Failed to create model for {}", model_id),
                }
            }
            Command::Models { all: false } => print_catalog(state.client.config().model.as_str()),
            Command::Models { all: true } => match state.provider.list_models().await {
                Ok(models) => {
                    for model in &models {
                        match model.context_length {
                            Some(context) => println!("  {:<50} {:>8} ctx", model.id, context),
                            None => println!("  {}", model.id),
                        }
                    }
                    println!("{} models available", models.len());
                }
                Err(e) => eprintln!("Failed to list models: {}", e),
            },
            Command::System(None) => println!("System message: {}", state.client.system_message()),
            Command::System(Some(text)) => {
                state.client.set_system_message(Some(&text));
                println!("System message set.");
            }
            Command::Stream(enabled) => {
                state.client.set_stream(enabled);
                println!("Streaming {}.", if enabled { "on" } else { "off" });
            }
            Command::History => println!(
                "{} messages, {} of {} words",
                state.client.history().len(),
                state.client.history_word_count(),
                state.client.config().max_history_words
            ),
        }
        println!();
        CommandResult::Continue
    }
}

fn print_catalog(current: &str) {
    println!("  {:<18} {:<26} {}", "Model", "Good at", "Cost");
    for entry in CATALOG {
        let marker = if entry.id == current { "*" } else { " " };
        println!(
            "{} {:<18} {:<26} {}",
            marker, entry.display_name, entry.strength, entry.cost
        );
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /quit, /exit           - Exit the chat");
    println!("  /clear                 - Clear conversation history");
    println!("  /model <alias|id>      - Switch model (history is kept)");
    println!("  /models [all]          - List curated models, or everything the gateway offers");
    println!("  /system [text]         - Show or replace the system message");
    println!("  /stream on|off         - Toggle streamed replies");
    println!("  /history               - Show history size");
    println!("  /help                  - Show this help message");
    println!("  Ctrl+C                 - Cancel the reply in progress, or exit at the prompt");
    println!("  Ctrl+D                 - Exit the chat");
}
