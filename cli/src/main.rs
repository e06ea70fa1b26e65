use anyhow::Context;
use clap::Parser;
use colored::{Color, Colorize};
use config::{Settings, load_env_file};
use conversation::{
    ApiKey, CancellationToken, ChatClient, ChatError, ClientConfig, DEFAULT_MAX_TOKENS,
    SendOptions,
};
use llm::providers::OpenAIProvider;

use clap_derive::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod catalog;
mod commands;

const DEFAULT_MODEL: &str = "openai/gpt-4o-2024-11-20";

#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq)]
#[clap(rename_all = "lowercase")]
enum Mode {
    Chat,
    Stream,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model alias from the catalog (e.g. "Deepseek") or a raw gateway id
    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    #[arg(long)]
    system_message: Option<String>,

    /// Ask for JSON replies and parse them
    #[arg(long)]
    json: bool,

    #[arg(long)]
    max_history_words: Option<usize>,

    #[arg(long)]
    max_words_per_message: Option<usize>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Custom base URL for the gateway (e.g., for proxy or compatible services)
    #[arg(long, env = "OPENROUTER_BASE_URL")]
    base_url: Option<String>,

    /// Gateway key; OPENROUTER_API_KEY is used when omitted
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long, short)]
    tracing: bool,
}

// Application state
pub struct AppState {
    client: ChatClient,
    provider: OpenAIProvider,
    active_turn: ActiveTurn,
}

/// Cancellation token of the turn in flight, if any.
type ActiveTurn = Arc<Mutex<Option<CancellationToken>>>;

#[derive(Debug, PartialEq)]
enum Interrupt {
    CancelTurn,
    Exit,
}

/// Ctrl-C cancels the turn in flight; at the prompt it quits.
fn interrupt(active: &ActiveTurn) -> Interrupt {
    let turn = active.lock().ok().and_then(|slot| slot.clone());
    match turn {
        Some(token) => {
            token.cancel();
            Interrupt::CancelTurn
        }
        None => Interrupt::Exit,
    }
}

fn spawn_interrupt_handler(active: ActiveTurn) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt(&active) == Interrupt::Exit {
                println!();
                println!("Goodbye!");
                std::process::exit(130);
            }
        }
    });
}

fn set_active_turn(active: &ActiveTurn, token: Option<CancellationToken>) {
    if let Ok(mut slot) = active.lock() {
        *slot = token;
    }
}

/// Built-in defaults, overridden by the settings file, overridden by flags.
fn build_config(args: &Args, settings: &Settings) -> ClientConfig {
    let defaults = ClientConfig::default();
    let model = args
        .model
        .as_deref()
        .or(settings.default_model.as_deref())
        .map(catalog::resolve)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let stream = match args.mode {
        Some(mode) => mode == Mode::Stream,
        None => settings.stream.unwrap_or(defaults.stream),
    };

    ClientConfig {
        model,
        stream,
        json_mode: args.json || settings.json_mode.unwrap_or(defaults.json_mode),
        max_history_words: args
            .max_history_words
            .or(settings.max_history_words)
            .unwrap_or(defaults.max_history_words),
        max_words_per_message: args.max_words_per_message.or(settings.max_words_per_message),
        max_retries: args
            .max_retries
            .or(settings.max_retries)
            .unwrap_or(defaults.max_retries),
        max_tokens: args
            .max_tokens
            .or(settings.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: args.temperature.or(settings.temperature),
        base_url: args.base_url.clone().or_else(|| settings.base_url.clone()),
        api_key: args.api_key.as_deref().map(ApiKey::new),
        echo_color: settings
            .echo_color
            .as_deref()
            .and_then(|name| name.parse::<Color>().ok())
            .unwrap_or(defaults.echo_color),
        ..defaults
    }
}

fn setup_tracing(enable: bool) -> anyhow::Result<()> {
    if enable {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Setting default subscriber failed")
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::ERROR)
            .with_writer(io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Setting default subscriber failed")
    }
}

fn print_status_bar(client: &ChatClient) {
    let terminal_width: usize = 80;
    let mode = if client.config().stream { "stream" } else { "chat" };
    let status = format!(
        " {} • {} • {} words ",
        catalog::display_name(client.model_name()),
        mode,
        client.history_word_count()
    );
    let padding = terminal_width.saturating_sub(status.chars().count() + 2);
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;

    println!("┌{}┐", "─".repeat(terminal_width - 2));
    println!("│{}{}{}│", " ".repeat(left_pad), status, " ".repeat(right_pad));
    println!("└{}┘", "─".repeat(terminal_width - 2));
}

/// Run one turn, cancelling it if Ctrl-C arrives first.
async fn run_turn(
    client: &mut ChatClient,
    active: &ActiveTurn,
    message: &str,
) -> Result<(), ChatError> {
    let token = CancellationToken::new();
    set_active_turn(active, Some(token.clone()));

    let streaming = client.config().stream;
    let color = client.config().echo_color;
    let mut render = |fragment: &str| {
        print!("{}", fragment.color(color));
        let _ = io::stdout().flush();
    };

    let mut options = SendOptions::new().cancellation(token);
    if streaming {
        options = options.on_fragment(&mut render);
    }
    let result = client.send(message, options).await;
    set_active_turn(active, None);

    let reply = result?;
    if streaming {
        println!();
    } else {
        println!("{}", reply.content.as_str().color(color));
    }
    if let Some(warning) = reply.warning {
        eprintln!("{}", warning.to_string().yellow());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    setup_tracing(args.tracing)?;

    let settings = Settings::load();
    let config = build_config(&args, &settings);

    let provider = config.provider()?;
    let mut client = ChatClient::new(config, &provider)?;
    if let Some(system_message) = args.system_message.as_deref() {
        client.set_system_message(Some(system_message));
    }

    let mut state = AppState {
        client,
        provider,
        active_turn: ActiveTurn::default(),
    };
    spawn_interrupt_handler(state.active_turn.clone());

    println!();
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_status_bar(&state.client);
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match commands::Command::parse(input) {
                Ok(cmd) => match cmd.execute(&mut state).await {
                    commands::CommandResult::Exit => break,
                    commands::CommandResult::Continue => continue,
                },
                Err(err) => {
                    println!("{}", err);
                    println!();
                    continue;
                }
            }
        }

        if let Err(e) = run_turn(&mut state.client, &state.active_turn, input).await {
            eprintln!("{}", format!("Error: {}", e).red());
            // Either way no reply is coming for this message.
            if matches!(e, ChatError::RetryExhausted { .. } | ChatError::Cancelled) {
                state.client.pop_unanswered();
            }
        }

        println!();
    }

    println!(
        "Conversation ended with {} messages in history",
        state.client.history().len()
    );
    Ok(())
}
