//! The CineScout command line: serves the assistant over HTTP or chats with
//! it in the terminal.

#[macro_use]
extern crate tracing;

use std::error::Error;
use std::io::Write as _;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use cinescout::{Settings, server};
use cinescout_client::{
    ChatSession, HttpTransport, LocalTransport, Message, MessageStatus,
};
use cinescout_core::Locale;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::net::TcpListener;

const BAR_CHAR: &str = "▎";
const THINKING_WIDTH: usize = 72;

#[derive(Parser, Debug)]
#[command(
    name = "cinescout",
    version,
    about = "CineScout: movie and TV recommendations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the assistant over HTTP
    Serve(ServeArgs),
    /// Chat with the assistant in the terminal
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on, overrides CINESCOUT_ADDR
    #[arg(short, long)]
    addr: Option<SocketAddr>,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Base URL of a running server
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    server: String,
    /// Run the assistant in this process instead of using a server
    #[arg(long, conflicts_with = "server")]
    local: bool,
    /// Language of the answers
    #[arg(long, value_enum, default_value_t = LocaleArg::En)]
    locale: LocaleArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LocaleArg {
    En,
    Zh,
}

impl From<LocaleArg> for Locale {
    fn from(arg: LocaleArg) -> Self {
        match arg {
            LocaleArg::En => Locale::En,
            LocaleArg::Zh => Locale::Zh,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Chat(args) => chat(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let settings = Settings::from_env()?;
    debug!("{settings:?}");
    let listener = TcpListener::bind(args.addr.unwrap_or(settings.addr)).await?;
    server::serve(listener, settings.driver(), shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
        return;
    }
    info!("shutting down");
}

async fn chat(args: ChatArgs) -> Result<(), Box<dyn Error>> {
    let locale = Locale::from(args.locale);
    let session = if args.local {
        let settings = Settings::from_env()?;
        ChatSession::with_locale(LocalTransport::new(settings.driver()), locale)
    } else {
        ChatSession::with_locale(HttpTransport::new(&args.server), locale)
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!(
        "{}",
        "Ask for recommendations. /retry, /clear and /quit do what they say."
            .dimmed()
    );
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_line().await else {
            break;
        };
        let result = match line.trim() {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                session.clear_conversation().await?;
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            "/retry" => session.retry_last_message().await,
            text => session.send_message(text).await,
        };
        if let Err(err) = result {
            let message = session.error().unwrap_or_else(|| err.to_string());
            println!("{}{}", BAR_CHAR.bright_red(), message.bright_red());
            continue;
        }

        render_answer(&session, &progress_style).await;
        println!();
    }
    Ok(())
}

/// Prints the streaming answer until it's complete or failed.
async fn render_answer(session: &ChatSession, progress_style: &ProgressStyle) {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style.clone());
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut state_rx = session.subscribe();
    let mut printed = 0;
    loop {
        let answer = state_rx.borrow_and_update().messages.last().cloned();
        let Some(answer) = answer else {
            break;
        };

        if printed == 0 {
            if let Some(thinking) = &answer.thinking {
                progress_bar.set_message(format!("🤔 {}", tail(thinking)));
            }
        }
        if answer.content.len() > printed {
            if printed == 0 {
                progress_bar.finish_and_clear();
                print!("{}🤖 ", BAR_CHAR.bright_cyan());
            }
            print!("{}", unprinted(&answer.content, printed).bright_white());
            std::io::stdout().flush().ok();
            printed = answer.content.len();
        }

        if answer.status != MessageStatus::Streaming {
            progress_bar.finish_and_clear();
            if printed > 0 {
                println!();
            }
            print_outcome(&answer);
            break;
        }
        if state_rx.changed().await.is_err() {
            break;
        }
    }
    progress_bar.finish_and_clear();
}

fn print_outcome(answer: &Message) {
    if answer.status == MessageStatus::Error {
        let error = answer.error.as_deref().unwrap_or("something went wrong");
        println!("{}{}", BAR_CHAR.bright_red(), error.bright_red());
        return;
    }
    for item in answer.results.iter().flatten() {
        let year = item
            .release_year()
            .map(|year| format!(" ({year})"))
            .unwrap_or_default();
        let rating = item
            .vote_average
            .map(|rating| format!(" ★ {rating:.1}"))
            .unwrap_or_default();
        println!(
            "{}  {}{}{}",
            BAR_CHAR.bright_cyan(),
            item.title.bold(),
            year.dimmed(),
            rating.yellow()
        );
    }
}

/// Returns the part of `content` after the first `printed` bytes.
fn unprinted(content: &str, printed: usize) -> &str {
    content.get(printed..).unwrap_or_default()
}

/// Returns the last line of `text`, shortened to fit the spinner.
fn tail(text: &str) -> String {
    let line = text.lines().last().unwrap_or_default();
    let count = line.chars().count();
    if count <= THINKING_WIDTH {
        return line.to_owned();
    }
    let skip = count - THINKING_WIDTH;
    format!("…{}", line.chars().skip(skip + 1).collect::<String>())
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
