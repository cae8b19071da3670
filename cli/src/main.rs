use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use perplexity::{AnswerDetails, ClientConfig, SearchFocus, SearchMode, Session, SessionError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("stdin read failed: {0}")]
    Stdin(#[from] io::Error),
    #[error("question is empty")]
    EmptyQuestion,
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Session(err) => err.error_code(),
            Self::Stdin(_) => "E_STDIN",
            Self::EmptyQuestion => "E_USAGE",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pplx", about = "Ask Perplexity from the terminal")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Log level for stderr diagnostics.
    #[arg(long, env = "PPLX_LOG", default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

/// Flags layered over `PPLX_*` environment configuration.
#[derive(Args, Debug)]
struct Overrides {
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[arg(long, global = true)]
    focus: Option<SearchFocus>,

    #[arg(long, global = true)]
    mode: Option<SearchMode>,

    #[arg(long, global = true)]
    language: Option<String>,

    #[arg(long, global = true)]
    timezone: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question and print the answer.
    Ask(AskArgs),
    /// Read questions from stdin, one per line, as a single thread.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct AskArgs {
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,

    /// Also print the cited source URLs.
    #[arg(long)]
    sources: bool,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    sources: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(cli.log_level)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.overrides)?;
    match cli.command {
        Command::Ask(args) => run_ask(config, args).await,
        Command::Chat(args) => run_chat(config, args).await,
    }
}

fn load_config(overrides: Overrides) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(endpoint) = overrides.endpoint {
        perplexity::config::parse_endpoint(&endpoint)?;
        config.endpoint = endpoint;
    }
    if let Some(focus) = overrides.focus {
        config.ask.search_focus = focus;
    }
    if let Some(mode) = overrides.mode {
        config.ask.mode = mode;
    }
    if let Some(language) = overrides.language {
        config.ask.language = language;
    }
    if let Some(timezone) = overrides.timezone {
        config.ask.timezone = timezone;
    }
    Ok(config)
}

async fn run_ask(config: ClientConfig, args: AskArgs) -> Result<(), CliError> {
    let question = args.question.join(" ");
    if question.trim().is_empty() {
        return Err(CliError::EmptyQuestion);
    }

    let mut session = Session::connect(config).await?;
    let result = ask_once(&mut session, &question).await;
    session.close().await?;

    print_answer(&result?, args.sources);
    Ok(())
}

async fn run_chat(config: ClientConfig, args: ChatArgs) -> Result<(), CliError> {
    let mut session = Session::connect(config).await?;
    eprintln!("connected; one question per line, EOF to quit");

    let result = chat_loop(&mut session, args.sources).await;
    session.close().await?;
    result
}

async fn chat_loop(session: &mut Session, sources: bool) -> Result<(), CliError> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        let answer = ask_once(session, question).await?;
        print_answer(&answer, sources);
        io::stdout().flush()?;
    }
    Ok(())
}

async fn ask_once(session: &mut Session, question: &str) -> Result<AnswerDetails, CliError> {
    let seq = session.ask(question).await?;
    tracing::debug!(seq, "waiting for answer");
    Ok(session.read_answer().await?)
}

fn print_answer(answer: &AnswerDetails, sources: bool) {
    println!("{}", answer.answer);
    if sources {
        for (i, result) in answer.web_results.iter().enumerate() {
            println!("[{}] {} <{}>", i + 1, result.name, result.url);
        }
    }
    println!();
}
