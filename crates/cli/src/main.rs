mod config;
mod demo;
mod error;

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use connector::functions::render_definitions;
use connector::parser::{self, ParsedCall};
use connector::{Connector, OpenAiBackend, Session, ToolCallingConfig};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Be concise and direct.";
const CONFIG_FILE: &str = "fncall.toml";

#[derive(Parser)]
#[command(name = "fncall")]
#[command(about = "Function calling for locally served chat models", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log connector decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Print answers as they are generated
        #[arg(short, long)]
        stream: bool,
    },
    /// Print the function definitions advertised to the model
    Functions,
    /// Run the call parser on TEXT (or stdin) and print what it recovers
    Parse { text: Option<String> },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Chat { stream }) => cmd_chat(&cli.config, stream).await,
        None => cmd_chat(&cli.config, false).await,
        Some(Commands::Functions) => cmd_functions(&cli.config),
        Some(Commands::Parse { text }) => cmd_parse(text),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,connector=debug,fncall=debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn cmd_chat(config_path: &Path, stream: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    println!("fncall v{}", env!("CARGO_PKG_VERSION"));

    let backend = config.backend();
    println!("Backend: {backend}");

    let connector =
        Connector::new(backend, demo::registry()).with_options(config.connector.clone());
    let mut session =
        Session::new(Arc::new(connector), config.execution_settings()).with_system(SYSTEM_PROMPT);
    println!("Session ID: {}", session.id);
    println!("Type 'quit' or Ctrl+D to exit, Ctrl+C cancels a reply.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let outcome = if stream {
            stream_turn(&mut session, input, cancel).await
        } else {
            session
                .chat(input, &cancel)
                .await
                .map(|answer| println!("\n{answer}\n"))
        };
        watcher.abort();

        match outcome {
            Ok(()) => {}
            Err(connector::Error::Cancelled) => eprintln!("\n(cancelled)\n"),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    println!("\nSession ended.");
    Ok(())
}

async fn stream_turn(
    session: &mut Session<OpenAiBackend>,
    input: &str,
    cancel: CancellationToken,
) -> connector::Result<()> {
    let mut stdout = io::stdout();
    println!();

    let mut fragments = Box::pin(session.chat_stream(input, cancel));
    while let Some(fragment) = fragments.next().await {
        print!("{}", fragment?);
        // A failed flush only delays output.
        let _ = stdout.flush();
    }
    println!("\n");
    Ok(())
}

fn cmd_functions(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let registry = demo::registry();

    match ToolCallingConfig::from_settings(&config.execution_settings(), &registry) {
        Some(tools) => println!("{}", render_definitions(tools.tools())),
        None => println!("No functions are advertised with the configured function_choice."),
    }
    Ok(())
}

fn cmd_parse(text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    match parser::parse(&text).ok_or(Error::NoCall)? {
        ParsedCall::Call {
            call,
            response_format,
        } => {
            println!("function: {}", call.name);
            if let Some((group, name)) = call.qualifier() {
                println!("  group: {group}");
                println!("  name: {name}");
            }
            println!("arguments: {}", call.arguments.to_json());
            if let Some(template) = response_format {
                println!("response_format: {template}");
            }
        }
        ParsedCall::Respond { response_format } => {
            println!("no function requested");
            if let Some(answer) = response_format {
                println!("answer: {answer}");
            }
        }
    }
    Ok(())
}
