mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::{
    Agent, AnthropicBackend, LlmBackend, McpToolHost, OpenAiCompatibleBackend,
    ToolHost, compose_system_prompt,
};
use tracing::info;

use config::{CONFIG_FILE, Config, Provider};
use error::Result;

const QUERY_PROMPT: &str = "\nEnter your query (or type \"exit\" to quit): ";
const FINISHED_PROMPT: &str = "\nQuery finished. Type \"exit\" to quit or press Enter to continue: ";

#[derive(Parser)]
#[command(name = "purser")]
#[command(about = "Answer queries with a language model and MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./purser.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat,
    /// Answer a single query and exit
    Ask {
        /// The query to answer
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// List configured MCP servers and their tools
    Tools,
    /// Print the system prompt sent to the model
    Prompt,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(CONFIG_FILE)?,
    };

    match cli.command {
        Some(Commands::Chat) | None => cmd_query(&config, None).await,
        Some(Commands::Ask { query }) => cmd_query(&config, Some(query.join(" "))).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
        Some(Commands::Prompt) => cmd_prompt(&config).await,
    }
}

/// Build the configured backend, then answer `query` or start the
/// interactive loop when there is none.
async fn cmd_query(config: &Config, query: Option<String>) -> Result<()> {
    let api_key = config.api_key()?;
    let provider = config.backend.provider;
    info!(?provider, model = config.model(), "using model backend");

    match provider {
        Provider::Anthropic => {
            let mut builder = AnthropicBackend::builder(api_key, config.model());
            if let Some(max_tokens) = config.backend.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
            answer(config, builder.build(), query).await
        }
        Provider::Deepseek | Provider::Openai => {
            let mut builder = OpenAiCompatibleBackend::builder(api_key, config.model());
            if let Some(url) = config
                .backend
                .base_url
                .as_deref()
                .or(provider.default_base_url())
            {
                builder = builder.base_url(url);
            }
            if let Some(max_tokens) = config.backend.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
            answer(config, builder.build(), query).await
        }
    }
}

async fn answer<B: LlmBackend>(config: &Config, backend: B, query: Option<String>) -> Result<()> {
    if query.is_none() {
        println!("purser v{}", env!("CARGO_PKG_VERSION"));
        println!("Connecting to servers...");
    }
    let host = McpToolHost::connect(config.server_configs()).await;
    let agent = Agent::new(backend, host).with_tool_timeout(config.tool_timeout());

    let outcome = match query {
        Some(query) => agent
            .process_query(&query)
            .await
            .map(|answer| println!("{answer}"))
            .map_err(Into::into),
        None => chat_loop(&agent).await,
    };

    agent.host().shutdown().await;
    outcome
}

async fn chat_loop<B: LlmBackend>(agent: &Agent<B, McpToolHost>) -> Result<()> {
    let connected = agent
        .host()
        .providers()
        .iter()
        .filter(|p| p.is_connected())
        .count();
    println!("Connected to {connected} MCP server(s).");

    loop {
        let Some(line) = read_line(QUERY_PROMPT)? else {
            break;
        };
        let query = line.trim();
        if is_exit(query) {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match agent.process_query(query).await {
            Ok(answer) => {
                println!("\nResponse: {answer}");
                match read_line(FINISHED_PROMPT)? {
                    Some(reply) if !is_exit(reply.trim()) => {}
                    _ => break,
                }
            }
            Err(e) => eprintln!("Error processing query: {e}"),
        }
    }

    println!("Exiting...");
    Ok(())
}

/// Print `prompt` and read one line. `None` on end of input.
fn read_line(prompt: &str) -> io::Result<Option<String>> {
    let mut stdout = io::stdout();
    print!("{prompt}");
    stdout.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

async fn cmd_tools(config: &Config) -> Result<()> {
    if config.servers.is_empty() {
        println!("No MCP servers configured.");
        return Ok(());
    }

    let host = McpToolHost::connect(config.server_configs()).await;
    let providers = host.providers();

    for entry in &config.servers {
        let Some(provider) = providers.iter().find(|p| p.name == entry.name) else {
            println!("{} (failed to connect)", entry.name);
            continue;
        };
        println!("{} ({})", provider.name, provider.status);
        for tool in &provider.tools {
            match &tool.description {
                Some(description) => println!("  - {}: {description}", tool.name),
                None => println!("  - {}", tool.name),
            }
        }
    }

    host.shutdown().await;
    Ok(())
}

async fn cmd_prompt(config: &Config) -> Result<()> {
    let host = McpToolHost::connect(config.server_configs()).await;
    println!("{}", compose_system_prompt(&host.providers()));
    host.shutdown().await;
    Ok(())
}
