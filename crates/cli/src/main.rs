use clap::{Parser, Subcommand};
use lib::conversation::ConversationStore;
use lib::llm::ChatMessage;
use lib::relay::{ProviderKind, RelayRequest, RelayResponse};

#[derive(Parser)]
#[command(name = "sunline")]
#[command(about = "Sunline relay server and support-chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: SUNLINE_CONFIG_PATH or ~/.sunline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay server (chat page, /relay endpoints, WhatsApp webhook).
    Serve {
        /// Config file path (default: SUNLINE_CONFIG_PATH or ~/.sunline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8686)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with a provider through a running relay server (interactive).
    Chat {
        /// Config file path (default: SUNLINE_CONFIG_PATH or ~/.sunline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Provider to start with: groq or novita (default groq).
        #[arg(long, value_name = "NAME")]
        provider: Option<String>,

        /// Server base URL (default from config, e.g. http://127.0.0.1:8686).
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("sunline {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            provider,
            url,
        }) => {
            if let Err(e) = run_chat(config, provider, url).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::config::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting server on {}:{}",
        config.server.bind,
        config.server.port
    );
    lib::server::run_server(config).await
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    provider: Option<String>,
    url: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let base_url = url.unwrap_or_else(|| {
        format!(
            "http://{}:{}",
            config.server.bind.trim(),
            config.server.port
        )
    });
    let mut provider = match provider {
        Some(name) => ProviderKind::from_path(&name)
            .ok_or_else(|| anyhow::anyhow!("unknown provider: {}", name))?,
        None => ProviderKind::Groq,
    };

    println!(
        "chatting with {} (/provider to switch, /new to reset, /exit to quit)",
        provider.display_name()
    );

    let client = reqwest::Client::new();
    let mut store = ConversationStore::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "{}> ", provider)?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/new") {
            store.reset(provider);
            println!("conversation cleared for {}", provider.display_name());
            continue;
        }
        if let Some(name) = input.strip_prefix("/provider") {
            match ProviderKind::from_path(name) {
                Some(p) => {
                    provider = p;
                    println!("switched to {}", provider.display_name());
                }
                None => {
                    let names: Vec<&str> =
                        ProviderKind::ALL.iter().map(|p| p.as_str()).collect();
                    eprintln!("usage: /provider <{}>", names.join("|"));
                }
            }
            continue;
        }

        // Optimistic append; the request carries the history from before it.
        let history = store.history(provider).to_vec();
        let snapshot = store.begin(provider, input);
        match send_relay(&client, &base_url, provider, input, &history).await {
            Ok(reply) => {
                println!("< {}", reply.content.trim());
                store.commit(provider, reply);
            }
            Err(e) => {
                store.rollback(snapshot);
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}

async fn send_relay(
    client: &reqwest::Client,
    base_url: &str,
    provider: ProviderKind,
    prompt: &str,
    history: &[ChatMessage],
) -> Result<ChatMessage, String> {
    let url = format!("{}/relay/{}", base_url.trim_end_matches('/'), provider);
    let body = RelayRequest {
        prompt: Some(prompt.to_string()),
        history: Some(history.to_vec()),
    };
    let res = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !res.status().is_success() {
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(text);
        return Err(format!("{} {}", status, message));
    }
    let data: RelayResponse = res.json().await.map_err(|e| e.to_string())?;
    Ok(data.reply)
}
