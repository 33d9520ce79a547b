use anyhow::Context;
use clap::{Parser, Subcommand};
use lib::bridge::{BridgeClient, StreamEvent, StreamKind};
use lib::handshake::{self, TopicCheck};
use lib::launcher::{self, BackendProcess};
use lib::model::{self, ModelId};
use lib::shell::ChatShell;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Duet CLI", long_about = None)]
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
        /// Config file path (default: DUET_CONFIG_PATH or ~/.duet/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with the backend from the terminal (interactive, streaming).
    /// Spawns the backend when none is running on the configured port.
    Chat {
        /// Config file path (default: DUET_CONFIG_PATH or ~/.duet/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Model for the primary assistant: "claude" or "gpt4o-equivalent".
        #[arg(long, value_name = "MODEL")]
        model: Option<ModelId>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("duet {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, model }) => {
            if let Err(e) = run_chat(config, model).await {
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
    lib::config::init_config(&path)?;
    println!("initialized configuration at {}", path.display());
    Ok(())
}

/// Print one streamed reply to stdout as tokens arrive. A failed dispatch
/// or a stream error becomes a printed line; the loop continues either
/// way so the user is never stuck.
async fn stream_reply(
    bridge: &BridgeClient,
    events: &mut UnboundedReceiver<StreamEvent>,
    session_id: &str,
    text: &str,
    label: Option<&str>,
) {
    use std::io::Write;

    if let Err(e) = bridge.send_message_stream(session_id, text).await {
        eprintln!("chat error: {}", e);
        return;
    }
    if let Some(label) = label {
        print!("[{}] ", label);
        let _ = std::io::stdout().flush();
    }
    while let Some(event) = events.recv().await {
        match event.kind {
            StreamKind::Token(token) => {
                print!("{}", token);
                let _ = std::io::stdout().flush();
            }
            StreamKind::Complete => {
                println!();
                return;
            }
            StreamKind::Error(message) => {
                println!();
                eprintln!("stream error: {}", message);
                return;
            }
        }
    }
    eprintln!("stream closed before completion");
}

fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    use std::io::{self, Write};

    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    model_flag: Option<ModelId>,
) -> anyhow::Result<()> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    config.backend.port = lib::config::resolve_backend_port(&config);

    // Attach to a backend already running on the port, or own one for the
    // lifetime of this chat. Readiness is polled either way.
    let mut owned_backend: Option<BackendProcess> = None;
    if !launcher::probe(&config.backend.host, config.backend.port) {
        println!("starting backend: {}", config.backend.command);
        owned_backend = Some(BackendProcess::spawn(&config.backend)?);
    }
    launcher::wait_ready(&config.backend).await?;

    let bridge = BridgeClient::connect(&lib::config::ws_url(&config))
        .await
        .context("connecting to backend bridge")?;

    let mut shell = ChatShell::new();
    let mut primary_events = bridge.subscribe(&shell.primary().session_id).await;
    let mut second_events: Option<UnboundedReceiver<StreamEvent>> = None;

    let model = model_flag.unwrap_or(config.models.default);
    match model::select_model(&bridge, &shell.primary().session_id, model).await {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("model error: {}", e),
    }

    println!("type a message; /model <name>, /clear, /close, /exit. prefix with 2: to address the second assistant.");

    loop {
        let Some(input) = read_line("> ")? else { break };
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/clear") {
            if let Err(e) = bridge.clear_conversation(&shell.primary().session_id).await {
                eprintln!("clear error: {}", e);
            } else {
                println!("conversation cleared");
            }
            continue;
        }
        if input.eq_ignore_ascii_case("/close") {
            match shell.close_second() {
                Some(session_id) => {
                    handshake::deactivate_second(&bridge, &session_id).await;
                    bridge.unsubscribe(&session_id).await;
                    second_events = None;
                    println!("second assistant closed");
                }
                None => println!("no second assistant open"),
            }
            continue;
        }
        if let Some(rest) = input.strip_prefix("/model") {
            match rest.trim().parse::<ModelId>() {
                Ok(model) => {
                    match model::select_model(&bridge, &shell.primary().session_id, model).await {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("model error: {}", e),
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
            continue;
        }

        // Messages prefixed with "2:" address the second assistant once it
        // is open.
        if let Some(rest) = input.strip_prefix("2:") {
            let text = rest.trim();
            if text.is_empty() {
                continue;
            }
            match (shell.second(), second_events.as_mut()) {
                (Some(bound), Some(events)) => {
                    let session_id = bound.session_id.clone();
                    stream_reply(&bridge, events, &session_id, text, Some("second")).await;
                }
                _ => println!("no second assistant open; send a two-topic message first"),
            }
            continue;
        }

        match handshake::check_dual_topics(&bridge, &input, shell.second_active()).await {
            TopicCheck::Dual(prompt) => {
                let answer =
                    read_line("this message looks like two topics. open a second assistant? [y/N] ")?
                        .unwrap_or_default();
                if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
                    let text = prompt.accept();
                    let session_id = shell.open_second();
                    handshake::activate_second(&bridge, &session_id).await;
                    let mut events = bridge.subscribe(&session_id).await;
                    stream_reply(&bridge, &mut events, &session_id, &text, Some("second")).await;
                    second_events = Some(events);
                } else {
                    let text = prompt.decline();
                    stream_reply(
                        &bridge,
                        &mut primary_events,
                        &shell.primary().session_id,
                        &text,
                        None,
                    )
                    .await;
                }
            }
            TopicCheck::NotDual => {
                stream_reply(
                    &bridge,
                    &mut primary_events,
                    &shell.primary().session_id,
                    &input,
                    None,
                )
                .await;
            }
        }
    }

    if let Some(session_id) = shell.close_second() {
        handshake::deactivate_second(&bridge, &session_id).await;
    }
    if let Some(mut backend) = owned_backend.take() {
        backend.stop();
    }
    Ok(())
}
