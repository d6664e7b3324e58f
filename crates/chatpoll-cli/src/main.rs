//! `chatpoll`: command-line front end for the agent chat service.

mod config;

use chatpoll_client::{
    ChatClient, ChatMessage, ClientConfig, HttpHealthProbe, HttpTransport,
    SendMessageRequest, Sender, StreamEvent, VisibilityGate,
};
use chatpoll_core::DEFAULT_AGENT_TYPE;
use clap::{Parser, Subcommand};
use config::{load_config, CliConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatpoll", about = "Poll-based agent chat client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "chatpoll.toml")]
    config: PathBuf,

    /// Server base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print whether the chat service is online
    Status,
    /// Create a session and print its id
    Create {
        #[arg(long, default_value = DEFAULT_AGENT_TYPE)]
        agent_type: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Check that a session exists
    Validate { session_id: String },
    /// Print the full message history of a session
    History { session_id: String },
    /// Send one message to a session
    Send {
        session_id: String,
        message: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Delete a session
    Delete { session_id: String },
    /// Interactive chat: stream replies and send stdin lines
    Chat {
        #[arg(long, default_value = DEFAULT_AGENT_TYPE)]
        agent_type: String,
        #[arg(long)]
        project: Option<String>,
        /// Join an existing session instead of creating one
        #[arg(long)]
        session: Option<String>,
    },
}

fn init_logging(config: &CliConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_client(config: &ClientConfig, gate: &VisibilityGate) -> ChatClient {
    ChatClient::builder(Arc::new(HttpTransport::new(config)))
        .health_probe(Arc::new(HttpHealthProbe::from_config(config)))
        .visibility(Arc::new(gate.clone()))
        .policy(config.backoff_policy())
        .build()
}

fn print_message(message: &ChatMessage) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Agent => message.agent_type.as_deref().unwrap_or("agent"),
        Sender::Other => "system",
    };
    println!(
        "[{}] {}> {}",
        message.timestamp.format("%H:%M:%S"),
        who,
        message.content
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.client.base_url = base_url;
    }
    init_logging(&config);

    let gate = VisibilityGate::new();
    let client = build_client(&config.client, &gate);

    match cli.command {
        Commands::Status => {
            println!("{}", client.get_server_status().await);
        }
        Commands::Create {
            agent_type,
            project,
        } => {
            let session = client
                .create_session(&agent_type, project.as_deref())
                .await?;
            println!("{}", session.session_id);
        }
        Commands::Validate { session_id } => {
            if !client.validate_session(&session_id).await {
                anyhow::bail!("Session '{session_id}' not found");
            }
            println!("{session_id} is valid");
        }
        Commands::History { session_id } => {
            for message in client.get_chat_history(&session_id).await? {
                print_message(&message);
            }
        }
        Commands::Send {
            session_id,
            message,
            project,
        } => {
            let mut request = SendMessageRequest::new(message);
            if let Some(project) = project {
                request = request.with_project(project);
            }
            let sent = client.send_message(&session_id, &request).await?;
            println!("{}", sent.id);
        }
        Commands::Delete { session_id } => {
            client.delete_session(&session_id).await?;
            println!("Deleted {session_id}");
        }
        Commands::Chat {
            agent_type,
            project,
            session,
        } => {
            run_chat(&client, &gate, &agent_type, project, session).await?;
        }
    }

    Ok(())
}

async fn run_chat(
    client: &ChatClient,
    gate: &VisibilityGate,
    agent_type: &str,
    project: Option<String>,
    session: Option<String>,
) -> anyhow::Result<()> {
    let (session_id, owned) = match session {
        Some(id) => {
            if !client.validate_session(&id).await {
                anyhow::bail!("Session '{id}' not found");
            }
            (id, false)
        }
        None => {
            let session = client.create_session(agent_type, project.as_deref()).await?;
            (session.session_id, true)
        }
    };

    println!("Session {session_id}. Commands: /pause, /resume, /quit");
    let mut events = client.subscribe(&session_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut session_gone = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/pause" => {
                        gate.hide();
                        println!("-- polling paused");
                    }
                    "/resume" => {
                        gate.show();
                        println!("-- polling resumed");
                    }
                    text => {
                        let mut request = SendMessageRequest::new(text);
                        if let Some(project) = &project {
                            request = request.with_project(project.clone());
                        }
                        if let Err(e) = client.send_message(&session_id, &request).await {
                            eprintln!("Send failed: {e}");
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Some(StreamEvent::Message(message)) => print_message(&message),
                Some(StreamEvent::Error(e)) if e.is_permanent() => {
                    eprintln!("Session is no longer available: {e}");
                    session_gone = true;
                    break;
                }
                Some(StreamEvent::Error(e)) => eprintln!("Poll failed: {e}"),
                None => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    client.stop_streaming(&session_id);
    if owned && !session_gone {
        match client.delete_session(&session_id).await {
            Ok(()) => info!(session_id = %session_id, "Removed session created for this chat"),
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to remove chat session"),
        }
    }
    Ok(())
}
