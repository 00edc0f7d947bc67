use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_core::room::{InterviewRoom, RoomExit};
use interview_core::session_api::{HttpSessionDirectory, load_descriptor};
use interview_realtime::types::SessionId;
use interview_room::config::{Config, EVENT_CAPACITY};
use interview_room::history::{print_assessment, print_history};
use interview_room::socket_adapter::SocketAdapter;
use interview_room::terminal::{TerminalRenderer, spawn_input};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Text interview room for the AI mock-interview backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join a session and hold the interview in the terminal
    Room {
        /// Id of a session created by the setup flow
        session_id: SessionId,
    },
    /// List past sessions, or print one of them in full
    History { session_id: Option<SessionId> },
    /// Print the overall assessment across evaluated sessions
    Assessment {
        /// Ask the backend to build a fresh assessment first
        #[arg(long)]
        generate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they never interleave with the transcript.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. API at {}", config.api_url);

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Initialize API Clients ---
    let directory = HttpSessionDirectory::new(
        &config.api_url,
        SecretString::from(config.token.expose_secret().to_string()),
    );

    match args.command {
        Command::Room { session_id } => run_room(&config, &directory, session_id).await,
        Command::History { session_id } => {
            print_history(&directory, session_id, &mut std::io::stdout()).await
        }
        Command::Assessment { generate } => {
            print_assessment(&directory, generate, &mut std::io::stdout()).await
        }
    }
}

async fn run_room(config: &Config, directory: &HttpSessionDirectory, session_id: SessionId) -> Result<()> {
    // --- 5. Load the Session ---
    let descriptor = load_descriptor(directory, session_id)
        .await
        .with_context(|| format!("Cannot open interview session {}", session_id))?;
    tracing::info!(
        "Opening session {} ({:?}, {:?})",
        descriptor.id(),
        descriptor.style(),
        descriptor.language()
    );
    let language = descriptor.language();

    // --- 6. Connect the Realtime Socket ---
    let mut adapter = SocketAdapter::connect(config.realtime_config())
        .await
        .context("Failed to connect to the interview socket")?;
    let events = adapter
        .events(EVENT_CAPACITY)
        .await
        .context("Failed to subscribe to interview events")?;

    // --- 7. Run the Room ---
    let actions = spawn_input(language);
    let room = InterviewRoom::new(descriptor, adapter).with_greeting_delay(config.greeting_delay);
    let mut renderer = TerminalRenderer::new(std::io::stdout());
    let running = room.run(events, actions, move |view| {
        if let Err(e) = renderer.render(view) {
            tracing::error!("Failed to draw the room: {}", e);
        }
    });

    let exit = tokio::select! {
        exit = running => exit,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, leaving the room...");
            RoomExit::Left
        }
    };

    match exit {
        RoomExit::Terminated => tracing::info!("Interview session {} has ended.", session_id),
        RoomExit::Left => tracing::info!("Left interview session {}.", session_id),
        RoomExit::Failed(reason) => {
            tracing::error!("Interview session {} failed: {}", session_id, reason);
            anyhow::bail!("interview session {} failed: {}", session_id, reason);
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}
