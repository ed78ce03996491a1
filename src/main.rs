mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hrdai::config::HrdaiConfig;

#[derive(Parser)]
#[command(name = "hrdai", version, about = "Terminal client for the HrdAI memory assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the API is reachable
    Health,
    /// Validate and activate an access code
    Login {
        /// Access code, e.g. DEMO-XXXX-XXXX
        code: String,
    },
    /// Chat with the assistant
    Chat,
    /// Show the context the backend retrieves for a message
    Context {
        /// Message to compute just-in-time context for
        message: Option<String>,
    },
    /// End the current session so the backend persists it
    End {
        /// Discard the session instead of persisting it
        #[arg(long)]
        discard: bool,
    },
    /// End the current session and forget the access code
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = HrdaiConfig::load()?;

    // Log to stderr so stdout carries only the conversation.
    let filter = EnvFilter::try_new(&config.client.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli::connect(&config)?;

    let outcome = match cli.command {
        Command::Health => cli::health::health(&ctx).await,
        Command::Login { code } => cli::login::login(&ctx, &code).await,
        Command::Chat => cli::chat::chat(&ctx, &config).await,
        Command::Context { message } => cli::context::context(&ctx, message.as_deref()).await,
        Command::End { discard } => cli::session::end(&ctx, !discard).await,
        Command::Logout => cli::session::logout(&ctx).await,
    };

    // Commands that fail may still have purged the access code.
    match (outcome, ctx.confirm_saved()) {
        (Err(e), Err(save)) => {
            eprintln!("{save:#}");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}
