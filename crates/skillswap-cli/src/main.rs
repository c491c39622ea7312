use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "skillswap")]
#[command(about = "Find people to trade skills with")]
struct Cli {
    /// Data directory (overrides SKILLSWAP_ROOT and the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and store its profile
    Signup(commands::SignupArgs),
    /// Sign in and show the stored profile
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Profile, incoming requests, followers and matching users
    Dashboard {
        #[arg(long)]
        user: String,
        /// Only users offering a skill containing this text
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Send a follow request
    Follow {
        #[arg(long)]
        user: String,
        recipient: String,
    },
    /// Accept a pending follow request
    Accept {
        #[arg(long)]
        user: String,
        sender: String,
    },
    /// Open a conversation; each stdin line is sent, EOF leaves
    Chat {
        #[arg(long)]
        user: String,
        recipient: String,
    },
    /// Print the effective configuration
    Config {
        /// Persist this directory as the data root
        #[arg(long)]
        set_root: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(root) = &cli.root {
        skillswap_common::set_skillswap_root(root);
    }
    let root = skillswap_common::init_structure()?;
    info!("Data directory: {:?}", root);

    let config = skillswap_core::AppConfig::load()?;

    match cli.command {
        Command::Config { set_root } => commands::config(&config, &root, set_root),
        command => {
            let app = skillswap_core::AppState::new(config)?;
            match command {
                Command::Signup(args) => commands::signup(&app, args).await,
                Command::Login { email, password } => commands::login(&app, &email, &password).await,
                Command::Dashboard { user, query } => commands::dashboard(&app, &user, &query).await,
                Command::Follow { user, recipient } => commands::follow(&app, &user, &recipient).await,
                Command::Accept { user, sender } => commands::accept(&app, &user, &sender).await,
                Command::Chat { user, recipient } => commands::chat(&app, &user, &recipient).await,
                Command::Config { .. } => Ok(()),
            }
        }
    }
}
