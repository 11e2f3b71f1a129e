//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use prep_core::api::Backend;
use prep_core::config::{self, Config};
use prep_core::logging;
use prep_core::session::Session;

mod commands;

#[derive(Parser)]
#[command(name = "prep")]
#[command(version)]
#[command(about = "Study assistant for SSC CGL preparation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Send one query and print the answer
    Ask {
        /// The query, or the subject when --action is given
        #[arg(short, long)]
        prompt: Option<String>,

        /// Quick action by number or title (see `prep actions`)
        #[arg(short, long)]
        action: Option<String>,
    },

    /// List the quick actions
    Actions,

    /// Log in with phone number and OTP
    Login {
        /// 10-digit phone number
        #[arg(long)]
        phone: String,

        /// OTP code (sends one and prompts when omitted)
        #[arg(long)]
        code: Option<String>,

        /// Log out any other device holding the session
        #[arg(long)]
        force: bool,
    },

    /// Register a new account
    Register {
        /// 10-digit phone number
        #[arg(long)]
        phone: String,

        /// Full name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: Option<String>,

        /// OTP code (sends one and prompts when omitted)
        #[arg(long)]
        code: Option<String>,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show login state
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the backend URL
    SetBackend {
        #[arg(value_name = "URL")]
        url: String,
    },
}

/// Everything a backend-facing command needs.
pub struct AppContext {
    pub config: Config,
    pub session: Session,
    pub backend: Backend,
}

impl AppContext {
    fn load() -> Result<Self> {
        let config = Config::load().context("load config")?;
        let session = Session::from_default_path();
        let backend = Backend::from_config(&config, session.clone())?;
        Ok(Self {
            config,
            session,
            backend,
        })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init(&config::paths::logs_dir()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Chat);

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetBackend { url } => commands::config::set_backend(&url),
        },
        Commands::Actions => commands::ask::list_actions(),

        Commands::Chat => commands::chat::run(&AppContext::load()?).await,
        Commands::Ask { prompt, action } => {
            commands::ask::run(&AppContext::load()?, prompt, action).await
        }
        Commands::Login { phone, code, force } => {
            commands::auth::login(&AppContext::load()?, &phone, code, force).await
        }
        Commands::Register {
            phone,
            name,
            email,
            code,
        } => {
            let registration = prep_core::api::auth::Registration {
                phone_number: phone,
                name,
                email,
            };
            commands::auth::register(&AppContext::load()?, registration, code).await
        }
        Commands::Logout => commands::auth::logout(&AppContext::load()?).await,
        Commands::Status => {
            commands::auth::status(&AppContext::load()?);
            Ok(())
        }
    }
}
