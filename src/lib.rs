pub mod cli;
pub mod clients;
pub mod config;
pub mod domain;
pub mod models;
pub mod parser;
pub mod services;
pub mod state;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{AuthCommands, Cli, Commands, EntryCommands, UserCommands};
pub use config::Config;
use config::GeneralConfig;
use models::EntryPatch;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    init_tracing(&config.general);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::Init) {
        if Config::create_default_if_missing()? {
            println!("✓ Config file created. Set supabase.url and supabase.anon_key, then run again.");
        } else {
            println!("config.toml already exists.");
        }
        return Ok(());
    }

    config.validate()?;
    let state = SharedState::new(config)?;

    dispatch(&state, command).await
}

fn init_tracing(general: &GeneralConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so command output stays pipeable.
    if general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn dispatch(state: &SharedState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => Ok(()),

        Commands::Auth { command } => match command {
            AuthCommands::Signup {
                email,
                password,
                full_name,
                username,
            } => cli::cmd_signup(state, &email, password, full_name, username).await,
            AuthCommands::Login { email, password } => cli::cmd_login(state, &email, password).await,
            AuthCommands::Logout => cli::cmd_logout(state).await,
            AuthCommands::Whoami => cli::cmd_whoami(state).await,
            AuthCommands::ResetPassword { email } => cli::cmd_reset_password(state, &email).await,
            AuthCommands::UpdatePassword { password } => {
                cli::cmd_update_password(state, password).await
            }
        },

        Commands::Entries { command } => match command {
            EntryCommands::List {
                method,
                company,
                from,
                to,
            } => cli::cmd_entries_list(state, method, company, from, to).await,
            EntryCommands::Show { id } => cli::cmd_entries_show(state, &id).await,
            EntryCommands::Add {
                method,
                hours,
                company,
                date,
            } => cli::cmd_entries_add(state, method, hours, company, date).await,
            EntryCommands::Update {
                id,
                method,
                hours,
                company,
                date,
            } => {
                let patch = EntryPatch {
                    method,
                    hours,
                    company,
                    entry_date: date,
                    ..EntryPatch::default()
                };
                cli::cmd_entries_update(state, &id, patch).await
            }
            EntryCommands::Delete { id } => cli::cmd_entries_delete(state, &id).await,
            EntryCommands::Totals => cli::cmd_entries_totals(state).await,
            EntryCommands::Signed { id } => cli::cmd_entries_signed(state, &id).await,
        },

        Commands::Users { command } => match command {
            UserCommands::Show { id } => cli::cmd_users_show(state, id).await,
            UserCommands::List => cli::cmd_users_list(state).await,
            UserCommands::Update {
                full_name,
                username,
            } => cli::cmd_users_update(state, full_name, username).await,
            UserCommands::Delete { id } => cli::cmd_users_delete(state, &id).await,
            UserCommands::SetAdmin { id, admin } => {
                cli::cmd_users_set_admin(state, &id, admin).await
            }
        },
    }
}
