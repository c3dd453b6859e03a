pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "secourisme")]
#[command(about = "Secourisme CLI - Maintenance commands for the administration backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the first SUPER_ADMIN account")]
    CreateSuperAdmin(commands::admin::AccountArgs),

    #[command(about = "Create an ADMIN account")]
    CreateAdmin(commands::admin::AccountArgs),

    #[command(about = "Set a new password for an existing account")]
    ResetPassword(commands::admin::ResetArgs),

    #[command(about = "Create the database tables if they do not exist")]
    InitDb,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::CreateSuperAdmin(args) => {
            commands::admin::create(args, crate::database::models::Role::SuperAdmin, output_format).await
        }
        Commands::CreateAdmin(args) => {
            commands::admin::create(args, crate::database::models::Role::Admin, output_format).await
        }
        Commands::ResetPassword(args) => commands::admin::reset_password(args, output_format).await,
        Commands::InitDb => commands::db::init(output_format).await,
    }
}
