use anyhow::anyhow;
use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::services::users::{NewAdmin, UserService};

#[derive(Args, Debug)]
pub struct AccountArgs {
    #[arg(long)]
    pub email: String,

    /// At least 8 characters. Read from SECOURISME_PASSWORD when omitted.
    #[arg(long, env = "SECOURISME_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long = "first-name")]
    pub first_name: String,

    #[arg(long = "last-name")]
    pub last_name: String,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "SECOURISME_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// `ApiError` carries the client-facing message; keep just that on the terminal.
fn cli_error(err: ApiError) -> anyhow::Error {
    anyhow!("{}", err.message())
}

pub async fn create(args: AccountArgs, role: Role, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect().await?;
    let profile = UserService::new(pool)
        .create(
            None,
            NewAdmin {
                email: args.email,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                role: Some(role),
            },
        )
        .await
        .map_err(cli_error)?;

    output_success(
        &output_format,
        &format!("{} account created for {}", profile.role, profile.email),
        Some(json!({ "id": profile.id, "email": profile.email, "role": profile.role })),
    )
}

pub async fn reset_password(args: ResetArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect().await?;
    UserService::new(pool)
        .reset_password(&args.email, &args.password)
        .await
        .map_err(cli_error)?;

    output_success(
        &output_format,
        &format!("Password updated for {}", args.email),
        Some(json!({ "email": args.email })),
    )
}
