use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

pub async fn init(output_format: OutputFormat) -> anyhow::Result<()> {
    super::connect().await?;
    output_success(&output_format, "Database schema is up to date", None)
}
