use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    wizardflow_cli::cli::app::run().await
}
