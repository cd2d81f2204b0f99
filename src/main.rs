use physcal::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting physcal");

    // Load configuration
    let config = startup::load_config()?;

    // Sweep and sync
    let summary = startup::run_sync(config).await?;
    println!("{}", summary.report());

    Ok(())
}
