//! Cleanup command - purges expired cache entries

/// Run the cleanup command
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let service = crate::create_service(&config).await?;

    let removed = service.cleanup().await?;
    println!("Removed {} expired entries", removed);

    Ok(())
}
