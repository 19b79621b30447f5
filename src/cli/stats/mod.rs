//! Stats command - prints cache statistics

/// Run the stats command
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let service = crate::create_service(&config).await?;

    let stats = service.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
