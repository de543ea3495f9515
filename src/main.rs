use salesboard::app;
use salesboard::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,sqlx=warn"))
        .init();

    let config = Config::from_env()?;

    // Start the dashboard
    app::run(config).await?;

    Ok(())
}
