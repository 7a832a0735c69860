mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut settings = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgerdash={level},server={level}",
            level = settings.app.level
        ))
        .init();

    settings.resolve_features();
    for (name, enabled) in &settings.features {
        tracing::debug!("feature {name}: {enabled}");
    }

    let addr = settings.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return Err(err.into());
        }
    };

    server::run_with_listener(settings.server_config(), listener).await?;
    Ok(())
}
