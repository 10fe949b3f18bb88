use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use agora::config::{Cli, Config};
use agora::db::Database;
use agora::email::smtp::SmtpMailer;
use agora::files::LocalFiles;
use agora::pipeline::Pipeline;
use agora::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    let db = Database::open(config.db_path())?;
    let files = LocalFiles::new(config.posts_path(), config.images_path())?;

    if config.smtp.mock {
        tracing::warn!("smtp.mock is set; emails are logged, not delivered");
    }
    let mailer = SmtpMailer::new(config.smtp.clone())?;

    let pipeline = Pipeline::new(
        db,
        Arc::new(mailer),
        Arc::new(files),
        config.server.public_url.clone(),
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, agora::app(state)).await?;

    Ok(())
}
