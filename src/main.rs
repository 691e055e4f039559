use oxipulse::args::TopLevelCmd;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    let args: TopLevelCmd = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_owned()))
        .with_target(false)
        .init();

    oxipulse::run(args).await?;
    Ok(())
}
