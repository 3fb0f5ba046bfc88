use anyhow::Result;
use clap::Parser;
use httpload::cli::LoadCli;

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    httpload::cli::run(LoadCli::parse()).await
}
