use clap::Parser;
use kaveri_admin_cli::{Cli, init_tracing, load_config, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.log_filter);
    tracing::debug!(base_url = %config.base_url, source = %config.base_url_source, "configuration loaded");
    run(cli, &config).await
}
