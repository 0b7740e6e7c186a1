use clap::Parser;

use crate::app;
use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "session-gateway")]
#[command(about = "Cookie-based session gateway for the upstream identity API")]
#[command(version)]
pub struct Cli {
    #[arg(long, short, help = "Port to listen on (overrides GATEWAY_PORT/PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Upstream API base URL (overrides UPSTREAM_API_URL)")]
    pub upstream_url: Option<String>,
}

impl Cli {
    /// Environment first, flags on top.
    pub fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load(self.upstream_url.as_deref())?;

        if let Some(port) = self.port {
            config = config.with_port(port);
        }

        Ok(config)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    app::serve(config).await
}
