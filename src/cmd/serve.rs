//! Webhook server command: `tokengate serve`.

use anyhow::Result;

use tokengate::config::TokengateConfig;
use tokengate::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &TokengateConfig,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<()> {
    let mut server = ServerConfig::from(&config.server);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(bind) = bind {
        server.bind = bind;
    }
    start_server(server).await
}
