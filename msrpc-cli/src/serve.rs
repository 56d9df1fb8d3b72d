use std::{error::Error, time::Duration};

use clap::Parser;
use msrpc::{RpcServer, ServerConfig, config::DEFAULT_FRAG_SIZE};

use crate::services;

#[derive(Parser, Debug)]
pub struct ServeCmd {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:135")]
    pub listen: String,

    /// A share to list, as `NAME[:REMARK]`. May be repeated.
    #[arg(long = "share")]
    pub shares: Vec<String>,

    /// Largest fragment sent or received.
    #[arg(long, default_value_t = DEFAULT_FRAG_SIZE)]
    pub max_frag: u16,

    /// Closes connections idle for this many seconds.
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Serves the calls of a connection one at a time.
    #[arg(long)]
    pub sequential: bool,
}

pub async fn serve(cmd: &ServeCmd) -> Result<(), Box<dyn Error>> {
    let config = ServerConfig {
        max_xmit_frag: cmd.max_frag,
        max_recv_frag: cmd.max_frag,
        idle_timeout: cmd.idle_timeout.map(Duration::from_secs),
        conc_mpx: !cmd.sequential,
        ..Default::default()
    };
    let registry = services::registry(&cmd.shares)?;
    log::debug!("Serving {} interfaces", registry.len());

    let server = RpcServer::new(config, registry)?.bind(&cmd.listen).await?;
    log::info!("Listening on {}", server.local_addr());

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, shutting down");
            shutdown.shutdown();
        }
    });
    server.serve().await?;
    Ok(())
}
