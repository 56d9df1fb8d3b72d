use std::{error::Error, net::SocketAddr};

use clap::Parser;
use msrpc::{BoundPipe, RpcClient, rpc::interface::srvsvc::SrvSvcClient};

use crate::Cli;

#[derive(Parser, Debug)]
pub struct SharesCmd {
    /// The server to query.
    pub address: SocketAddr,

    /// Server name sent in the request.
    #[arg(long)]
    pub server_name: Option<String>,
}

pub async fn shares(cmd: &SharesCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let client = RpcClient::connect(cmd.address, cli.make_client_config()).await?;
    let mut srvsvc: SrvSvcClient<BoundPipe> = client.bind_interface(cli.syntax.into()).await?;

    let server_name = cmd
        .server_name
        .clone()
        .unwrap_or_else(|| format!(r"\\{}", cmd.address.ip()));
    let shares = srvsvc.list_shares(&server_name).await?;
    log::info!("Available shares on {server_name}: ");
    for share in shares {
        if share.remark().is_empty() {
            log::info!("  - {}", share.netname());
        } else {
            log::info!("  - {} ({})", share.netname(), share.remark());
        }
    }
    Ok(())
}
