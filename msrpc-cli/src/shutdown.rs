use std::{error::Error, net::SocketAddr};

use clap::Parser;
use msrpc::{
    BoundPipe, RpcClient,
    dtyp::status::win32,
    ndr::{NdrPtr, RpcUnicodeString},
    rpc::interface::windowsshutdown::*,
};

use crate::Cli;

/// `SHTDN_REASON_FLAG_PLANNED`
const REASON_PLANNED: u32 = 0x8000_0000;

#[derive(Parser, Debug)]
pub struct ShutdownCmd {
    /// The server to shut down.
    pub address: SocketAddr,

    /// Message shown to interactive users.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Seconds before the shutdown starts.
    #[arg(short, long, default_value_t = 30)]
    pub grace: u32,

    /// Restarts after shutting down.
    #[arg(short, long)]
    pub restart: bool,

    /// Aborts a pending shutdown instead.
    #[arg(long, conflicts_with_all = ["message", "restart"])]
    pub abort: bool,
}

pub async fn shutdown(cmd: &ShutdownCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let client = RpcClient::connect(cmd.address, cli.make_client_config()).await?;
    let mut shutdown: WindowsShutdownClient<BoundPipe> =
        client.bind_interface(cli.syntax.into()).await?;

    let return_value = if cmd.abort {
        shutdown
            .wsdr_abort_shutdown(WsdrAbortShutdownRequest::default())
            .await?
            .return_value
    } else {
        let request = WsdrInitiateShutdownRequest {
            message: cmd
                .message
                .as_deref()
                .map(RpcUnicodeString::try_from)
                .transpose()?
                .into(),
            grace_period: cmd.grace,
            shutdown_flags: ShutdownFlags::new()
                .with_force_others(true)
                .with_restart(cmd.restart),
            reason: REASON_PLANNED,
            client_hint: NdrPtr::null(),
        };
        shutdown.wsdr_initiate_shutdown(request).await?.return_value
    };

    if return_value != win32::ERROR_SUCCESS {
        return Err(format!("Server answered with error {return_value}").into());
    }
    log::info!(
        "{} on {}",
        if cmd.abort { "Shutdown aborted" } else { "Shutdown scheduled" },
        cmd.address
    );
    Ok(())
}
