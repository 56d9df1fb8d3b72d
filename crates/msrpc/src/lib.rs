//! MS-RPC over connection-oriented DCE/RPC (ncacn_ip_tcp).
//!
//! The server side accepts connections, negotiates presentation contexts at bind time,
//! reassembles request fragments, and runs each call through the [`ServerHandle`](msrpc_rpc::interface::ServerHandle)
//! registered for its interface, concurrently with the other calls of the connection.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use msrpc::{RpcServer, ServerConfig, rpc::interface::{ServerRegistry, windowsshutdown::*}};
//! # async fn run(server_impl: Arc<impl WindowsShutdownServer + 'static>) -> msrpc::Result<()> {
//! let mut registry = ServerRegistry::new();
//! register_windows_shutdown_server(&mut registry, server_impl)?;
//! let server = RpcServer::new(ServerConfig::default(), registry)?
//!     .bind("127.0.0.1:0")
//!     .await?;
//! server.serve().await
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod association;
pub mod client;
pub mod config;
pub mod error;
pub mod fragment;
pub mod server;

pub use client::{BoundPipe, RpcClient};
pub use config::{ClientConfig, ServerConfig};
pub use error::*;
pub use server::{ListeningServer, RpcServer, ShutdownHandle};

pub use msrpc_dtyp as dtyp;
pub use msrpc_ndr as ndr;
pub use msrpc_rpc as rpc;
pub use msrpc_transport as transport;
