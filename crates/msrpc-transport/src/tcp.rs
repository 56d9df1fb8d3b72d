//! ncacn_ip_tcp: DCE/RPC directly over TCP.

mod transport;

pub use transport::TcpTransport;
