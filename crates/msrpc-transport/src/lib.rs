//! Transports for connection-oriented DCE/RPC.
//!
//! A transport carries whole PDUs: [`RpcTransportRead::receive`] uses the common header's
//! `frag_length` to frame the byte stream.

#![forbid(unsafe_code)]

use std::net::SocketAddr;

use futures_core::future::BoxFuture;
use futures_util::FutureExt;

pub mod error;
pub mod tcp;

pub use error::*;
pub use tcp::TcpTransport;

/// Size of the connection-oriented common header.
pub const CO_HEADER_SIZE: usize = 16;

const FRAG_LENGTH_OFFSET: usize = 8;
const DREP_OFFSET: usize = 4;

pub trait RpcTransport: Send {
    fn connect<'a>(&'a mut self, server_address: SocketAddr) -> BoxFuture<'a, Result<()>>;

    /// Splits the transport into its read and write halves.
    fn split(self: Box<Self>) -> Result<(Box<dyn RpcTransportRead>, Box<dyn RpcTransportWrite>)>;

    fn remote_address(&self) -> Result<SocketAddr>;
}

pub trait RpcTransportWrite: Send {
    fn send_raw<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, Result<()>>;
}

pub trait RpcTransportRead: Send {
    fn receive_exact<'a>(&'a mut self, out_buf: &'a mut [u8]) -> BoxFuture<'a, Result<()>>;

    /// The largest PDU this reader accepts.
    fn max_frame_size(&self) -> usize {
        u16::MAX as usize
    }

    /// Receives one whole PDU, common header included.
    fn receive<'a>(&'a mut self) -> BoxFuture<'a, Result<Vec<u8>>> {
        async move {
            let mut header = [0u8; CO_HEADER_SIZE];
            self.receive_exact(&mut header).await?;

            let frag_length = frag_length(&header) as usize;
            if frag_length < CO_HEADER_SIZE {
                return Err(TransportError::InvalidFrame(format!(
                    "frag_length {frag_length} is shorter than the common header"
                )));
            }
            if frag_length > self.max_frame_size() {
                return Err(TransportError::InvalidFrame(format!(
                    "frag_length {frag_length} exceeds {}",
                    self.max_frame_size()
                )));
            }

            let mut pdu = vec![0u8; frag_length];
            pdu[..CO_HEADER_SIZE].copy_from_slice(&header);
            self.receive_exact(&mut pdu[CO_HEADER_SIZE..]).await?;
            log::trace!("Received PDU of {frag_length} bytes");
            Ok(pdu)
        }
        .boxed()
    }
}

/// Reads `frag_length`, in the byte order the header's data representation declares.
fn frag_length(header: &[u8; CO_HEADER_SIZE]) -> u16 {
    let bytes = [header[FRAG_LENGTH_OFFSET], header[FRAG_LENGTH_OFFSET + 1]];
    // Integer representation lives in the high nibble of the first drep byte; 1 is little-endian.
    if header[DREP_OFFSET] & 0x10 != 0 {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(drep: u8, frag_length: [u8; 2]) -> [u8; CO_HEADER_SIZE] {
        let mut header = [0u8; CO_HEADER_SIZE];
        header[0] = 5;
        header[DREP_OFFSET] = drep;
        header[FRAG_LENGTH_OFFSET..FRAG_LENGTH_OFFSET + 2].copy_from_slice(&frag_length);
        header
    }

    #[test]
    fn test_frag_length_byte_order() {
        assert_eq!(frag_length(&header(0x10, [0x48, 0x00])), 0x48);
        assert_eq!(frag_length(&header(0x00, [0x00, 0x48])), 0x48);
    }
}
