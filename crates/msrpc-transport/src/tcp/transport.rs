use std::{net::SocketAddr, time::Duration};

use futures_core::future::BoxFuture;
use futures_util::FutureExt;
use tokio::{
    io::{self, AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, tcp},
    select,
};

use crate::{RpcTransport, RpcTransportRead, RpcTransportWrite, error::*};

type TcpRead = tcp::OwnedReadHalf;
type TcpWrite = tcp::OwnedWriteHalf;

pub struct TcpTransport {
    reader: Option<TcpRead>,
    writer: Option<TcpWrite>,
    /// Bounds connecting, and every single read or write. Zero means no timeout.
    timeout: Duration,
    max_frame_size: usize,
}

impl TcpTransport {
    /// The endpoint mapper's well-known port.
    pub const EPMAP_PORT: u16 = 135;

    pub fn new(timeout: Duration) -> TcpTransport {
        TcpTransport {
            reader: None,
            writer: None,
            timeout,
            max_frame_size: u16::MAX as usize,
        }
    }

    /// Wraps an accepted socket.
    pub fn from_stream(socket: TcpStream, timeout: Duration) -> Result<TcpTransport> {
        socket.set_nodelay(true)?;
        let (r, w) = socket.into_split();
        Ok(TcpTransport {
            reader: Some(r),
            writer: Some(w),
            timeout,
            max_frame_size: u16::MAX as usize,
        })
    }

    /// Refuses incoming PDUs longer than `max_frame_size`.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    async fn connect_timeout(&mut self, endpoint: &SocketAddr) -> Result<TcpStream> {
        let socket = if self.timeout == Duration::ZERO {
            log::debug!("Connecting to {endpoint}.");
            TcpStream::connect(&endpoint).await?
        } else {
            log::debug!("Connecting to {endpoint} with timeout {:?}.", self.timeout);
            select! {
                res = TcpStream::connect(&endpoint) => res?,
                _ = tokio::time::sleep(self.timeout) => return Err(
                    TransportError::Timeout(self.timeout)
                ),
            }
        };

        socket.set_nodelay(true)?;
        Ok(socket)
    }

    /// Maps a TCP error to a transport error.
    /// Connection aborts, resets and unexpected EOFs are mapped to [`TransportError::NotConnected`].
    #[inline]
    fn map_tcp_error(e: io::Error) -> TransportError {
        match e.kind() {
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => {
                log::debug!("Got IO error: {e} -- peer is gone, notify NotConnected.");
                TransportError::NotConnected
            }
            _ => {
                log::error!("Got IO error: {e} -- Mapping to IO error.");
                e.into()
            }
        }
    }

    async fn with_timeout<T>(
        timeout: Duration,
        operation: impl Future<Output = io::Result<T>>,
    ) -> Result<T> {
        if timeout == Duration::ZERO {
            return operation.await.map_err(Self::map_tcp_error);
        }
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result.map_err(Self::map_tcp_error),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    #[inline]
    async fn receive_exact(&mut self, out_buf: &mut [u8]) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(TransportError::NotConnected)?;
        Self::with_timeout(self.timeout, reader.read_exact(out_buf)).await?;
        Ok(())
    }

    #[inline]
    async fn send_raw(&mut self, message: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        Self::with_timeout(self.timeout, writer.write_all(message)).await
    }

    async fn do_connect(&mut self, server_address: SocketAddr) -> Result<()> {
        if self.reader.is_some() || self.writer.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let socket = self.connect_timeout(&server_address).await?;
        let (r, w) = socket.into_split();
        self.reader = Some(r);
        self.writer = Some(w);
        Ok(())
    }
}

impl RpcTransport for TcpTransport {
    fn connect<'a>(&'a mut self, server_address: SocketAddr) -> BoxFuture<'a, Result<()>> {
        self.do_connect(server_address).boxed()
    }

    fn split(self: Box<Self>) -> Result<(Box<dyn RpcTransportRead>, Box<dyn RpcTransportWrite>)> {
        if self.reader.is_none() || self.writer.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok((
            Box::new(Self {
                reader: self.reader,
                writer: None,
                timeout: self.timeout,
                max_frame_size: self.max_frame_size,
            }),
            Box::new(Self {
                reader: None,
                writer: self.writer,
                timeout: self.timeout,
                max_frame_size: self.max_frame_size,
            }),
        ))
    }

    fn remote_address(&self) -> Result<SocketAddr> {
        match (&self.reader, &self.writer) {
            (Some(reader), _) => reader.peer_addr().map_err(Into::into),
            (None, Some(writer)) => writer.peer_addr().map_err(Into::into),
            (None, None) => Err(TransportError::NotConnected),
        }
    }
}

impl RpcTransportWrite for TcpTransport {
    fn send_raw<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        self.send_raw(buf).boxed()
    }
}

impl RpcTransportRead for TcpTransport {
    fn receive_exact<'a>(&'a mut self, out_buf: &'a mut [u8]) -> BoxFuture<'a, Result<()>> {
        self.receive_exact(out_buf).boxed()
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}
