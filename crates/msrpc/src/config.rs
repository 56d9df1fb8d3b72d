use std::time::Duration;

use crate::Error;

/// The smallest fragment size a peer must accept (MS-RPCE 3.3.1.5.6).
pub const MIN_FRAG_SIZE: u16 = 1432;
pub const DEFAULT_FRAG_SIZE: u16 = 4280;

/// Server-wide settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest fragment the server sends, before negotiation.
    pub max_xmit_frag: u16,
    /// Largest fragment the server accepts, before negotiation.
    pub max_recv_frag: u16,
    /// Cap on the reassembled stub data of a single request.
    pub max_request_size: usize,
    /// Connections silent for this long are closed. `None` keeps them open.
    pub idle_timeout: Option<Duration>,
    /// Runs the calls of one connection concurrently.
    pub conc_mpx: bool,
    /// Secondary address sent in bind acks. Defaults to the listening port.
    pub port_spec: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_xmit_frag: DEFAULT_FRAG_SIZE,
            max_recv_frag: DEFAULT_FRAG_SIZE,
            max_request_size: 4 * 1024 * 1024,
            idle_timeout: None,
            conc_mpx: true,
            port_spec: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        validate_frag_sizes(self.max_xmit_frag, self.max_recv_frag)?;
        if self.max_request_size == 0 {
            return Err(Error::InvalidConfiguration(
                "max_request_size must not be zero".to_string(),
            ));
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfiguration(
                "idle_timeout must be positive; use None to disable it".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounds connecting and each transport operation.
    pub timeout: Option<Duration>,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_xmit_frag: DEFAULT_FRAG_SIZE,
            max_recv_frag: DEFAULT_FRAG_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> crate::Result<()> {
        validate_frag_sizes(self.max_xmit_frag, self.max_recv_frag)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::ZERO)
    }
}

fn validate_frag_sizes(max_xmit_frag: u16, max_recv_frag: u16) -> crate::Result<()> {
    if max_xmit_frag < MIN_FRAG_SIZE || max_recv_frag < MIN_FRAG_SIZE {
        return Err(Error::InvalidConfiguration(format!(
            "Fragment sizes must be at least {MIN_FRAG_SIZE} (got xmit {max_xmit_frag}, recv {max_recv_frag})"
        )));
    }
    Ok(())
}
