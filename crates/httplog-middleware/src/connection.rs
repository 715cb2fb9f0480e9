//! Connection metadata attached to inbound requests.
//!
//! The transport inserts a [`ConnectionInfo`] into the request extensions.
//! Requests without one, or with addresses that failed to parse, produce
//! empty address fields in the access record instead of an error.

use std::net::SocketAddr;

/// Socket addresses of the connection a request arrived on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// The client address.
    pub remote_addr: Option<SocketAddr>,
    /// The local address the request was accepted on.
    pub local_addr: Option<SocketAddr>,
}

impl ConnectionInfo {
    /// Creates connection info from known addresses.
    #[must_use]
    pub const fn new(remote_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            remote_addr: Some(remote_addr),
            local_addr: Some(local_addr),
        }
    }

    /// Parses textual `ip:port` addresses, leaving unparsable ones unset.
    #[must_use]
    pub fn parse(remote_addr: &str, local_addr: &str) -> Self {
        Self {
            remote_addr: parse_addr(remote_addr),
            local_addr: parse_addr(local_addr),
        }
    }

    /// The client IP, or an empty string when unknown.
    #[must_use]
    pub fn source_ip(&self) -> String {
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// The local IP, or an empty string when unknown.
    #[must_use]
    pub fn destination_ip(&self) -> String {
        self.local_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// The local port, if known.
    #[must_use]
    pub fn destination_port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }
}

fn parse_addr(addr: &str) -> Option<SocketAddr> {
    match addr.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            tracing::debug!(addr, error = %e, "ignoring malformed socket address");
            None
        }
    }
}
