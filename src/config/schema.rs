//! Construction options for the proxy.

use serde::{Deserialize, Serialize};

/// Default listening port for the proxy.
pub const DEFAULT_LISTEN_PORT: u16 = 8443;

/// Default capacity of the routing-event queue.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Options recognized by [`HttpReverseProxy::new`](crate::HttpReverseProxy::new).
///
/// Construction allocates the event queue but does not bind the socket;
/// binding happens in `start`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyOptions {
    /// TCP port the proxy listens on (cleartext).
    pub listen_port: u16,

    /// Capacity of the routing-event queue. Producers block when the
    /// queue is full; must be at least 1.
    pub buffer_size: usize,

    /// Dev-mode toggle: overrides the target-host header with a fixed
    /// hostname for local bring-up. Derived from `IS_DEV` at bootstrap.
    pub dev_mode: bool,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            dev_mode: false,
        }
    }
}

impl ProxyOptions {
    /// Set the listening port.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Set the event-queue capacity.
    pub fn with_buffer_size(mut self, buffer: usize) -> Self {
        self.buffer_size = buffer;
        self
    }

    /// Enable or disable dev mode.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}
