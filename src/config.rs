//! Server configuration.
//!
//! [`ServerConfig`] gathers the knobs of the listener and the protocol layer.
//! Every field has a working default, so a server can be started with
//! `ServerConfig::default()` and adjusted through the `with_*` setters.

use std::time::Duration;

/// Standard NFS port.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:2049";

/// Largest RPC record accepted from a client: one maximal WRITE payload plus
/// room for the RPC and COMPOUND headers.
pub const DEFAULT_MAX_RECORD_LENGTH: usize = DEFAULT_MAX_IO_SIZE as usize + 64 * 1024;

/// How long completed transactions are remembered for retransmission detection.
pub const DEFAULT_TRANSACTION_RETENTION: Duration = Duration::from_secs(60);

/// Client lease, in seconds, reported through the `lease_time` attribute.
pub const DEFAULT_LEASE_TIME: u32 = 90;

/// Largest READ or WRITE payload, reported as `maxread` / `maxwrite`.
pub const DEFAULT_MAX_IO_SIZE: u32 = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// `ip:port` the TCP listener binds to.
    pub bind_address: String,
    /// Backing-store path exported as the NFS root ("/" exports everything).
    pub export_root: String,
    pub max_record_length: usize,
    pub transaction_retention: Duration,
    pub lease_time: u32,
    pub max_io_size: u32,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            export_root: "/".to_string(),
            max_record_length: DEFAULT_MAX_RECORD_LENGTH,
            transaction_retention: DEFAULT_TRANSACTION_RETENTION,
            lease_time: DEFAULT_LEASE_TIME,
            max_io_size: DEFAULT_MAX_IO_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn with_bind_address(mut self, bind_address: &str) -> ServerConfig {
        self.bind_address = bind_address.to_string();
        self
    }

    pub fn with_export_root(mut self, export_root: &str) -> ServerConfig {
        self.export_root = export_root.to_string();
        self
    }

    pub fn with_max_record_length(mut self, max_record_length: usize) -> ServerConfig {
        self.max_record_length = max_record_length;
        self
    }

    pub fn with_transaction_retention(mut self, retention: Duration) -> ServerConfig {
        self.transaction_retention = retention;
        self
    }

    pub fn with_lease_time(mut self, lease_time: u32) -> ServerConfig {
        self.lease_time = lease_time;
        self
    }

    pub fn with_max_io_size(mut self, max_io_size: u32) -> ServerConfig {
        self.max_io_size = max_io_size;
        self
    }
}
