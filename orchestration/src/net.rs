//! Listener binding with port fallback.
//!
//! Local setups often leave the preferred port occupied by a previous run;
//! instead of failing startup, successive ports are tried while the address
//! is in use. Other IO errors propagate immediately.

use std::io;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Ports tried by default, the preferred one included.
pub const DEFAULT_BIND_ATTEMPTS: u16 = 10;

/// Bind `host:preferred_port`, walking up through successive ports while the
/// address is in use. Returns the listener and the port actually bound, read
/// back from the listener so a preferred port of 0 reports the OS-assigned
/// port.
pub async fn bind_with_fallback(
    host: &str,
    preferred_port: u16,
    attempts: u16,
) -> io::Result<(TcpListener, u16)> {
    let mut last_in_use: Option<io::Error> = None;
    for offset in 0..attempts {
        let Some(port) = preferred_port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                if port != preferred_port {
                    info!(preferred = preferred_port, bound, "preferred port busy, using fallback");
                }
                return Ok((listener, bound));
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                warn!(port, "port in use, trying next");
                last_in_use = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_in_use.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrInUse, "no port available in range")
    }))
}
