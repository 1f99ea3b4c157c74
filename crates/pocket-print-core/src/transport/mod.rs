//! Transport module.
//!
//! Delivers bytes from the physical link to a session controller.

mod serial;

pub use serial::{list_ports, PortInfo, SerialTransport, DEFAULT_BAUD_RATE};
