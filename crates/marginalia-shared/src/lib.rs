//! # marginalia-shared
//!
//! Records and wire protocol shared between the Marginalia server and its
//! clients.  Everything here crosses a process boundary: the structs are
//! persisted by `marginalia-store`, returned from the REST API, and carried
//! as payloads of gateway push events.

pub mod protocol;
pub mod types;

pub use protocol::{ClientFrame, ServerEvent};
pub use types::*;
