//! Session-stored models.

pub mod session;

pub use session::{SessionIdentity, keys as session_keys};
