//! Plain-text presentation of the donation flow.

pub mod render;
pub mod session;

pub use session::{SessionEnd, TerminalSession};
