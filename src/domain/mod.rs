//! Domain types for the donation payment flow and the port to the remote API.

pub mod confirmation;
pub mod intent;
pub mod ports;
