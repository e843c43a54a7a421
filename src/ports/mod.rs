//! Port traits for the collaborators the core talks to.

pub mod chart_port;
pub mod config_port;
pub mod trade_store_port;
