//! Utilities Module
//!
//! Logging and configuration shared across the crate.

pub mod config;
pub mod logging;

pub use config::{get_protocol_config, DecodeLimits, ProtocolConfig, ProtocolLevel, ProtocolSettings};
