//! Herald core library: Webex webhook gateway, broadcast relay, and configuration
//! used by the `herald` CLI.

pub mod config;
pub mod gateway;
pub mod init;
pub mod relay;
pub mod webex;
