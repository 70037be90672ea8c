//! Bridge CNI plugin
//!
//! This implementation provides a Rust bridge CNI plugin that:
//! - Ensures a shared Linux bridge exists on the host, addressed and up
//! - Delegates address allocation to an external IPAM plugin
//! - Creates a veth pair spanning the container and root namespaces
//! - Attaches the host end to the bridge and configures the container end

pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod ipam;
pub mod plugin;
pub mod types;

// Re-export commonly used items
pub use commands::{cmd_add, cmd_check, cmd_del, run_cni};
pub use config::NetConf;
pub use error::PluginError;
pub use plugin::BridgePlugin;
