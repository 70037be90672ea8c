use serde::Deserialize;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::info;

use crate::error::PluginError;
use crate::types::{IpConfig, Route};

/// Normalized IPAM delegate output. Whatever result version the delegate
/// emits, only the address and route lists matter to the attachment logic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpamResult {
    #[serde(default)]
    pub ips: Vec<IpConfig>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Address allocation delegated to an external IPAM plugin.
///
/// Allocation is the one required-success gate of an attachment; release is
/// best-effort when used as rollback.
pub trait IpamDelegate {
    fn allocate(&self, plugin: &str, stdin_data: &[u8]) -> Result<IpamResult, PluginError>;
    fn release(&self, plugin: &str, stdin_data: &[u8]) -> Result<(), PluginError>;
}

impl<T: IpamDelegate> IpamDelegate for &T {
    fn allocate(&self, plugin: &str, stdin_data: &[u8]) -> Result<IpamResult, PluginError> {
        (**self).allocate(plugin, stdin_data)
    }

    fn release(&self, plugin: &str, stdin_data: &[u8]) -> Result<(), PluginError> {
        (**self).release(plugin, stdin_data)
    }
}

/// Invokes the IPAM plugin as a subprocess, handing it the identical raw
/// stdin payload this plugin received.
#[derive(Debug)]
pub struct IpamExec {
    /// Colon-separated plugin search path (CNI_PATH)
    search_path: String,
}

impl IpamExec {
    pub fn new(search_path: &str) -> Self {
        Self {
            search_path: search_path.to_string(),
        }
    }

    fn find_plugin(&self, name: &str) -> Option<PathBuf> {
        env::split_paths(&self.search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn invoke(&self, plugin: &str, command: &str, stdin_data: &[u8]) -> Result<Vec<u8>, PluginError> {
        let path = self.find_plugin(plugin).ok_or_else(|| {
            PluginError::AddressAllocation(format!(
                "IPAM plugin {:?} not found on CNI_PATH {:?}",
                plugin, self.search_path
            ))
        })?;

        info!("{} {} (CNI_COMMAND={})", path.display(), plugin, command);

        let mut child = Command::new(&path)
            .env("CNI_COMMAND", command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PluginError::AddressAllocation(format!(
                    "failed to spawn IPAM plugin {}: {}",
                    path.display(),
                    e
                ))
            })?;

        // stdin is piped, so take() cannot fail here
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .map_err(|e| PluginError::AddressAllocation(format!("failed to write IPAM stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| PluginError::AddressAllocation(format!("failed to wait for IPAM plugin: {}", e)))?;

        if !output.status.success() {
            let msg = if output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stderr).trim().to_string()
            } else {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            };
            return Err(PluginError::AddressAllocation(format!(
                "IPAM plugin {} exited with {}: {}",
                plugin,
                output.status.code().unwrap_or(-1),
                msg
            )));
        }

        Ok(output.stdout)
    }
}

impl IpamDelegate for IpamExec {
    fn allocate(&self, plugin: &str, stdin_data: &[u8]) -> Result<IpamResult, PluginError> {
        let stdout = self.invoke(plugin, "ADD", stdin_data)?;
        serde_json::from_slice(&stdout).map_err(|e| {
            PluginError::AddressAllocation(format!("malformed result from IPAM plugin {}: {}", plugin, e))
        })
    }

    fn release(&self, plugin: &str, stdin_data: &[u8]) -> Result<(), PluginError> {
        self.invoke(plugin, "DEL", stdin_data).map(|_| ())
    }
}
