use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::types::Dns;

/// Network configuration read from standard input.
///
/// Immutable once parsed; lives for exactly one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConf {
    /// CNI specification version of the payload
    #[serde(rename = "cniVersion", default)]
    pub cni_version: String,
    /// Name of the network
    #[serde(default)]
    pub name: String,
    /// Type of CNI plugin
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    /// Name of the shared host bridge
    pub bridge: String,
    /// Bridge address in CIDR form; also the container subnet
    #[serde(rename = "bridgeCidr")]
    pub bridge_cidr: String,
    /// External interface name; parsed but not used by the attachment logic
    #[serde(rename = "externalIf", default)]
    pub external_if: Option<String>,
    /// IPAM delegate configuration
    pub ipam: IpamConf,
    /// DNS settings passed through into the result unchanged
    #[serde(default)]
    pub dns: Option<Dns>,
}

/// IPAM delegate selector. The delegate receives the whole raw payload, so
/// only the program name matters here; the rest stays opaque bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpamConf {
    /// Name of the IPAM plugin binary to invoke
    #[serde(rename = "type")]
    pub ipam_type: String,
}

impl NetConf {
    /// Parse and validate the stdin payload
    pub fn parse(bytes: &[u8]) -> Result<Self, PluginError> {
        let conf: NetConf = serde_json::from_slice(bytes)
            .map_err(|e| PluginError::ConfigParse(e.to_string()))?;

        if conf.bridge.is_empty() {
            return Err(PluginError::ConfigParse(
                "bridge name is required".to_string(),
            ));
        }

        conf.bridge_cidr.parse::<IpNetwork>().map_err(|e| {
            PluginError::ConfigParse(format!(
                "bridgeCidr {:?} is not a valid CIDR: {}",
                conf.bridge_cidr, e
            ))
        })?;

        if conf.ipam.ipam_type.is_empty() {
            return Err(PluginError::ConfigParse(
                "ipam type is required".to_string(),
            ));
        }

        Ok(conf)
    }
}
