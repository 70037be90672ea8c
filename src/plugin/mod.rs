use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::NetConf;
use crate::error::PluginError;
use crate::exec::{self, CommandRunner, ExecError, HostRunner};
use crate::ipam::{IpamDelegate, IpamExec};
use crate::types::{CmdArgs, CniResult, Interface, CNI_VERSION};

/// Container-facing address and gateway taken from the IPAM result
struct Allocation {
    address: String,
    gateway: String,
}

/// Bridge attachment plugin.
///
/// One instance per invocation. Host mutation goes through the
/// [`CommandRunner`] and address management through the [`IpamDelegate`], so
/// tests can swap both out.
pub struct BridgePlugin<R = HostRunner, I = IpamExec> {
    config: NetConf,
    args: CmdArgs,
    runner: R,
    ipam: I,
}

impl BridgePlugin {
    /// Create a plugin backed by the real host tooling
    pub fn new(config: NetConf, args: CmdArgs) -> Self {
        let ipam = IpamExec::new(&args.path);
        Self {
            config,
            args,
            runner: HostRunner,
            ipam,
        }
    }
}

impl<R: CommandRunner, I: IpamDelegate> BridgePlugin<R, I> {
    /// Create a plugin with explicit runner and IPAM implementations
    pub fn with_parts(config: NetConf, args: CmdArgs, runner: R, ipam: I) -> Self {
        Self {
            config,
            args,
            runner,
            ipam,
        }
    }

    /// Attach the container namespace to the bridge.
    ///
    /// Ensure bridge, allocate address, wire veth, compose result. Any failure
    /// after an address was actually allocated releases it (best-effort)
    /// before reporting; once the namespace is wired no compensation runs.
    pub fn add_network(&self) -> Result<CniResult, PluginError> {
        self.ensure_bridge()?;

        let ipam_result = self
            .ipam
            .allocate(&self.config.ipam.ipam_type, &self.args.stdin_data)?;

        // An empty list means nothing was reserved, so there is nothing to
        // release either.
        let first = match ipam_result.ips.first() {
            Some(ip) => ip.clone(),
            None => {
                return Err(PluginError::AddressAllocation(
                    "IPAM plugin returned no addresses".to_string(),
                ))
            }
        };

        let allocation = match self.validate_allocation(&first.address, first.gateway.as_deref()) {
            Ok(allocation) => allocation,
            Err(err) => {
                self.release_best_effort();
                return Err(err);
            }
        };

        let (host_if, container_if) = match self.wire_veth(&allocation) {
            Ok(pair) => pair,
            Err(err) => {
                self.release_best_effort();
                return Err(err);
            }
        };

        let mut result = CniResult::new(CNI_VERSION);
        result.add_interface(host_if);
        result.add_interface(container_if);
        result.ips = ipam_result.ips;
        result.routes = ipam_result.routes;
        result.dns = self.config.dns.clone();
        Ok(result)
    }

    /// Detach: release the IPAM allocation and nothing else. The veth pair
    /// dies with the namespace and the bridge outlives any one container.
    pub fn del_network(&self) -> Result<(), PluginError> {
        self.ipam
            .release(&self.config.ipam.ipam_type, &self.args.stdin_data)
    }

    /// Required by the protocol surface, intentionally unimplemented
    pub fn check_network(&self) -> Result<(), PluginError> {
        Err(PluginError::NotImplemented)
    }

    /// Make sure the bridge exists, is addressed and up.
    ///
    /// An existing link of the right name is taken as fully configured; this
    /// never re-validates its address or up-state. Address and MAC assignment
    /// failures are tolerated so that two invocations racing on first bridge
    /// setup both succeed.
    fn ensure_bridge(&self) -> Result<(), PluginError> {
        let bridge = &self.config.bridge;

        if self.ip_host(&["link", "show", bridge]).is_ok() {
            debug!("bridge {} already exists", bridge);
            return Ok(());
        }

        self.ip_host(&["link", "add", "name", bridge, "type", "bridge"])
            .map_err(|e| PluginError::BridgeCreate(e.to_string()))?;

        // Assigning the address also installs the host route for the subnet.
        if let Err(e) = self.ip_host(&["addr", "add", &self.config.bridge_cidr, "dev", bridge]) {
            warn!("tolerating bridge address assignment failure: {}", e);
        }

        let mac = exec::random_mac();
        if let Err(e) = self.ip_host(&["link", "set", "dev", bridge, "address", &mac]) {
            warn!("tolerating bridge MAC assignment failure: {}", e);
        }

        self.ip_host(&["link", "set", bridge, "up"])
            .map_err(|e| PluginError::BridgeActivation(e.to_string()))?;

        Ok(())
    }

    /// Create the veth pair inside the container namespace, move the host end
    /// into the root namespace, attach it to the bridge, and configure the
    /// container end.
    fn wire_veth(&self, allocation: &Allocation) -> Result<(Interface, Interface), PluginError> {
        let ifname = &self.args.ifname;
        let bridge = &self.config.bridge;
        let host_name = self.host_veth_name();

        self.ip_container(&["link", "add", ifname, "type", "veth", "peer", "name", &host_name])
            .map_err(|e| PluginError::VethCreate(e.to_string()))?;

        // Namespace 1 is the root namespace, by numeric identifier.
        self.ip_container(&["link", "set", &host_name, "netns", "1"])
            .map_err(|e| PluginError::NamespaceMove(e.to_string()))?;

        self.ip_host(&["link", "set", &host_name, "up"])
            .map_err(|e| PluginError::HostInterfaceActivation(e.to_string()))?;

        self.ip_host(&["link", "set", &host_name, "master", bridge])
            .map_err(|e| PluginError::BridgeAttach(e.to_string()))?;

        self.ip_container(&["link", "set", ifname, "up"])
            .map_err(|e| PluginError::ContainerInterfaceConfig(e.to_string()))?;

        // The default route references the on-link gateway, so the address
        // must be assigned first.
        self.ip_container(&["addr", "add", &allocation.address, "dev", ifname])
            .map_err(|e| PluginError::ContainerInterfaceConfig(e.to_string()))?;

        self.ip_container(&["route", "add", "default", "via", &allocation.gateway, "dev", ifname])
            .map_err(|e| PluginError::RouteInstall(e.to_string()))?;

        Ok((
            Interface {
                name: host_name,
                mac: None,
                sandbox: None,
            },
            Interface {
                name: ifname.clone(),
                mac: None,
                sandbox: Some(self.args.netns.clone()),
            },
        ))
    }

    fn validate_allocation(
        &self,
        address: &str,
        gateway: Option<&str>,
    ) -> Result<Allocation, PluginError> {
        address.parse::<IpNetwork>().map_err(|e| {
            PluginError::AddressAllocation(format!(
                "IPAM plugin returned malformed address {:?}: {}",
                address, e
            ))
        })?;

        let gateway = gateway.ok_or_else(|| {
            PluginError::AddressAllocation("IPAM plugin returned no gateway".to_string())
        })?;
        gateway.parse::<IpAddr>().map_err(|e| {
            PluginError::AddressAllocation(format!(
                "IPAM plugin returned malformed gateway {:?}: {}",
                gateway, e
            ))
        })?;

        Ok(Allocation {
            address: address.to_string(),
            gateway: gateway.to_string(),
        })
    }

    /// Disposable name for the host end. Regenerated on the off chance the
    /// caller requested a container name in the same form.
    fn host_veth_name(&self) -> String {
        loop {
            let name = format!("veth{}", exec::random_suffix(5));
            if name != self.args.ifname {
                return name;
            }
        }
    }

    fn release_best_effort(&self) {
        if let Err(e) = self
            .ipam
            .release(&self.config.ipam.ipam_type, &self.args.stdin_data)
        {
            warn!("failed to release IPAM allocation during rollback: {}", e);
        }
    }

    fn ip_host(&self, args: &[&str]) -> Result<(), ExecError> {
        self.runner.run("ip", args)
    }

    fn ip_container(&self, args: &[&str]) -> Result<(), ExecError> {
        let netns_name = self.netns_name();
        let mut full: Vec<&str> = vec!["netns", "exec", &netns_name, "ip"];
        full.extend_from_slice(args);
        self.runner.run("ip", &full)
    }

    /// `ip netns exec` takes the namespace name, not the bind-mount path
    fn netns_name(&self) -> String {
        Path::new(&self.args.netns)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.args.netns)
            .to_string()
    }
}
