use std::cell::RefCell;
use std::collections::HashMap;

use bridge_cni::config::NetConf;
use bridge_cni::error::PluginError;
use bridge_cni::exec::{CommandRunner, ExecError};
use bridge_cni::ipam::{IpamDelegate, IpamResult};
use bridge_cni::types::{CmdArgs, IpConfig};

pub const PAYLOAD: &str = r#"{
    "cniVersion": "0.4.0",
    "name": "testnet",
    "type": "bridge-cni",
    "bridge": "br0",
    "bridgeCidr": "10.0.0.1/24",
    "ipam": {"type": "host-local"}
}"#;

pub fn test_conf() -> NetConf {
    NetConf::parse(PAYLOAD.as_bytes()).expect("test payload must parse")
}

pub fn test_args(ifname: &str) -> CmdArgs {
    CmdArgs {
        container_id: "test-container".to_string(),
        netns: "/var/run/netns/testns".to_string(),
        ifname: ifname.to_string(),
        args: HashMap::new(),
        path: "/opt/cni/bin".to_string(),
        stdin_data: PAYLOAD.as_bytes().to_vec(),
    }
}

pub fn alloc(address: &str, gateway: Option<&str>) -> IpConfig {
    IpConfig {
        version: Some("4".to_string()),
        interface: None,
        address: address.to_string(),
        gateway: gateway.map(str::to_string),
    }
}

/// Records every command line handed to it. Failure rules are one-shot: each
/// matches the first command line containing its needle, then is consumed, so
/// "bridge absent until created" falls out naturally.
#[derive(Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<String>>,
    fail_once_on: RefCell<Vec<String>>,
    fail_at_index: Option<usize>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_once_on(self, needle: &str) -> Self {
        self.fail_once_on.borrow_mut().push(needle.to_string());
        self
    }

    /// Fail the nth command handed to the runner, counting from zero
    pub fn fail_at_index(mut self, index: usize) -> Self {
        self.fail_at_index = Some(index);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), ExecError> {
        let line = format!("{} {}", program, args.join(" "));
        let index = {
            let mut commands = self.commands.borrow_mut();
            commands.push(line.clone());
            commands.len() - 1
        };

        let injected = ExecError::Failed {
            command: line.clone(),
            status: 1,
            stderr: "injected failure".to_string(),
        };

        if self.fail_at_index == Some(index) {
            return Err(injected);
        }

        let mut rules = self.fail_once_on.borrow_mut();
        if let Some(idx) = rules.iter().position(|needle| line.contains(needle.as_str())) {
            rules.remove(idx);
            return Err(injected);
        }

        Ok(())
    }
}

/// IPAM delegate double that records the raw payloads it was handed
pub struct FakeIpam {
    result: Result<IpamResult, String>,
    release_error: Option<String>,
    allocations: RefCell<Vec<Vec<u8>>>,
    releases: RefCell<Vec<Vec<u8>>>,
}

impl FakeIpam {
    pub fn returning(ips: Vec<IpConfig>) -> Self {
        Self {
            result: Ok(IpamResult {
                ips,
                routes: Vec::new(),
            }),
            release_error: None,
            allocations: RefCell::new(Vec::new()),
            releases: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            result: Err(msg.to_string()),
            release_error: None,
            allocations: RefCell::new(Vec::new()),
            releases: RefCell::new(Vec::new()),
        }
    }

    /// Make every release call fail with the given message
    pub fn failing_release(mut self, msg: &str) -> Self {
        self.release_error = Some(msg.to_string());
        self
    }

    pub fn allocations(&self) -> Vec<Vec<u8>> {
        self.allocations.borrow().clone()
    }

    pub fn releases(&self) -> Vec<Vec<u8>> {
        self.releases.borrow().clone()
    }
}

impl IpamDelegate for FakeIpam {
    fn allocate(&self, _plugin: &str, stdin_data: &[u8]) -> Result<IpamResult, PluginError> {
        self.allocations.borrow_mut().push(stdin_data.to_vec());
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err(msg) => Err(PluginError::AddressAllocation(msg.clone())),
        }
    }

    fn release(&self, _plugin: &str, stdin_data: &[u8]) -> Result<(), PluginError> {
        self.releases.borrow_mut().push(stdin_data.to_vec());
        match &self.release_error {
            Some(msg) => Err(PluginError::AddressAllocation(msg.clone())),
            None => Ok(()),
        }
    }
}
