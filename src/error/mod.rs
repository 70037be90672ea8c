use thiserror::Error;

/// Failure taxonomy for a single plugin invocation.
///
/// Every variant is terminal to the invocation; nothing is retried internally.
/// The only swallowed failures (bridge address and bridge MAC assignment) never
/// surface here, they are logged and ignored to tolerate concurrent bridge setup.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("required environment variable {0} is not set")]
    InvalidEnvironment(&'static str),

    #[error("failed to read plugin input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse network config: {0}")]
    ConfigParse(String),

    #[error("failed to create bridge: {0}")]
    BridgeCreate(String),

    #[error("failed to bring bridge up: {0}")]
    BridgeActivation(String),

    #[error("IPAM delegate failed: {0}")]
    AddressAllocation(String),

    #[error("failed to create veth pair in container: {0}")]
    VethCreate(String),

    #[error("failed to move host end of veth pair to root namespace: {0}")]
    NamespaceMove(String),

    #[error("failed to bring host end of veth pair up: {0}")]
    HostInterfaceActivation(String),

    #[error("failed to attach host end of veth pair to bridge: {0}")]
    BridgeAttach(String),

    #[error("failed to configure container interface: {0}")]
    ContainerInterfaceConfig(String),

    #[error("failed to install default route in container: {0}")]
    RouteInstall(String),

    #[error("CHECK is not implemented")]
    NotImplemented,

    #[error("unknown CNI command: {0}")]
    UnknownCommand(String),
}

impl PluginError {
    /// CNI error code for the on-wire error document. Codes below 100 are the
    /// well-known codes from the CNI spec; 100 and up are plugin-specific.
    pub fn code(&self) -> u32 {
        match self {
            PluginError::InvalidEnvironment(_) | PluginError::UnknownCommand(_) => 4,
            PluginError::Io(_) => 5,
            PluginError::ConfigParse(_) => 6,
            PluginError::NotImplemented => 100,
            PluginError::BridgeCreate(_) => 101,
            PluginError::BridgeActivation(_) => 102,
            PluginError::AddressAllocation(_) => 103,
            PluginError::VethCreate(_) => 104,
            PluginError::NamespaceMove(_) => 105,
            PluginError::HostInterfaceActivation(_) => 106,
            PluginError::BridgeAttach(_) => 107,
            PluginError::ContainerInterfaceConfig(_) => 108,
            PluginError::RouteInstall(_) => 109,
        }
    }
}
