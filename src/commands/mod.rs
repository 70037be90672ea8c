use std::collections::HashMap;
use std::env;
use std::io::{self, Read};

use crate::config::NetConf;
use crate::error::PluginError;
use crate::plugin::BridgePlugin;
use crate::types::{CmdArgs, CNI_VERSION};

fn required_env(name: &'static str) -> Result<String, PluginError> {
    env::var(name).map_err(|_| PluginError::InvalidEnvironment(name))
}

/// Collect the CNI_* environment and the stdin payload
pub fn parse_args() -> Result<CmdArgs, PluginError> {
    let container_id = required_env("CNI_CONTAINERID")?;
    let ifname = required_env("CNI_IFNAME")?;
    let path = required_env("CNI_PATH")?;

    // DEL may legitimately arrive without a namespace; ADD/CHECK validate it
    let netns = env::var("CNI_NETNS").unwrap_or_default();

    let args = parse_cni_args(&env::var("CNI_ARGS").unwrap_or_default());

    let mut stdin_data = Vec::new();
    io::stdin().read_to_end(&mut stdin_data)?;

    Ok(CmdArgs {
        container_id,
        netns,
        ifname,
        args,
        path,
        stdin_data,
    })
}

/// Parse CNI_ARGS string into key-value pairs
fn parse_cni_args(args_str: &str) -> HashMap<String, String> {
    let mut args = HashMap::new();

    if !args_str.is_empty() {
        for pair in args_str.split(';') {
            if let Some(idx) = pair.find('=') {
                args.insert(pair[..idx].to_string(), pair[idx + 1..].to_string());
            }
        }
    }

    args
}

/// ADD and CHECK operate on the container namespace, so the reference must
/// be present; DEL gets by without one.
pub fn require_netns(args: &CmdArgs) -> Result<(), PluginError> {
    if args.netns.is_empty() {
        return Err(PluginError::InvalidEnvironment("CNI_NETNS"));
    }
    Ok(())
}

/// Execute the add command
pub fn cmd_add() -> Result<(), PluginError> {
    let args = parse_args()?;
    require_netns(&args)?;

    let conf = NetConf::parse(&args.stdin_data)?;
    let plugin = BridgePlugin::new(conf, args);
    let result = plugin.add_network()?;

    result.print().map_err(|e| {
        PluginError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
    })?;

    Ok(())
}

/// Execute the delete command
pub fn cmd_del() -> Result<(), PluginError> {
    let args = parse_args()?;
    let conf = NetConf::parse(&args.stdin_data)?;
    let plugin = BridgePlugin::new(conf, args);
    plugin.del_network()
}

/// Execute the check command
pub fn cmd_check() -> Result<(), PluginError> {
    let args = parse_args()?;
    require_netns(&args)?;

    let conf = NetConf::parse(&args.stdin_data)?;
    let plugin = BridgePlugin::new(conf, args);
    plugin.check_network()
}

/// Main entry point for the CNI plugin
pub fn run_cni() -> Result<(), PluginError> {
    let cmd = required_env("CNI_COMMAND")?;

    match cmd.as_str() {
        "ADD" => cmd_add(),
        "DEL" => cmd_del(),
        "CHECK" => cmd_check(),
        "VERSION" => {
            println!(
                r#"{{"cniVersion":"{}","supportedVersions":["0.1.0","0.2.0","0.3.0","0.3.1","0.4.0"]}}"#,
                CNI_VERSION
            );
            Ok(())
        }
        other => Err(PluginError::UnknownCommand(other.to_string())),
    }
}
