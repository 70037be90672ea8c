use bridge_cni::config::NetConf;
use bridge_cni::error::PluginError;

#[test]
fn parses_full_payload() {
    let payload = br#"{
        "cniVersion": "0.4.0",
        "name": "podnet",
        "type": "bridge-cni",
        "bridge": "br0",
        "bridgeCidr": "10.0.0.1/24",
        "externalIf": "eth0",
        "ipam": {"type": "host-local", "subnet": "10.0.0.0/24"},
        "dns": {"nameservers": ["10.0.0.1"], "search": ["cluster.local"]}
    }"#;

    let conf = NetConf::parse(payload).expect("payload must parse");
    assert_eq!(conf.cni_version, "0.4.0");
    assert_eq!(conf.name, "podnet");
    assert_eq!(conf.plugin_type, "bridge-cni");
    assert_eq!(conf.bridge, "br0");
    assert_eq!(conf.bridge_cidr, "10.0.0.1/24");
    assert_eq!(conf.external_if.as_deref(), Some("eth0"));
    assert_eq!(conf.ipam.ipam_type, "host-local");

    let dns = conf.dns.expect("dns block must pass through");
    assert_eq!(dns.nameservers, Some(vec!["10.0.0.1".to_string()]));
    assert_eq!(dns.search, Some(vec!["cluster.local".to_string()]));
}

#[test]
fn parses_minimal_payload() {
    let payload = br#"{"bridge": "cni0", "bridgeCidr": "172.16.0.1/16", "ipam": {"type": "static"}}"#;
    let conf = NetConf::parse(payload).expect("minimal payload must parse");
    assert_eq!(conf.bridge, "cni0");
    assert!(conf.external_if.is_none());
    assert!(conf.dns.is_none());
}

#[test]
fn ignores_runtime_extras() {
    // Runtimes inject fields like prevResult and runtimeConfig
    let payload = br#"{
        "bridge": "br0",
        "bridgeCidr": "10.0.0.1/24",
        "ipam": {"type": "host-local"},
        "runtimeConfig": {"mac": "aa:bb:cc:dd:ee:ff"},
        "prevResult": {}
    }"#;
    NetConf::parse(payload).expect("unknown fields must be ignored");
}

#[test]
fn rejects_malformed_json() {
    let err = NetConf::parse(b"{not json").expect_err("garbage must not parse");
    assert!(matches!(err, PluginError::ConfigParse(_)));
}

#[test]
fn rejects_missing_bridge() {
    let payload = br#"{"bridgeCidr": "10.0.0.1/24", "ipam": {"type": "host-local"}}"#;
    let err = NetConf::parse(payload).expect_err("missing bridge must fail");
    assert!(matches!(err, PluginError::ConfigParse(_)));
}

#[test]
fn rejects_empty_bridge_name() {
    let payload = br#"{"bridge": "", "bridgeCidr": "10.0.0.1/24", "ipam": {"type": "host-local"}}"#;
    let err = NetConf::parse(payload).expect_err("empty bridge name must fail");
    assert!(matches!(err, PluginError::ConfigParse(_)));
}

#[test]
fn rejects_invalid_cidr() {
    for cidr in ["10.0.0.1/33", "not-a-cidr", ""] {
        let payload = format!(
            r#"{{"bridge": "br0", "bridgeCidr": "{}", "ipam": {{"type": "host-local"}}}}"#,
            cidr
        );
        let err = NetConf::parse(payload.as_bytes())
            .expect_err("invalid bridgeCidr must fail");
        assert!(matches!(err, PluginError::ConfigParse(_)), "cidr {:?}", cidr);
    }
}

#[test]
fn rejects_missing_or_empty_ipam_type() {
    let missing = br#"{"bridge": "br0", "bridgeCidr": "10.0.0.1/24"}"#;
    assert!(NetConf::parse(missing).is_err());

    let empty = br#"{"bridge": "br0", "bridgeCidr": "10.0.0.1/24", "ipam": {"type": ""}}"#;
    assert!(NetConf::parse(empty).is_err());
}
