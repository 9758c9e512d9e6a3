use motivate_me::core::{DappConfig, DappError, NetworkConfig};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

const CONTRACT: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";

fn clear_env() {
    for key in [
        DappConfig::ENV_RPC_URL,
        DappConfig::ENV_CONTRACT_ADDRESS,
        DappConfig::ENV_CHAIN_ID,
        DappConfig::ENV_ABI_PATH,
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn loads_file_and_keeps_defaults() {
    clear_env();
    let file = config_file(&format!(
        r#"
contract_address = "{CONTRACT}"

[tracker]
poll_interval_ms = 500
"#
    ));

    let cfg = DappConfig::load(Some(file.path()), None).unwrap();
    assert_eq!(cfg.network, NetworkConfig::ink_sepolia());
    assert_eq!(cfg.tracker.poll_interval_ms, 500);
    assert_eq!(cfg.tracker.max_polls, 60);
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    let file = config_file(&format!("contract_address = \"{CONTRACT}\"\n"));
    std::env::set_var(DappConfig::ENV_RPC_URL, "http://127.0.0.1:8545");
    std::env::set_var(DappConfig::ENV_CHAIN_ID, "57073");

    let cfg = DappConfig::load(Some(file.path()), None).unwrap();
    assert_eq!(cfg.network.rpc_urls, vec!["http://127.0.0.1:8545".to_string()]);
    assert_eq!(cfg.network.chain_id, 57073);
    clear_env();
}

#[test]
#[serial]
fn bad_chain_id_env_is_a_config_error() {
    clear_env();
    std::env::set_var(DappConfig::ENV_CONTRACT_ADDRESS, CONTRACT);
    std::env::set_var(DappConfig::ENV_CHAIN_ID, "ink");

    let err = DappConfig::load(None, None).unwrap_err();
    assert!(matches!(err, DappError::ConfigError(m) if m.contains("MOTIVATE_CHAIN_ID")));
    clear_env();
}

#[test]
#[serial]
fn custom_contract_fills_a_missing_address() {
    clear_env();
    assert!(DappConfig::load(None, None).is_err());

    let cfg = DappConfig::load(None, Some(CONTRACT)).unwrap();
    assert_eq!(cfg.contract_address, CONTRACT);

    let err = DappConfig::load(None, Some("not-an-address")).unwrap_err();
    assert!(matches!(err, DappError::ValidationError(_)));
}

#[test]
#[serial]
fn missing_file_is_reported() {
    clear_env();
    let err = DappConfig::load(Some(std::path::Path::new("/nonexistent/motivate.toml")), None)
        .unwrap_err();
    assert!(matches!(err, DappError::ConfigError(m) if m.contains("Failed to read")));
}
