//! Integration tests for layered configuration loading.
//!
//! These write real `.env` files into a temp directory and drive the loader
//! against them. Process-level `ROUTINELY_*` variables are not set here so the
//! tests stay independent of the invoking environment.

use std::fs;

use integrations::config::{ConfigError, ConfigLoader};
use tempfile::TempDir;

fn base_env() -> &'static str {
    concat!(
        "ROUTINELY_OPERATOR_TOKEN=file-token\n",
        // 32 zero bytes, base64
        "ROUTINELY_CRYPTO_KEY=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n",
        "ROUTINELY_STATE_SECRET=0123456789abcdef0123456789abcdef\n",
    )
}

#[test]
fn loads_from_env_file() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join(".env"), base_env()).expect("write .env");

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("config loads");

    assert_eq!(config.operator_tokens, vec!["file-token".to_string()]);
    assert_eq!(config.crypto_key.as_ref().map(|k| k.len()), Some(32));
    assert_eq!(config.profile, "local");
}

#[test]
fn profile_specific_file_overrides_base() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join(".env"),
        format!("{}ROUTINELY_API_BIND_ADDR=0.0.0.0:8080\n", base_env()),
    )
    .expect("write .env");
    fs::write(
        dir.path().join(".env.local"),
        "ROUTINELY_API_BIND_ADDR=127.0.0.1:9999\n",
    )
    .expect("write .env.local");

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("config loads");

    assert_eq!(config.api_bind_addr, "127.0.0.1:9999");
}

#[test]
fn missing_state_secret_fails_validation() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join(".env"),
        concat!(
            "ROUTINELY_OPERATOR_TOKEN=file-token\n",
            "ROUTINELY_CRYPTO_KEY=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n",
        ),
    )
    .expect("write .env");

    let result = ConfigLoader::with_base_dir(dir.path().to_path_buf()).load();
    assert!(matches!(result, Err(ConfigError::MissingStateSecret)));
}

#[test]
fn invalid_crypto_key_base64_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join(".env"),
        concat!(
            "ROUTINELY_OPERATOR_TOKEN=file-token\n",
            "ROUTINELY_CRYPTO_KEY=!!!not-base64!!!\n",
            "ROUTINELY_STATE_SECRET=0123456789abcdef0123456789abcdef\n",
        ),
    )
    .expect("write .env");

    let result = ConfigLoader::with_base_dir(dir.path().to_path_buf()).load();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidCryptoKeyBase64 { .. })
    ));
}

#[test]
fn operator_tokens_accept_comma_separated_list() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join(".env"),
        concat!(
            "ROUTINELY_OPERATOR_TOKENS=alpha, beta ,gamma\n",
            "ROUTINELY_CRYPTO_KEY=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n",
            "ROUTINELY_STATE_SECRET=0123456789abcdef0123456789abcdef\n",
        ),
    )
    .expect("write .env");

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("config loads");

    assert_eq!(
        config.operator_tokens,
        vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]
    );
}

#[test]
fn invalid_bind_addr_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join(".env"),
        format!("{}ROUTINELY_API_BIND_ADDR=not-an-addr\n", base_env()),
    )
    .expect("write .env");

    let result = ConfigLoader::with_base_dir(dir.path().to_path_buf()).load();
    assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));
}
