// tests/config_load.rs
//
// Loading the TOML config from disk with secrets taken from the environment.
// Env-mutating tests run serially.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use dao_digest::config::{AppConfig, ENV_CONFIG_PATH};
use dao_digest::http::build_client;
use dao_digest::{DigestError, Orchestrator, SourceKind};

fn write_config(content: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    f.write_all(content.as_bytes()).expect("write config");
    f
}

#[test]
#[serial]
fn env_path_override_and_env_secrets() {
    let f = write_config(
        r#"
community = "CityDAO"

[telegram]

[schedule]
daily_at = "08:15"
order = ["treasury", "proposals"]

[voting]

[treasury]
tokens = []
"#,
    );
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var("TELEGRAM_TOKEN", "123:abc");
    std::env::set_var("TELEGRAM_CHAT_ID", "-1001");

    let cfg = AppConfig::load_default().expect("config loads");
    std::env::remove_var(ENV_CONFIG_PATH);
    std::env::remove_var("TELEGRAM_TOKEN");
    std::env::remove_var("TELEGRAM_CHAT_ID");

    let tg = cfg.telegram.as_ref().expect("telegram section");
    assert_eq!(tg.token, "123:abc");
    assert_eq!(tg.chat_id, "-1001");
    assert_eq!(tg.message_limit, 4096);
    assert_eq!(cfg.schedule.order, vec![SourceKind::Treasury, SourceKind::Proposals]);
    assert_eq!(
        cfg.configured_sources(),
        vec![SourceKind::Proposals, SourceKind::Treasury]
    );

    let client = build_client(std::time::Duration::from_secs(1)).expect("client");
    let orch = Orchestrator::from_config(&cfg, client).expect("orchestrator");
    assert_eq!(orch.configured(), vec![SourceKind::Proposals, SourceKind::Treasury]);
}

#[test]
#[serial]
fn missing_secret_fails_fast() {
    let f = write_config("[calendar]\n");
    std::env::remove_var("GOOGLE_APIKEY");
    let err = AppConfig::load_from(f.path()).unwrap_err();
    assert!(matches!(err, DigestError::Configuration(_)));
    assert!(err.to_string().contains("GOOGLE_APIKEY"));
}

#[test]
#[serial]
fn schedule_naming_unconfigured_source_is_rejected() {
    let f = write_config("[schedule]\norder = [\"tweets\", \"proposals\"]\n\n[voting]\n");
    let cfg = AppConfig::load_from(f.path()).expect("config loads");
    let client = build_client(std::time::Duration::from_secs(1)).expect("client");
    let err = Orchestrator::from_config(&cfg, client).err().expect("must fail");
    assert!(matches!(err, DigestError::Configuration(_)));
    assert!(err.to_string().contains("tweets"));
}

#[test]
#[serial]
fn env_path_to_missing_file_is_an_error() {
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(matches!(res, Err(DigestError::Configuration(_))));
}

#[test]
#[serial]
fn shipped_config_parses() {
    let content = include_str!("../config/digest.toml");
    let cfg = AppConfig::parse(content, "toml").expect("shipped config parses");
    assert_eq!(cfg.schedule.order.len(), 5);
    assert!(cfg.schedule.daily_time().is_ok());
    assert_eq!(cfg.configured_sources().len(), 5);
}
