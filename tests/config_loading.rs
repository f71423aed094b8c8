use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;
use tokio::time::Duration;

use farmhand::config::{ConfigFile, EngineSection, load_and_validate, parse_str};
use farmhand::errors::FarmhandError;
use farmhand::types::{MAX_INTERVAL_MINUTES, ModuleType};
use farmhand_test_utils::{AccountConfigBuilder, ConfigFileBuilder};

type TestResult = Result<(), Box<dyn Error>>;

const FULL: &str = r#"
[engine]
cooldown_secs = 2
cache_max_age_mins = 30

[paths]
status_dir = "/var/lib/farmhand/status"
action_log = "/var/log/farmhand.jsonl"

[module.farm]
cmd = "scripts/farm.sh"

[module.forestry]
cmd = "scripts/forestry.sh"
min_level = 6

[auth]
login = "scripts/login.sh"

[session]
close = "scripts/close.sh"

[account.alice]
email = "alice@example.com"
farm_interval = 5
forestry_interval = 15
smart_mode = true
cache_interval = 120

[account.bob]
email = "bob@example.com"
farm_interval = 10
enabled = false
"#;

fn validate(toml: &str) -> Result<ConfigFile, FarmhandError> {
    ConfigFile::try_from(parse_str(toml)?)
}

fn config_error(toml: &str) -> String {
    match validate(toml) {
        Err(FarmhandError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn loads_full_config_from_disk() -> TestResult {
    let mut file = NamedTempFile::new()?;
    file.write_all(FULL.as_bytes())?;

    let cfg = load_and_validate(file.path())?;

    let settings = cfg.engine.settings();
    assert_eq!(settings.cooldown, Duration::from_secs(2));
    assert_eq!(settings.cache_max_age, Duration::from_secs(30 * 60));
    assert_eq!(settings.queue_poll, Duration::from_secs(5), "unset values keep defaults");
    assert_eq!(settings.smart_poll, Duration::from_secs(30));

    assert_eq!(cfg.module(ModuleType::Forestry).map(|m| m.min_level), Some(6));
    assert!(cfg.module(ModuleType::Stalls).is_none());
    assert_eq!(cfg.auth.login.as_deref(), Some("scripts/login.sh"));
    assert_eq!(cfg.session.open, None);

    let enabled: Vec<&str> = cfg.enabled_accounts().map(|(id, _)| id).collect();
    assert_eq!(enabled, vec!["alice"]);
    assert_eq!(cfg.account_records().len(), 2, "disabled accounts still resolve");

    let alice = cfg.accounts["alice"].activation_options();
    assert_eq!(alice.intervals.farm, 5);
    assert_eq!(alice.intervals.forestry, 15);
    assert_eq!(alice.intervals.stalls, 0);
    assert!(alice.smart_mode);
    assert_eq!(alice.cache_interval_secs, 120);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_and_validate(dir.path().join("nope.toml")).expect_err("missing file");
    assert!(matches!(err, FarmhandError::IoError(_)));
}

#[test]
fn invalid_toml_is_reported() {
    assert!(matches!(validate("[account.alice"), Err(FarmhandError::TomlError(_))));
}

#[test]
fn defaults_apply_to_minimal_account() -> TestResult {
    let cfg = validate("[account.solo]\nemail = \"solo@example.com\"\nsmart_mode = true\n")?;
    let solo = &cfg.accounts["solo"];
    assert!(solo.enabled);
    assert_eq!(solo.cache_interval, 60);
    assert_eq!(solo.intervals().enabled().count(), 0);
    assert_eq!(cfg.engine, EngineSection::default());
    Ok(())
}

#[test]
fn requires_an_account() {
    let msg = config_error("[module.farm]\ncmd = \"farm.sh\"\n");
    assert!(msg.contains("[account.<id>]"), "{msg}");
}

#[test]
fn rejects_unknown_module_names() {
    let msg = config_error(
        "[module.fishing]\ncmd = \"fish.sh\"\n[account.a]\nemail = \"a@example.com\"\n",
    );
    assert!(msg.contains("fishing"), "{msg}");
}

#[test]
fn interval_module_needs_a_command() {
    let msg = config_error("[account.a]\nemail = \"a@example.com\"\nstalls_interval = 10\n");
    assert!(msg.contains("stalls"), "{msg}");

    // Disabled accounts are not checked.
    assert!(
        validate("[account.a]\nemail = \"a@example.com\"\nstalls_interval = 10\nenabled = false\n")
            .is_ok()
    );
}

#[test]
fn rejects_zero_timings_and_empty_fields() {
    let msg = config_error("[engine]\nqueue_poll_secs = 0\n[account.a]\nemail = \"a@example.com\"\n");
    assert!(msg.contains("queue_poll_secs"), "{msg}");

    let msg = config_error("[account.a]\nemail = \"a@example.com\"\ncache_interval = 0\n");
    assert!(msg.contains("cache_interval"), "{msg}");

    let msg = config_error("[account.a]\nemail = \"  \"\n");
    assert!(msg.contains("empty email"), "{msg}");

    let msg = config_error("[module.farm]\ncmd = \"\"\n[account.a]\nemail = \"a@example.com\"\n");
    assert!(msg.contains("cmd"), "{msg}");
}

#[test]
fn rejects_intervals_and_timings_that_would_overflow() {
    let msg = config_error(&format!(
        "[module.farm]\ncmd = \"farm.sh\"\n[account.a]\nemail = \"a@example.com\"\nfarm_interval = {}\n",
        u64::MAX / 30
    ));
    assert!(msg.contains("farm_interval"), "{msg}");

    // Disabled accounts are bounded too: they can still be activated by id.
    let msg = config_error(&format!(
        "[account.a]\nemail = \"a@example.com\"\nstalls_interval = {}\nenabled = false\n",
        MAX_INTERVAL_MINUTES + 1
    ));
    assert!(msg.contains("stalls_interval"), "{msg}");

    let msg = config_error(&format!(
        "[engine]\ncache_max_age_mins = {}\n[account.a]\nemail = \"a@example.com\"\n",
        i64::MAX
    ));
    assert!(msg.contains("cache_max_age_mins"), "{msg}");

    let msg = config_error(&format!(
        "[engine]\nsmart_kickoff_secs = {}\n[account.a]\nemail = \"a@example.com\"\n",
        i64::MAX
    ));
    assert!(msg.contains("smart_kickoff_secs"), "{msg}");

    // A one-week interval is still fine.
    let cfg = validate(&format!(
        "[module.farm]\ncmd = \"farm.sh\"\n[account.a]\nemail = \"a@example.com\"\nfarm_interval = {MAX_INTERVAL_MINUTES}\n"
    ));
    assert!(cfg.is_ok(), "{cfg:?}");
}

#[test]
fn builder_produces_valid_config() {
    let cfg = ConfigFileBuilder::new()
        .with_module("farm", "farm.sh")
        .with_account("alice", AccountConfigBuilder::new("alice@example.com").farm(5).build())
        .with_account(
            "bob",
            AccountConfigBuilder::new("bob@example.com").smart(30).disabled().build(),
        )
        .build();

    assert_eq!(cfg.enabled_accounts().count(), 1);
    assert!(cfg.accounts["bob"].smart_mode);
}
