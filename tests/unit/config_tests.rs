use std::path::Path;
use std::time::Duration;

use focus_orchestrator::config::GlobalConfig;
use focus_orchestrator::AppError;

fn sample_toml(work_dir: &str) -> String {
    format!(
        r#"
ipc_name = "focus-test"

[engine]
runtime = "python3"
script_path = "main.py"
work_dir = '{work_dir}'
extra_args = ["--camera", "0"]

[engine.env]
MODEL_DIR = "models"

[timeouts]
max_runtime_seconds = 3600
stop_grace_seconds = 3
drain_seconds = 2

[diagnostics]
stderr_tail_lines = 5
audit_dir = '{work_dir}'
"#
    )
}

fn minimal_toml(work_dir: &str) -> String {
    format!(
        r#"
[engine]
runtime = "python3"
script_path = "main.py"
work_dir = '{work_dir}'
"#
    )
}

fn canonical(path: &Path) -> std::path::PathBuf {
    path.canonicalize().expect("canonical path")
}

#[test]
fn parses_valid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.ipc_name, "focus-test");
    assert_eq!(config.engine.runtime, "python3");
    assert_eq!(config.engine.extra_args, vec!["--camera", "0"]);
    assert_eq!(config.engine.env.get("MODEL_DIR").map(String::as_str), Some("models"));
    assert_eq!(config.engine.work_dir, canonical(temp.path()));
    assert_eq!(config.timeouts.max_runtime(), Some(Duration::from_secs(3600)));
    assert_eq!(config.timeouts.stop_grace(), Duration::from_secs(3));
    assert_eq!(config.diagnostics.stderr_tail_lines, 5);
    assert!(config.diagnostics.audit_dir.is_some());
}

#[test]
fn applies_defaults_for_optional_sections() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.ipc_name, "focus-orchestrator");
    assert!(config.engine.extra_args.is_empty());
    assert!(config.engine.env.is_empty());
    assert_eq!(config.timeouts.max_runtime(), None, "0 means unlimited");
    assert_eq!(config.timeouts.stop_grace(), Duration::from_secs(5));
    assert_eq!(config.timeouts.drain(), Duration::from_secs(5));
    assert_eq!(config.diagnostics.stderr_tail_lines, 20);
    assert!(config.diagnostics.audit_dir.is_none());
}

#[test]
fn relative_script_resolves_against_work_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.script_path(), canonical(temp.path()).join("main.py"));
}

#[test]
fn absolute_script_path_is_kept() {
    let temp = tempfile::tempdir().expect("tempdir");
    let script = temp.path().join("engine").join("run.py");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path")).replace(
        r#"script_path = "main.py""#,
        &format!("script_path = '{}'", script.display()),
    );

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.script_path(), script);
}

#[test]
fn rejects_missing_work_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("does-not-exist");
    let toml = minimal_toml(missing.to_str().expect("utf8 path"));

    let err = GlobalConfig::from_toml_str(&toml).expect_err("missing work_dir rejected");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("work_dir")));
}

#[test]
fn rejects_empty_runtime() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"))
        .replace(r#"runtime = "python3""#, r#"runtime = "  ""#);

    let err = GlobalConfig::from_toml_str(&toml).expect_err("empty runtime rejected");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("runtime")));
}

#[test]
fn rejects_zero_stop_grace() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "{}\n[timeouts]\nstop_grace_seconds = 0\n",
        minimal_toml(temp.path().to_str().expect("utf8 path"))
    );

    let err = GlobalConfig::from_toml_str(&toml).expect_err("zero grace rejected");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("stop_grace_seconds")));
}

#[test]
fn rejects_zero_drain() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "{}\n[timeouts]\ndrain_seconds = 0\n",
        minimal_toml(temp.path().to_str().expect("utf8 path"))
    );

    let err = GlobalConfig::from_toml_str(&toml).expect_err("zero drain rejected");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("drain_seconds")));
}

#[test]
fn rejects_invalid_toml() {
    let err = GlobalConfig::from_toml_str("engine = [").expect_err("invalid toml");
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn work_dir_override_replaces_root() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(first.path().to_str().expect("utf8 path"));
    let mut config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    config.override_work_dir(second.path()).expect("override");

    assert_eq!(config.engine.work_dir, canonical(second.path()));
    assert_eq!(config.script_path(), canonical(second.path()).join("main.py"));
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, minimal_toml(temp.path().to_str().expect("utf8 path")))
        .expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.engine.runtime, "python3");

    let err = GlobalConfig::load_from_path(temp.path().join("missing.toml"))
        .expect_err("missing file");
    assert!(matches!(err, AppError::Config(_)));
}
