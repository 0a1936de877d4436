use std::io::Write;

use phantom_repair::config::StubBodies;
use phantom_repair::{ConfigError, RepairConfig};
use pretty_assertions::assert_eq;

#[test]
fn loads_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[solver]
max_placement_attempts = 8
seed = 42

[output]
stub_bodies = "abstract"
class_version = 52

[logging]
level = "debug"
json = true
"#
    )
    .unwrap();

    let config = RepairConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.solver.max_placement_attempts, 8);
    assert_eq!(config.solver.seed, 42);
    assert!(config.solver.prune_hierarchy);
    assert_eq!(config.output.stub_bodies, StubBodies::Abstract);
    assert_eq!(config.output.class_version, 52);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert!(config.extract.trust_local_variable_tables);

    let options = config.solver.to_options();
    assert_eq!(options.max_placement_attempts, 8);
    assert_eq!(options.seed, 42);
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phantom.toml");
    let err = RepairConfig::load_from_path(&path).unwrap_err();
    match &err {
        ConfigError::Io { path: reported, .. } => {
            assert_eq!(reported, &path.display().to_string());
        }
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn malformed_toml_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[solver\nseed = 1").unwrap();
    let err = RepairConfig::load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err:?}");
}

#[test]
fn wrongly_typed_values_are_rejected() {
    let err = RepairConfig::load_from_str_with_unknown_keys("[output]\nstub_bodies = \"empty\"\n")
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to parse toml config"), "{err}");
}
