use fga_acl::{AclError, RelationPolicy};
use fga_acl_cli::profiles::ProfilesFile;
use std::fs;
use tempfile::TempDir;

const PROFILES: &str = r#"
connections:
  default:
    endpoint: "http://localhost:8081"
  prod:
    api_url: "fga.internal:8081"
    store_id: "01HSTORE"
    model_id: "01HMODEL"
    tls:
      enabled: true
    relation_policy: wildcard
"#;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn load_explicit_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("profiles.yaml");
    fs::write(&path, PROFILES).unwrap();

    let profiles = ProfilesFile::load(Some(&path)).unwrap();
    assert_eq!(profiles.source.as_deref(), Some(path.as_path()));
    assert_eq!(profiles.names().collect::<Vec<_>>(), vec!["default", "prod"]);
}

#[test]
fn load_missing_explicit_file_fails() {
    let tmp = TempDir::new().unwrap();
    let result = ProfilesFile::load(Some(&tmp.path().join("missing.yaml")));
    assert!(matches!(result, Err(AclError::Configuration(_))));
}

#[test]
fn profile_reads_every_field() {
    let profiles = ProfilesFile::from_yaml_str(PROFILES).unwrap();
    let profile = profiles.profile_with("prod", no_env).unwrap();

    assert_eq!(profile.name, "prod");
    assert_eq!(profile.config.store_id(), Some("01HSTORE"));
    assert_eq!(profile.config.model_id(), Some("01HMODEL"));
    assert_eq!(profile.config.relation_policy, RelationPolicy::Wildcard);
    assert_eq!(
        profile.config.endpoint_uri().unwrap(),
        "https://fga.internal:8081"
    );
}

#[test]
fn profile_fills_unset_fields_from_environment() {
    let profiles = ProfilesFile::from_yaml_str(PROFILES).unwrap();
    let profile = profiles
        .profile_with("default", |key| match key {
            "OPENFGA_STORE_ID" => Some("01HENV".to_string()),
            "OPENFGA_API_URL" => Some("http://ignored:8081".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(profile.config.store_id(), Some("01HENV"));
    assert_eq!(profile.config.endpoint.as_deref(), Some("http://localhost:8081"));
}

#[test]
fn default_profile_may_come_from_environment_only() {
    let profiles = ProfilesFile::default();
    let profile = profiles
        .profile_with("default", |key| {
            (key == "OPENFGA_API_URL").then(|| "localhost:8081".to_string())
        })
        .unwrap();
    assert_eq!(profile.config.endpoint_uri().unwrap(), "http://localhost:8081");
}

#[test]
fn unknown_profile_is_rejected() {
    let profiles = ProfilesFile::from_yaml_str(PROFILES).unwrap();
    let result = profiles.profile_with("staging", no_env);
    assert!(matches!(result, Err(AclError::Configuration(msg)) if msg.contains("staging")));
}

#[test]
fn profile_without_endpoint_is_rejected() {
    let profiles = ProfilesFile::default();
    assert!(profiles.profile_with("default", no_env).is_err());
}
