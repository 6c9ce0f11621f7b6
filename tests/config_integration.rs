//! Integration tests for configuration parsing and handling.
//!
//! These verify that `pgvigil.toml` settings flow through to the
//! analysis results: disabled rules vanish from the catalog, severity
//! overrides land on reported violations.

use pgvigil::analyze::RiskLevel;
use pgvigil::ast::stmt::{Cluster, CreateIndex, Statement};
use pgvigil::ast::{ParseOutcome, ParsedFile, RawStatement, Severity};
use pgvigil::{analyze_file, AnalyzeOptions, VigilConfig};

/// Test minimal configuration
#[test]
fn test_config_minimal() {
    let config_str = r#"
        [analyze]
        pg_version = 14
    "#;

    let config: VigilConfig = VigilConfig::from_toml(config_str).expect("Failed to parse config");
    assert_eq!(config.analyze.pg_version, 14);
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config_str = r#"
        [analyze]
        pg_version = 12
        large_table_rows = 2000000

        [rules]
        disabled = ["ban-cluster", "refresh-matview-blocks-reads"]

        [rules.severity]
        dropping-column = "critical"
        require-concurrent-index-drop = "critical"
    "#;

    let config = VigilConfig::from_toml(config_str).expect("Failed to parse config");

    assert_eq!(config.analyze.pg_version, 12);
    assert_eq!(config.analyze.large_table_rows, 2_000_000);
    assert_eq!(config.rules.disabled.len(), 2);
    assert_eq!(config.rules.severity.len(), 2);
}

/// Test loading configuration from a file on disk
#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pgvigil.toml");
    std::fs::write(&path, "[analyze]\npg_version = 13\n").expect("write config");

    let config = VigilConfig::from_file(&path).expect("load config");
    assert_eq!(config.analyze.pg_version, 13);
}

/// Missing files are an error, not a silent default
#[test]
fn test_config_missing_file_errors() {
    let result = VigilConfig::from_file("does/not/exist/pgvigil.toml");
    assert!(result.is_err());
}

/// Disabled rules produce no violations end to end
#[test]
fn test_disabled_rule_produces_no_violation() {
    let config = VigilConfig::from_toml(
        r#"
        [rules]
        disabled = ["ban-cluster"]
    "#,
    )
    .expect("parse config");

    let sql = "CLUSTER users USING idx_users_pkey;";
    let outcome = ParseOutcome::Parsed(ParsedFile::new(
        "005_cluster.sql",
        sql,
        vec![RawStatement::new(
            Statement::Cluster(Cluster {
                table: Some("users".into()),
                index: Some("idx_users_pkey".into()),
            }),
            sql,
            1,
            0,
        )],
    ));

    let catalog = config.build_catalog();
    let options = AnalyzeOptions::from_config(&config);
    let plan = analyze_file(&outcome, &catalog, &options).expect("parsed");

    assert!(plan.statements[0]
        .violations
        .iter()
        .all(|v| v.rule_id != "ban-cluster"));
    // The statement is still classified and scored; disabling a rule
    // does not make the operation safe.
    assert!(plan.statements[0].lock.blocks_writes);
    assert_eq!(plan.overall_risk, RiskLevel::Yellow);
}

/// Severity overrides land on reported violations
#[test]
fn test_severity_override_end_to_end() {
    let config = VigilConfig::from_toml(
        r#"
        [rules.severity]
        require-concurrent-index-creation = "warning"
    "#,
    )
    .expect("parse config");

    let sql = "CREATE INDEX idx_users_email ON users (email);";
    let outcome = ParseOutcome::Parsed(ParsedFile::new(
        "006_index.sql",
        sql,
        vec![RawStatement::new(
            Statement::CreateIndex(CreateIndex {
                name: Some("idx_users_email".into()),
                table: "users".into(),
                columns: vec!["email".into()],
                concurrently: false,
                unique: false,
                access_method: None,
            }),
            sql,
            1,
            0,
        )],
    ));

    let catalog = config.build_catalog();
    let options = AnalyzeOptions::from_config(&config);
    let plan = analyze_file(&outcome, &catalog, &options).expect("parsed");

    let violation = plan.statements[0]
        .violations
        .iter()
        .find(|v| v.rule_id == "require-concurrent-index-creation")
        .expect("violation present");
    assert_eq!(violation.severity, Severity::Warning);
}
