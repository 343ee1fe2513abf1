use clap::Parser;
use repbatch_cli::{run, Cli};
use repbatch_configuration::environment::FixedEnvironment;
use repbatch_configuration::parse_configuration;

async fn run_args(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("repbatch").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    run(cli, FixedEnvironment::default(), &mut out).await?;
    Ok(String::from_utf8(out)?)
}

#[tokio::test]
async fn initialize_writes_the_flags_to_a_configuration_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().to_str().unwrap();

    run_args(&[
        "--db-host",
        "db.internal",
        "--db-name",
        "library",
        "--db-disable-tls",
        "initialize",
        "--out-dir",
        out_dir,
    ])
    .await
    .unwrap();

    let parsed = parse_configuration(dir.path()).await.unwrap();
    assert_eq!(parsed.database.host, "db.internal");
    assert_eq!(parsed.database.name, "library");
    assert!(parsed.database.disable_tls);
    assert!(dir.path().join("schema.json").exists());
}

#[tokio::test]
async fn print_sql_shows_the_search_without_connecting() {
    let output = run_args(&[
        "exercises",
        "--category",
        "strength",
        "--tag",
        "crossfit",
        "--page-size",
        "2",
        "--page",
        "3",
        "--print-sql",
    ])
    .await
    .unwrap();

    assert!(output.contains("@tags"), "{output}");
    assert!(!output.contains("ILIKE"), "{output}");
    assert!(output.contains("-- @category = String(\"strength\")"), "{output}");
    assert!(output.contains("-- @limit = Int(2)"), "{output}");
    assert!(output.contains("-- @offset = Int(4)"), "{output}");
}

#[tokio::test]
async fn config_schema_describes_the_database_settings() {
    let output = run_args(&["config-schema"]).await.unwrap();

    let schema: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(schema["title"], "ParsedConfiguration");
    assert!(schema["properties"]["database"].is_object());
}

#[tokio::test]
async fn a_missing_configuration_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere");

    let error = run_args(&["health", "--configuration", missing.to_str().unwrap()])
        .await
        .unwrap_err();

    assert!(error.to_string().contains("configuration.json"), "{error}");
}
