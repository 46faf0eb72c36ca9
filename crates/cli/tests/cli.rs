use assert_cmd::Command;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("dnd-schema-cli").unwrap();
    cmd.env_remove("DND_ENV").env_remove("RUST_LOG");
    cmd
}

#[test]
fn plan_json_lists_the_full_schema() {
    let output = cli().args(["plan", "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = schema
        .as_array()
        .unwrap()
        .iter()
        .map(|collection| collection["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "user_potions",
            "user_info",
            "user_npcs",
            "user_npc_notes",
            "resources_usage",
            "games"
        ]
    );

    assert_eq!(
        schema[2]["indexes"],
        serde_json::json!([
            { "keys": [["name", 1], ["user", 1]], "unique": true },
            { "keys": [["name", "text"]], "unique": false }
        ])
    );
}

#[test]
fn plan_text_is_the_default_format() {
    let output = cli().arg("plan").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 9);
    assert!(stdout.contains("create collection resources_usage"));
}

#[test]
fn unknown_environment_fails_before_connecting() {
    cli().env("DND_ENV", "qa").arg("verify").assert().failure();
}

#[test]
fn plan_works_with_a_broken_environment() {
    let output = cli()
        .env("DND_ENV", "qa")
        .env("RUST_LOG", "dnd_schema=loud")
        .arg("plan")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("create collection user_potions\n"));
}

#[test]
fn help_lists_subcommands() {
    let output = cli().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for command in ["provision", "verify", "plan"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}
