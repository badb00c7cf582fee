use std::path::Path;

use assert_cmd::Command;

fn cli(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bookcat-cli").unwrap();
    cmd.current_dir(config_dir)
        .env("BOOKCAT_CONFIG_DIR", config_dir)
        .env("BOOKCAT_ENV", "local")
        .env("RUST_LOG", "warn");
    cmd
}

fn write_config(dir: &Path) {
    let config = format!(
        "[database]\nurl = \"sqlite://{}\"\n\n[reports]\ntemplates_dir = \"{}\"\n",
        dir.join("cli.db").display(),
        dir.join("templates").display()
    );
    std::fs::write(dir.join("base.toml"), config).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookcat-cli")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "migrate", "init-templates"] {
        assert!(text.contains(command), "missing {command} in help");
    }
}

#[test]
fn init_templates_writes_both_documents() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    cli(dir.path()).arg("init-templates").assert().success();

    let templates = dir.path().join("templates");
    assert!(templates.join("inventory_book.docx").is_file());
    assert!(templates.join("write_off_act.docx").is_file());
}

#[test]
fn migrate_creates_the_database() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    cli(dir.path()).arg("migrate").assert().success();
    assert!(dir.path().join("cli.db").is_file());

    // already applied
    cli(dir.path()).arg("migrate").assert().success();
}

#[test]
fn unknown_environment_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    cli(dir.path())
        .env("BOOKCAT_ENV", "moon")
        .arg("migrate")
        .assert()
        .failure();
}
