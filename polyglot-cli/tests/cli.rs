use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use polyglot_test::TestRepo;

fn polyglot(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("polyglot").unwrap();
    cmd.current_dir(cwd).env_remove("POLYGLOT_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("polyglot.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    let cwd = tempfile::tempdir().unwrap();
    polyglot(cwd.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("indepth"))
        .stdout(predicate::str::contains("recent"));
}

#[test]
fn unresolvable_path_exits_3() {
    let cwd = tempfile::tempdir().unwrap();
    polyglot(cwd.path())
        .args(["analyze", "does/not/exist", "--author", "octo"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Cannot resolve path"));
}

#[test]
fn missing_identities_is_config_error() {
    let cwd = tempfile::tempdir().unwrap();
    polyglot(cwd.path())
        .args(["analyze", "."])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("authoring.identities"));
}

#[test]
fn missing_config_file_is_config_error() {
    let cwd = tempfile::tempdir().unwrap();
    polyglot(cwd.path())
        .args(["--config", "absent.toml", "analyze", ".", "--author", "octo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn malformed_config_is_config_error() {
    let cwd = tempfile::tempdir().unwrap();
    write_config(cwd.path(), "[history]\npage_span = \"wide\"\n");
    polyglot(cwd.path())
        .args(["analyze", ".", "--author", "octo"])
        .assert()
        .code(2);
}

#[test]
fn missing_classifier_exits_3() {
    let cwd = tempfile::tempdir().unwrap();
    write_config(
        cwd.path(),
        "[classifier]\ncommand = \"polyglot-missing-classifier\"\nargs = []\n",
    );
    polyglot(cwd.path())
        .args(["analyze", ".", "--author", "octo"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("polyglot-missing-classifier"))
        .stderr(predicate::str::contains("not found on PATH"));
}

#[test]
fn invalid_repository_slug_is_rejected() {
    let cwd = tempfile::tempdir().unwrap();
    polyglot(cwd.path())
        .args(["indepth", "octo", "--repo", "not-a-slug"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected owner/name"));
}

#[cfg(unix)]
fn fake_linguist(dir: &Path, output: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-linguist");
    std::fs::write(&script, format!("#!/bin/sh\necho '{output}'\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
#[test]
fn analyze_prints_json_attribution() {
    let repo = TestRepo::single_python();
    let cwd = tempfile::tempdir().unwrap();
    let script = fake_linguist(cwd.path(), r#"{"Python": ["a.py"]}"#);
    write_config(
        cwd.path(),
        &format!(
            "[authoring]\nidentities = [\"Octo\"]\n\n[classifier]\ncommand = \"{}\"\nargs = []\n",
            script.display()
        ),
    );

    let output = polyglot(cwd.path())
        .arg("analyze")
        .arg(repo.path())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 6);
    assert_eq!(json["lines"]["Python"], 2);
    assert_eq!(json["stats"]["Python"], 6);
    assert_eq!(json["commits"], 1);
    assert_eq!(json["files"], 1);
    assert_eq!(json["missed"], 0);
}

#[cfg(unix)]
#[test]
fn analyze_prints_text_summary() {
    let repo = TestRepo::single_python();
    let cwd = tempfile::tempdir().unwrap();
    let script = fake_linguist(cwd.path(), r#"{"Python": {"size": 8, "files": ["a.py"]}}"#);
    write_config(
        cwd.path(),
        &format!("[classifier]\ncommand = \"{}\"\nargs = []\n", script.display()),
    );

    polyglot(cwd.path())
        .arg("analyze")
        .arg(repo.path())
        .args(["--author", "octo@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bytes added:   6"))
        .stdout(predicate::str::contains("Python"));
}
