//! CLI integration tests for the jsonapi-adapter binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("jsonapi-adapter"))
}

// Helper to create a temp document file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod lint_command {
    use super::*;

    #[test]
    fn valid_document_passes() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "valid.json",
            r#"{"data": {"type": "workItems", "attributes": {"description": "x"}}}"#,
        );

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("all passed"));
    }

    #[test]
    fn invalid_json_fails() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "broken.json", "{ not valid json");

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn missing_type_is_reported_with_its_path() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "no_type.json", r#"{"data": {"id": "1"}}"#);

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E003"))
            .stdout(predicate::str::contains("/data"));
    }

    #[test]
    fn operation_shape_errors_point_into_the_entry() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "ops.json",
            r#"{"atomic:operations": [
                {"op": "add", "data": {"type": "workItems"}},
                {"op": "remove"}
            ]}"#,
        );

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E006"))
            .stdout(predicate::str::contains("/atomic:operations[1]"));
    }

    #[test]
    fn directory_is_walked_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("valid.json"),
            r#"{"data": {"type": "workItems", "id": "1"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("nested/broken.json"), "{").unwrap();

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("2 files checked"))
            .stdout(predicate::str::contains("1 passed"));
    }

    #[test]
    fn warnings_pass_unless_strict() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "meta.json", r#"{"meta": {"note": "hi"}}"#);

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("W001"));

        cmd()
            .args(["lint", file.to_str().unwrap(), "--strict"])
            .assert()
            .code(1);
    }

    #[test]
    fn quiet_suppresses_passing_files() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "valid.json",
            r#"{"data": {"type": "workItems", "id": "1"}}"#,
        );

        cmd()
            .args(["lint", file.to_str().unwrap(), "--quiet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid.json").not());
    }

    #[test]
    fn json_output_is_machine_readable() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "no_type.json", r#"{"data": {"id": "1"}}"#);

        cmd()
            .args(["lint", file.to_str().unwrap(), "--format", "json"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""code": "E003""#))
            .stdout(predicate::str::contains(r#""severity": "error""#));
    }

    #[test]
    fn missing_path_is_an_error() {
        cmd()
            .args(["lint", "/nonexistent/documents"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("path not found"));
    }
}

mod classify_command {
    use super::*;

    #[test]
    fn classifies_each_entry() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "ops.json",
            r#"{"atomic:operations": [
                {"op": "add", "data": {"type": "workItems", "lid": "new-1"}},
                {"op": "update", "ref": {"type": "workItems", "id": "3", "relationship": "assignee"},
                 "data": {"type": "userAccounts", "id": "7"}},
                {"op": "remove", "ref": {"type": "workItems", "id": "3"}}
            ]}"#,
        );

        cmd()
            .args(["classify", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("[0] add -> create-resource"))
            .stdout(predicate::str::contains("lid=new-1"))
            .stdout(predicate::str::contains("[1] update -> set-relationship"))
            .stdout(predicate::str::contains("relationship=assignee"))
            .stdout(predicate::str::contains("[2] remove -> delete-resource"));
    }

    #[test]
    fn unclassifiable_entries_fail() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "ops.json",
            r#"{"atomic:operations": [{"op": "remove"}]}"#,
        );

        cmd()
            .args(["classify", file.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("cannot classify"))
            .stdout(predicate::str::contains("'remove' requires a 'ref' element"));
    }

    #[test]
    fn json_output_lists_entries() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "ops.json",
            r#"{"atomic:operations": [
                {"op": "add", "ref": {"type": "workItems", "id": "1", "relationship": "tags"},
                 "data": [{"type": "tags", "id": "2"}]}
            ]}"#,
        );

        cmd()
            .args(["classify", file.to_str().unwrap(), "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""kind": "add-to-relationship""#))
            .stdout(predicate::str::contains(r#""relationship": "tags""#));
    }

    #[test]
    fn non_operations_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(
            &dir,
            "single.json",
            r#"{"data": {"type": "workItems", "id": "1"}}"#,
        );

        cmd()
            .args(["classify", file.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not an operations document"));
    }

    #[test]
    fn file_not_found() {
        cmd()
            .args(["classify", "/nonexistent/ops.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Error"));
    }

    #[test]
    fn invalid_json_input() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "broken.json", "{ not valid json");

        cmd()
            .args(["classify", file.to_str().unwrap()])
            .assert()
            .code(2);
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Lint and classify JSON:API request documents",
            ));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("jsonapi-adapter"));
    }

    #[test]
    fn lint_help() {
        cmd()
            .args(["lint", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--format"))
            .stdout(predicate::str::contains("--strict"));
    }

    #[test]
    fn classify_help() {
        cmd()
            .args(["classify", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--format"));
    }
}
