mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn typelint() -> Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("typelint");
    cmd.env_remove("NODE_PATH").env_remove("RUST_LOG");
    cmd
}

#[test]
fn clean_file_succeeds() {
    let p = common::TestProject::new();
    typelint()
        .arg("check")
        .arg(&p.clean)
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 1 file: 0 errors, 0 warnings"));
}

#[test]
fn unresolved_import_fails_with_location() {
    let p = common::TestProject::new();
    typelint()
        .current_dir(&p.root)
        .arg("check")
        .arg(&p.broken)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("src/broken.ts:4:22: error[2307]"))
        .stdout(predicate::str::contains("'./missing'"))
        .stdout(predicate::str::contains("1 error"));
}

#[test]
fn directory_is_walked() {
    let p = common::TestProject::new();
    typelint()
        .arg("check")
        .arg(p.path("src"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Checked 3 files"));
}

#[test]
fn json_output_is_valid() {
    let p = common::TestProject::new();
    let output = typelint()
        .args(["check", "--json"])
        .arg(&p.broken)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["summary"]["files"], 1);
    assert_eq!(v["summary"]["errors"], 1);
    let report = &v["reports"][0];
    assert_eq!(report["code"], 2307);
    assert_eq!(report["category"], "error");
    assert_eq!(report["location"]["kind"], "range");
    assert_eq!(report["location"]["start_line"], 4);
    assert_eq!(report["location"]["start_col"], 21);
}

#[test]
fn ignore_code_drops_reports() {
    let p = common::TestProject::new();
    typelint()
        .args(["check", "--ignore-code", "2307"])
        .arg(&p.broken)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 errors"));
}

#[test]
fn missing_lib_dir_reports_on_file() {
    let p = common::TestProject::new();
    let lib = p.path("no-such-lib");
    typelint()
        .current_dir(&p.root)
        .args(["check", "--lib-dir"])
        .arg(&lib)
        .arg(&p.clean)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("src/clean.ts: error[6053]"))
        .stdout(predicate::str::contains("lib.es6.d.ts"));
}

#[test]
fn broken_config_is_reported_not_fatal() {
    let p = common::TestProject::new();
    common::write(&p.root, "tsconfig.json", "{ \"compilerOptions\": ");
    typelint()
        .arg("check")
        .arg(&p.clean)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("error[0]"))
        .stdout(predicate::str::contains("tsconfig.json"));
}

#[test]
fn file_outside_any_project_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(dir.path(), "loose.ts", "import './nowhere';\n");
    // A tsconfig.json in an ancestor of the temp dir would change this.
    if dir
        .path()
        .ancestors()
        .skip(1)
        .any(|a| a.join("tsconfig.json").is_file())
    {
        return;
    }
    typelint().arg("check").arg(&file).assert().success();
}

#[test]
fn no_lintable_inputs_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "notes.txt", "");
    typelint()
        .arg("check")
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn missing_paths_argument_is_usage_error() {
    typelint().arg("check").assert().code(2);
}

#[test]
fn global_path_resolves_bare_import() {
    let p = common::TestProject::new();
    let global = tempfile::tempdir().unwrap();
    common::write(global.path(), "shared/index.d.ts", "export declare const s: 1;\n");
    let user = common::write(&p.root, "src/user.ts", "import { s } from 'shared';\n");

    typelint()
        .arg("check")
        .arg(&user)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("error[2307]"));

    typelint()
        .args(["check", "--global-path"])
        .arg(global.path())
        .arg(&user)
        .assert()
        .success();
}

#[test]
fn node_path_is_a_global_path() {
    let p = common::TestProject::new();
    let global = tempfile::tempdir().unwrap();
    common::write(global.path(), "shared/index.d.ts", "export declare const s: 1;\n");
    let user = common::write(&p.root, "src/user.ts", "import { s } from 'shared';\n");
    typelint()
        .env("NODE_PATH", global.path())
        .arg("check")
        .arg(&user)
        .assert()
        .success();
}
