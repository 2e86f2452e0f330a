mod common;

use common::{soap, write_project};
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn version_prints_and_exits_zero() {
    let temp = tempfile::tempdir().expect("tempdir");
    soap()
        .current_dir(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("soap"));
}

#[test]
fn no_subcommand_exits_one() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path());
    soap()
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stdout(contains("No subcommand given"));
}

#[test]
fn missing_config_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    soap()
        .current_dir(temp.path())
        .arg("list")
        .assert()
        .code(1)
        .stderr(contains("no soap.toml"));
}

#[test]
fn list_shows_configured_envs() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path());
    soap()
        .current_dir(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(contains("test").and(contains("missing")));
}

#[cfg(unix)]
mod with_stub_conda {
    use super::common::{install_stub_conda, soap, write_project};
    use predicates::str::contains;

    #[test]
    fn run_prepares_then_executes() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_project(temp.path());
        let stub = install_stub_conda(temp.path());

        soap()
            .current_dir(temp.path())
            .env("MAMBA_EXE", &stub)
            .args(["run", "echo hello", "--env", "test"])
            .assert()
            .success()
            .stdout(contains("RUN: echo hello"));

        let committed = temp.path().join(".soap/test/.soap-env.yml");
        assert!(committed.exists(), "committed cache file written");
    }

    #[test]
    fn run_propagates_the_child_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_project(temp.path());
        let stub = install_stub_conda(temp.path());

        soap()
            .current_dir(temp.path())
            .env("MAMBA_EXE", &stub)
            .args(["run", "exit7", "--env", "test"])
            .assert()
            .code(7);
    }

    #[test]
    fn alias_appends_passthrough_tokens() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_project(temp.path());
        let stub = install_stub_conda(temp.path());

        soap()
            .current_dir(temp.path())
            .env("MAMBA_EXE", &stub)
            .args(["greet", "world"])
            .assert()
            .success()
            .stdout(contains("RUN: echo hello world"));
    }

    #[test]
    fn update_prepares_every_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_project(temp.path());
        let stub = install_stub_conda(temp.path());

        soap()
            .current_dir(temp.path())
            .env("MAMBA_EXE", &stub)
            .arg("update")
            .assert()
            .success()
            .stdout(contains("Updating 1 environment"));
        assert!(temp.path().join(".soap/test").is_dir());
    }
}
