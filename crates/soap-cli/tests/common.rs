#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

pub fn soap() -> Command {
    Command::cargo_bin("soap").expect("soap binary")
}

pub const ENV_YML: &str = "name: demo\nchannels:\n  - defaults\ndependencies:\n  - numpy\n";

pub const SOAP_TOML: &str = r#"
[envs]
test = { yml_path = "env.yml", install_current = false }

[aliases]
greet = { cmd = "echo hello", env = "test", passthrough_args = true }
"#;

pub fn write_project(root: &Path) {
    fs::write(root.join("soap.toml"), SOAP_TOML).expect("write soap.toml");
    fs::write(root.join("env.yml"), ENV_YML).expect("write env.yml");
}

/// A fake conda binary: `create`/`update` make the prefix directory,
/// `run` echoes the command it was asked to execute (or exits 7 when the
/// command contains `exit7`).
#[cfg(unix)]
pub fn install_stub_conda(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    const STUB: &str = r#"#!/bin/sh
op="$1"
shift
prefix=""
prev=""
for arg in "$@"; do
  case "$arg" in
    --prefix=*) prefix="${arg#--prefix=}" ;;
  esac
  if [ "$prev" = "--prefix" ]; then
    prefix="$arg"
  fi
  prev="$arg"
done
case "$op" in
  create|update)
    mkdir -p "$prefix"
    ;;
  run)
    cmd=""
    for arg in "$@"; do
      case "$arg" in
        --prefix=*|--attach=*) ;;
        *) cmd="$cmd $arg" ;;
      esac
    done
    case "$cmd" in
      *exit7*) exit 7 ;;
    esac
    echo "RUN:$cmd"
    ;;
esac
"#;

    let path = dir.join("conda-stub");
    fs::write(&path, STUB).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}
