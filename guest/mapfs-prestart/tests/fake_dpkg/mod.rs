//! Shell-script stand-ins for `dpkg` and `dpkg-query`.
//!
//! State lives in a temp dir: `<name>.version` per installed package, a
//! `locked` counter of attempts still to be refused, and a `calls` log of
//! every dpkg invocation.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DPKG: &str = r#"#!/bin/sh
state="@STATE@"
echo "$*" >> "$state/calls"
n=$(cat "$state/locked" 2>/dev/null || echo 0)
if [ "$n" -gt 0 ]; then
  echo $((n - 1)) > "$state/locked"
  if [ -f "$state/lock_message" ]; then
    cat "$state/lock_message" >&2
  else
    echo "dpkg: error: dpkg status database is locked by another process" >&2
  fi
  exit 2
fi
if [ -f "$state/fail" ]; then
  cat "$state/fail" >&2
  exit 1
fi
for deb in "$@"; do
  case "$deb" in
    *.deb)
      base=$(basename "$deb" .deb)
      name=${base%%_*}
      rest=${base#*_}
      echo "${rest%_*}" > "$state/$name.version"
      echo "Setting up $name (${rest%_*}) ..."
      ;;
  esac
done
exit 0
"#;

const DPKG_QUERY: &str = r#"#!/bin/sh
state="@STATE@"
for name; do :; done
if [ -f "$state/$name.version" ]; then
  printf 'install ok installed\t%s' "$(cat "$state/$name.version")"
  exit 0
fi
echo "dpkg-query: no packages found matching $name" >&2
exit 1
"#;

/// A scripted dpkg installation in a temp dir.
pub struct FakeDpkg {
    dir: TempDir,
}

impl FakeDpkg {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().display().to_string();
        write_script(&dir.path().join("dpkg"), &DPKG.replace("@STATE@", &state));
        write_script(
            &dir.path().join("dpkg-query"),
            &DPKG_QUERY.replace("@STATE@", &state),
        );
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn dpkg(&self) -> PathBuf {
        self.dir.path().join("dpkg")
    }

    pub fn dpkg_query(&self) -> PathBuf {
        self.dir.path().join("dpkg-query")
    }

    pub fn fuse_conf(&self) -> PathBuf {
        self.dir.path().join("fuse.conf")
    }

    /// Refuse the next `attempts` installs with the lock message.
    pub fn lock_for(&self, attempts: u32) {
        fs::write(self.dir.path().join("locked"), attempts.to_string()).unwrap();
    }

    /// Like [`Self::lock_for`], refusing with `message` instead.
    pub fn lock_with(&self, attempts: u32, message: &str) {
        fs::write(self.dir.path().join("lock_message"), format!("{message}\n")).unwrap();
        self.lock_for(attempts);
    }

    /// Fail every unlocked install with `message` on stderr.
    pub fn fail_with(&self, message: &str) {
        fs::write(self.dir.path().join("fail"), format!("{message}\n")).unwrap();
    }

    pub fn set_installed(&self, name: &str, version: &str) {
        fs::write(
            self.dir.path().join(format!("{name}.version")),
            format!("{version}\n"),
        )
        .unwrap();
    }

    pub fn installed_version(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(format!("{name}.version")))
            .ok()
            .map(|v| v.trim().to_string())
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls"))
            .map(|calls| calls.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Installer configuration pointing at the fake binaries.
    pub fn config_toml(&self, extra: &str) -> String {
        format!(
            "dpkg = {dpkg:?}\ndpkg_query = {query:?}\n{extra}\n\n[fuse_conf]\npath = {conf:?}\n",
            dpkg = self.dpkg().display().to_string(),
            query = self.dpkg_query().display().to_string(),
            conf = self.fuse_conf().display().to_string(),
        )
    }
}

fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
