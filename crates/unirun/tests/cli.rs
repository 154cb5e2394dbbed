//! Cross-process tests driving the unirun binary
#![cfg(unix)]

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

const LINE_TIMEOUT: Duration = Duration::from_secs(10);

/// A running unirun process with its stdout lines fed through a channel
struct Running {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl Running {
    fn spawn(runtime_dir: &Path, name: &str) -> Self {
        let mut child = Command::cargo_bin("unirun")
            .unwrap()
            .args(["--runtime-dir"])
            .arg(runtime_dir)
            .args(["--name", name])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let (tx, lines) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Self { child, lines }
    }

    fn next_line(&self) -> String {
        self.lines
            .recv_timeout(LINE_TIMEOUT)
            .expect("no output line in time")
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_follower_arguments_reach_leader_process() {
    let dir = tempdir().unwrap();
    let leader = Running::spawn(dir.path(), "app-X");
    assert_eq!(leader.next_line(), "leader");

    Command::cargo_bin("unirun")
        .unwrap()
        .arg("--runtime-dir")
        .arg(dir.path())
        .args(["--name", "app-X", "--", "--file", "report.csv"])
        .assert()
        .success()
        .stdout("follower\n");

    let forwarded: Vec<String> = serde_json::from_str(&leader.next_line()).unwrap();
    assert!(forwarded.len() >= 2);
    assert_eq!(&forwarded[forwarded.len() - 2..], ["--file", "report.csv"]);
}

#[test]
fn test_other_name_gets_its_own_leader() {
    let dir = tempdir().unwrap();
    let x = Running::spawn(dir.path(), "app-X");
    assert_eq!(x.next_line(), "leader");

    let y = Running::spawn(dir.path(), "app-Y");
    assert_eq!(y.next_line(), "leader");
}

#[test]
fn test_concurrent_launches_elect_one_leader() {
    let dir = tempdir().unwrap();
    let launches: Vec<Running> = (0..6)
        .map(|_| Running::spawn(dir.path(), "app-race"))
        .collect();

    let roles: Vec<String> = launches.iter().map(|r| r.next_line()).collect();
    let leaders = roles.iter().filter(|r| r.as_str() == "leader").count();
    let followers = roles.iter().filter(|r| r.as_str() == "follower").count();
    assert_eq!(leaders, 1, "roles: {:?}", roles);
    assert_eq!(followers, launches.len() - 1);
}

#[test]
fn test_leader_exit_frees_the_scope() {
    let dir = tempdir().unwrap();
    let first = Running::spawn(dir.path(), "app-X");
    assert_eq!(first.next_line(), "leader");
    drop(first);

    let second = Running::spawn(dir.path(), "app-X");
    assert_eq!(second.next_line(), "leader");
}

#[test]
fn test_unusable_runtime_dir_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"").unwrap();

    Command::cargo_bin("unirun")
        .unwrap()
        .arg("--runtime-dir")
        .arg(&file)
        .args(["--name", "app-X"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_empty_name_fails() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("unirun")
        .unwrap()
        .arg("--runtime-dir")
        .arg(dir.path())
        .args(["--name", ""])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_config_file_supplies_name() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("unirun.toml");
    std::fs::write(&config, "unique_name = \"from-file\"\n").unwrap();

    let leader = Running::spawn(dir.path(), "from-file");
    assert_eq!(leader.next_line(), "leader");

    Command::cargo_bin("unirun")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("--runtime-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout("follower\n");
}
