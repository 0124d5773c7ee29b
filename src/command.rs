// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the command gateway.
//!
//! All interaction with the daemon's tooling (`rndc`,
//! `named-checkconf`, `dnssec-keygen`, `dnssec-signzone`, `dig`) goes
//! through the [`CommandRunner`] trait. The concrete [`ShellRunner`]
//! executes either directly on the host or via
//! `<runtime> exec <container>` when the deployment marker file exists.
//! [`PathMapper`] translates host paths into the fixed in-container
//! layout for arguments the daemon interprets itself.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::settings::Settings;

/// Timeout for status and reload calls.
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for key generation, signing, and installation.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(300);

/// The captured result of an external command.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The stderr if non-empty, otherwise the stdout. External tools
    /// are inconsistent about which stream carries the diagnosis.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Errors from running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    EmptyCommand,
    Spawn(String),
    TimedOut(Duration),
    Io(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyCommand => f.write_str("no command was given"),
            Self::Spawn(e) => write!(f, "failed to start the command: {e}"),
            Self::TimedOut(limit) => {
                write!(f, "the command did not finish within {} s", limit.as_secs())
            }
            Self::Io(e) => write!(f, "I/O error while running the command: {e}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// The capability to run external commands.
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, CommandError>;
}

/// Whether commands run directly on the host or inside the daemon's
/// container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecMode {
    Host,
    Container { runtime: String, name: String },
}

impl ExecMode {
    /// Detects the deployment mode: container mode is active exactly
    /// when the marker file exists.
    pub fn detect(settings: &Settings) -> Self {
        if settings.marker_path.exists() {
            Self::Container {
                runtime: settings.container_runtime.clone(),
                name: settings.container_name.clone(),
            }
        } else {
            Self::Host
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container { .. })
    }
}

/// Runs commands with [`std::process::Command`], prefixing
/// `<runtime> exec <container>` in container mode.
pub struct ShellRunner {
    mode: ExecMode,
}

impl ShellRunner {
    pub fn new(mode: ExecMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &ExecMode {
        &self.mode
    }

    fn build(&self, argv: &[String]) -> Command {
        match &self.mode {
            ExecMode::Host => {
                let mut cmd = Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                cmd
            }
            ExecMode::Container { runtime, name } => {
                let mut cmd = Command::new(runtime);
                cmd.arg("exec").arg(name).args(argv);
                cmd
            }
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput, CommandError> {
        if argv.is_empty() {
            return Err(CommandError::EmptyCommand);
        }
        debug!("Running {:?} (timeout {} s).", argv, timeout.as_secs());

        let mut cmd = self.build(argv);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::Spawn(e.to_string()))?;

        wait_with_timeout(&mut child, timeout)?;

        let output = child
            .wait_with_output()
            .map_err(|e| CommandError::Io(e.to_string()))?;
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Polls the child until it exits or the timeout elapses. On timeout
/// the child is killed and reaped before the error is returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(), CommandError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::TimedOut(timeout));
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CommandError::Io(e.to_string())),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// PATH MAPPING                                                       //
////////////////////////////////////////////////////////////////////////

/// The daemon's fixed in-container configuration directory.
pub const CONTAINER_CONFIG_DIR: &str = "/etc/bind";
/// The daemon's fixed in-container zone directory.
pub const CONTAINER_ZONES_DIR: &str = "/var/lib/bind";
/// The daemon's fixed in-container DNSSEC key directory.
pub const CONTAINER_KEYS_DIR: &str = "/var/lib/bind/keys";

/// Translates host paths into paths the daemon itself can resolve.
pub trait PathMapper: Send + Sync {
    fn map(&self, path: &Path) -> PathBuf;
}

/// The identity mapping used when the daemon runs on the host.
pub struct HostPathMapper;

impl PathMapper for HostPathMapper {
    fn map(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Rewrites host paths under the configured config/zones/keys
/// directories to the daemon's fixed in-container layout. Paths outside
/// those directories pass through unchanged.
pub struct ContainerPathMapper {
    config_dir: PathBuf,
    zones_dir: PathBuf,
    keys_dir: PathBuf,
}

impl ContainerPathMapper {
    pub fn new(settings: &Settings) -> Self {
        Self {
            config_dir: settings.config_dir.clone(),
            zones_dir: settings.zones_dir.clone(),
            keys_dir: settings.keys_dir.clone(),
        }
    }
}

impl PathMapper for ContainerPathMapper {
    fn map(&self, path: &Path) -> PathBuf {
        // The keys directory usually nests under the zones directory,
        // so it must be tried first.
        for (host_root, container_root) in [
            (&self.keys_dir, CONTAINER_KEYS_DIR),
            (&self.zones_dir, CONTAINER_ZONES_DIR),
            (&self.config_dir, CONTAINER_CONFIG_DIR),
        ] {
            if let Ok(rest) = path.strip_prefix(host_root) {
                return Path::new(container_root).join(rest);
            }
        }
        path.to_path_buf()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings::rooted_at("/srv/dns")
    }

    #[test]
    fn container_mapper_rewrites_managed_roots() {
        let mapper = ContainerPathMapper::new(&test_settings());
        assert_eq!(
            mapper.map(Path::new("/srv/dns/zones/db.example.com")),
            PathBuf::from("/var/lib/bind/db.example.com"),
        );
        assert_eq!(
            mapper.map(Path::new("/srv/dns/zones/keys/Kexample.com.+013+12345.key")),
            PathBuf::from("/var/lib/bind/keys/Kexample.com.+013+12345.key"),
        );
        assert_eq!(
            mapper.map(Path::new("/srv/dns/etc/named.conf")),
            PathBuf::from("/etc/bind/named.conf"),
        );
    }

    #[test]
    fn container_mapper_passes_foreign_paths_through() {
        let mapper = ContainerPathMapper::new(&test_settings());
        assert_eq!(
            mapper.map(Path::new("/tmp/whatever")),
            PathBuf::from("/tmp/whatever"),
        );
    }

    #[test]
    fn host_mapper_is_identity() {
        let mapper = HostPathMapper;
        assert_eq!(
            mapper.map(Path::new("/srv/dns/zones/db.example.com")),
            PathBuf::from("/srv/dns/zones/db.example.com"),
        );
    }

    #[test]
    fn detect_uses_the_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::rooted_at(dir.path());
        settings.marker_path = dir.path().join("container-mode");
        assert_eq!(ExecMode::detect(&settings), ExecMode::Host);
        std::fs::write(&settings.marker_path, b"").unwrap();
        assert!(ExecMode::detect(&settings).is_container());
    }

    #[test]
    fn shell_runner_captures_output() {
        let runner = ShellRunner::new(ExecMode::Host);
        let output = runner
            .run(
                &[String::from("echo"), String::from("hello")],
                SHORT_TIMEOUT,
            )
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn shell_runner_reports_nonzero_exit() {
        let runner = ShellRunner::new(ExecMode::Host);
        let output = runner
            .run(
                &[String::from("sh"), String::from("-c"), String::from("exit 3")],
                SHORT_TIMEOUT,
            )
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }

    #[test]
    fn shell_runner_enforces_the_timeout() {
        let runner = ShellRunner::new(ExecMode::Host);
        let result = runner.run(
            &[String::from("sleep"), String::from("5")],
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(CommandError::TimedOut(_))));
    }
}
