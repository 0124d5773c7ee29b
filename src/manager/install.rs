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

//! Implements installation and removal of the managed BIND daemon, for
//! both host-package and container deployments.
//!
//! Installation commands always run on the host, whatever the current
//! execution mode: there is nothing to `exec` into before the daemon
//! exists.

use std::fs;

use log::info;

use super::{OpReport, ZoneManager};
use crate::command::{CommandRunner, ExecMode, LONG_TIMEOUT};

impl ZoneManager {
    /// Installs BIND as a host package via apt and marks the
    /// deployment as host-mode.
    pub fn install_host(&self) -> OpReport {
        let report = self.run_host_tool(
            &["apt-get", "install", "-y", "bind9", "bind9-dnsutils"],
            "host install",
        );
        if report.success {
            self.clear_container_marker();
        }
        report
    }

    /// Removes the host BIND package.
    pub fn uninstall_host(&self) -> OpReport {
        self.run_host_tool(&["apt-get", "remove", "-y", "bind9"], "host uninstall")
    }

    /// Pulls the configured BIND image and starts it as a named
    /// container, mounting the configuration and zone directories, then
    /// marks the deployment as container-mode.
    pub fn install_container(&self) -> OpReport {
        let settings = self.settings();
        let runtime = settings.container_runtime.clone();
        let pull = self.run_host_tool(
            &[&runtime, "pull", &settings.container_image],
            "image pull",
        );
        if !pull.success {
            return pull;
        }
        let config_mount = format!(
            "{}:{}",
            settings.config_dir.display(),
            crate::command::CONTAINER_CONFIG_DIR,
        );
        let zones_mount = format!(
            "{}:{}",
            settings.zones_dir.display(),
            crate::command::CONTAINER_ZONES_DIR,
        );
        let run = self.run_host_tool(
            &[
                &runtime,
                "run",
                "-d",
                "--name",
                &settings.container_name,
                "-p",
                "53:53/udp",
                "-p",
                "53:53/tcp",
                "-v",
                &config_mount,
                "-v",
                &zones_mount,
                &settings.container_image,
            ],
            "container start",
        );
        if run.success {
            self.set_container_marker();
        }
        run
    }

    /// Stops and removes the named container and drops the marker.
    pub fn uninstall_container(&self) -> OpReport {
        let settings = self.settings();
        let runtime = settings.container_runtime.clone();
        let name = settings.container_name.clone();
        // A stop failure (already stopped, never started) is not fatal
        // to the removal.
        let stop = self.run_host_tool(&[&runtime, "stop", &name], "container stop");
        if !stop.success {
            info!("Container stop reported: {}", stop.message);
        }
        let rm = self.run_host_tool(&[&runtime, "rm", &name], "container removal");
        if rm.success {
            self.clear_container_marker();
        }
        rm
    }

    /// Runs an installation command on the host and folds the outcome
    /// into an [`OpReport`].
    fn run_host_tool(&self, argv: &[&str], what: &str) -> OpReport {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        match self.host_runner.run(&argv, LONG_TIMEOUT) {
            Ok(output) if output.success() => {
                OpReport::ok(format!("{what} succeeded"))
            }
            Ok(output) => OpReport::fail(format!("{what} failed: {}", output.diagnostic())),
            Err(e) => OpReport::fail(format!("{what} failed: {e}")),
        }
    }

    fn set_container_marker(&self) {
        let marker = &self.settings().marker_path;
        if let Some(parent) = marker.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(e) = fs::write(marker, b"") {
            log::error!("Failed to write {}: {e}", marker.display());
        }
        info!(
            "Container mode enabled; commands will run via `{} exec {}`.",
            self.settings().container_runtime,
            self.settings().container_name,
        );
    }

    fn clear_container_marker(&self) {
        super::remove_file_if_present(&self.settings().marker_path);
    }

    /// Whether the current deployment runs the daemon in a container.
    pub fn container_mode(&self) -> bool {
        ExecMode::detect(self.settings()).is_container()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::tests::test_manager;

    #[test]
    fn host_install_runs_apt_and_clears_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        std::fs::create_dir_all(manager.settings().marker_path.parent().unwrap()).unwrap();
        std::fs::write(&manager.settings().marker_path, b"").unwrap();

        let report = manager.install_host();
        assert!(report.success);
        assert!(runner
            .commands()
            .iter()
            .any(|c| c == "apt-get install -y bind9 bind9-dnsutils"));
        assert!(!manager.container_mode());
    }

    #[test]
    fn container_install_pulls_runs_and_sets_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let report = manager.install_container();
        assert!(report.success);
        let commands = runner.commands();
        assert!(commands
            .iter()
            .any(|c| c == "docker pull internetsystemsconsortium/bind9:9.18"));
        assert!(commands
            .iter()
            .any(|c| c.starts_with("docker run -d --name bind9")));
        assert!(manager.container_mode());
    }

    #[test]
    fn container_uninstall_stops_removes_and_clears_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        manager.install_container();
        let report = manager.uninstall_container();
        assert!(report.success);
        let commands = runner.commands();
        assert!(commands.iter().any(|c| c == "docker stop bind9"));
        assert!(commands.iter().any(|c| c == "docker rm bind9"));
        assert!(!manager.container_mode());
    }
}
