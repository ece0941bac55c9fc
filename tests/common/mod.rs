// tests/common/mod.rs - Shared test helpers (fake device root + rescan stub)
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const SERVICE: &str = "com.example.svc";

/// A test helper that lays out a fake device filesystem in a temp directory
/// and runs the elevate-service binary against it.
pub struct MiniRoot {
    pub root: PathBuf,
    pub runtime_dir: PathBuf,
    pub tools_dir: PathBuf,
    _root_tmp: TempDir,
    _runtime_tmp: TempDir,
    _tools_tmp: TempDir,
}

impl MiniRoot {
    pub fn new() -> Self {
        let root_tmp = TempDir::new().unwrap();
        let runtime_tmp = TempDir::new().unwrap();
        let tools_tmp = TempDir::new().unwrap();

        let launcher = runtime_tmp.path().join("run-js-service");
        fs::write(&launcher, "#!/bin/sh\nexec node \"$@\"\n").unwrap();
        fs::set_permissions(&launcher, fs::Permissions::from_mode(0o755)).unwrap();

        let mini = MiniRoot {
            root: root_tmp.path().to_path_buf(),
            runtime_dir: runtime_tmp.path().to_path_buf(),
            tools_dir: tools_tmp.path().to_path_buf(),
            _root_tmp: root_tmp,
            _runtime_tmp: runtime_tmp,
            _tools_tmp: tools_tmp,
        };
        mini.install_rescan_stub(0);
        mini
    }

    /// Path of a device file under the fake root.
    pub fn path(&self, device_path: &str) -> PathBuf {
        self.root.join(device_path.trim_start_matches('/'))
    }

    pub fn launcher(&self) -> PathBuf {
        self.runtime_dir.join("run-js-service")
    }

    /// Write a device file, creating parent directories.
    pub fn put(&self, device_path: &str, contents: &str) -> PathBuf {
        let path = self.path(device_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn put_json(&self, device_path: &str, data: &serde_json::Value) -> PathBuf {
        self.put(device_path, &serde_json::to_string(data).unwrap())
    }

    pub fn mkdir(&self, device_path: &str) {
        fs::create_dir_all(self.path(device_path)).unwrap();
    }

    pub fn read(&self, device_path: &str) -> String {
        fs::read_to_string(self.path(device_path)).unwrap()
    }

    pub fn read_json(&self, device_path: &str) -> serde_json::Value {
        serde_json::from_str(&self.read(device_path)).unwrap()
    }

    /// Seed a complete webOS 3.x+ layout for `SERVICE` under `luna_root`.
    pub fn seed_modern(&self, luna_root: &str, exec_line: &str) {
        self.put(
            &format!("{}/services.d/{}.service", luna_root, SERVICE),
            &format!("[D-BUS Service]\nName={}\n{}\n", SERVICE, exec_line),
        );
        self.mkdir(&format!("{}/client-permissions.d", luna_root));
        self.mkdir(&format!("{}/api-permissions.d", luna_root));
        self.put_json(
            &format!("{}/roles.d/{}.service.json", luna_root, SERVICE),
            &serde_json::json!({
                "appId": SERVICE,
                "type": "regular",
                "allowedNames": [SERVICE],
                "permissions": [
                    {"service": SERVICE, "inbound": ["*"], "outbound": ["com.webos.*"]}
                ]
            }),
        );
        self.put_json(
            &format!("{}/manifests.d/com.example.json", luna_root),
            &serde_json::json!({
                "id": "com.example",
                "serviceFiles": [format!("{}/services.d/{}.service", luna_root, SERVICE)],
                "clientPermissionFiles": [],
                "apiPermissionFiles": []
            }),
        );
    }

    /// Replace the fake `ls-control` with one that exits with `code`.
    pub fn install_rescan_stub(&self, code: i32) {
        let log = self.rescan_log();
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\necho 'rescan stub ran'\nexit {}\n",
            log.display(),
            code
        );
        let path = self.rescan_stub();
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn rescan_stub(&self) -> PathBuf {
        self.tools_dir.join("ls-control")
    }

    pub fn rescan_log(&self) -> PathBuf {
        self.tools_dir.join("rescan.log")
    }

    /// Lines the rescan stub recorded, one per invocation.
    pub fn rescan_calls(&self) -> Vec<String> {
        match fs::read_to_string(self.rescan_log()) {
            Ok(content) => content.lines().map(|l| l.to_string()).collect(),
            Err(_) => vec![],
        }
    }

    /// Run the binary against this root with given extra args.
    pub fn run_elevate(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(elevate_binary_path());
        cmd.args(args)
            .arg("--sysroot")
            .arg(&self.root)
            .arg("--runtime-dir")
            .arg(&self.runtime_dir)
            .arg("--rescan-command")
            .arg(self.rescan_stub())
            .env_remove("RUST_LOG");

        cmd.output().unwrap_or_else(|e| {
            panic!(
                "Failed to run elevate-service binary at {}: {}",
                elevate_binary_path().display(),
                e
            )
        })
    }

    /// Get stdout from a run as String.
    pub fn run_elevate_stdout(&self, args: &[&str]) -> String {
        let output = self.run_elevate(args);
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}

/// The binary cargo built for this test run.
pub fn elevate_binary_path() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_elevate-service"))
}
