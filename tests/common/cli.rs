use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// An isolated home and data directory for running the binary.
pub struct LijoWorkspace {
    pub root: TempDir,
}

impl LijoWorkspace {
    pub fn new() -> Self {
        super::init_test_logging();
        Self {
            root: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    /// The binary with `--data-dir` set and no inherited `LIJO_*` settings.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lijo"));
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .env("HOME", self.root.path())
            .env_remove("RUST_LOG");
        for key in [
            "LIJO_DATA_DIR",
            "LIJO_DB",
            "LIJO_PREFERENCES",
            "LIJO_SUBSCRIPTION_GRACE_MS",
            "LIJO_LOG_FILE",
        ] {
            cmd.env_remove(key);
        }
        cmd
    }

    /// Run with `--json`, require success and parse stdout.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().arg("--json").args(args).assert().success();
        let stdout = &output.get_output().stdout;
        serde_json::from_slice(stdout).unwrap_or_else(|err| {
            panic!(
                "stdout of {args:?} is not JSON ({err}): {}",
                String::from_utf8_lossy(stdout)
            )
        })
    }

    /// Create a list and return its id.
    pub fn new_list(&self, name: &str) -> i64 {
        self.json(&["list", "new", name])["id"]
            .as_i64()
            .expect("list id")
    }

    /// Add an item and return its id.
    pub fn add_item(&self, list_id: i64, title: &str) -> i64 {
        self.json(&["item", "add", &list_id.to_string(), title])["id"]
            .as_i64()
            .expect("item id")
    }
}
