//! Integration tests for Trellis

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Binary isolated from the user's config, home and environment
    fn trellis(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("trellis");
        cmd.env_remove("TRELLIS_TARGET_PATH")
            .env_remove("TRELLIS_REGISTRY")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--home")
            .arg(temp.path().join("home"))
            .arg("--no-update-check");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("versioned command packages"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("trellis"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[registry]"));
    }

    #[test]
    fn config_invalid_file_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[general\n").unwrap();
        trellis(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn cache_path_under_home() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dependencies"));
    }

    #[test]
    fn cache_list_empty_json() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .args(["cache", "list", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("[]"));
    }

    #[test]
    fn unknown_command_fails_without_touching_home() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .arg("bogus")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unknown command: bogus"));
        assert!(!temp.path().join("home").exists());
    }

    #[test]
    fn unknown_command_fails_before_update_check() {
        let temp = TempDir::new().unwrap();
        // Accepts connections but never answers
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = format!("http://{}", silent.local_addr().unwrap());
        std::fs::write(
            temp.path().join("config.toml"),
            "[registry]\ntimeout_secs = 30\n\n[general]\ncheck_updates = true\n",
        )
        .unwrap();

        cargo_bin_cmd!("trellis")
            .env_remove("TRELLIS_TARGET_PATH")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--home")
            .arg(temp.path().join("home"))
            .arg("--registry")
            .arg(&registry)
            .arg("bogus")
            .timeout(Duration::from_secs(10))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unknown command: bogus"));
        assert!(!temp.path().join("home").exists());
    }

    #[test]
    fn completions_bash() {
        let temp = TempDir::new().unwrap();
        trellis(&temp)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("trellis"));
    }

    #[cfg(unix)]
    mod dispatch {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        /// Local command package whose entry echoes its bundle and exits
        fn local_package(dir: &Path, exit_code: i32) {
            std::fs::create_dir_all(dir.join("bin")).unwrap();
            std::fs::write(
                dir.join("package.json"),
                r#"{"name":"@trellis-cli/init","main":"bin/run"}"#,
            )
            .unwrap();
            let script = dir.join("bin/run");
            std::fs::write(
                &script,
                format!(
                    "#!/bin/sh\necho \"bundle=$1\"\necho \"host=$TRELLIS_HOST_VERSION\"\nexit {}\n",
                    exit_code
                ),
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        #[test]
        fn init_runs_override_package_and_propagates_exit_code() {
            let temp = TempDir::new().unwrap();
            let local = temp.path().join("init");
            local_package(&local, 3);

            trellis(&temp)
                .arg("--target-path")
                .arg(&local)
                .args(["init", "my-app", "--force"])
                .assert()
                .code(3)
                .stdout(predicate::str::contains(
                    r#"bundle=["my-app",{"force":true}]"#,
                ))
                .stdout(predicate::str::contains(format!(
                    "host={}",
                    env!("CARGO_PKG_VERSION")
                )));
        }

        #[test]
        fn configured_command_runs_with_parsed_options() {
            let temp = TempDir::new().unwrap();
            let local = temp.path().join("page");
            local_package(&local, 0);
            std::fs::write(
                temp.path().join("config.toml"),
                "[commands]\npage = \"@acme/page\"\n",
            )
            .unwrap();

            trellis(&temp)
                .env("TRELLIS_TARGET_PATH", &local)
                .args(["page", "About", "--dry-run", "--_secret=x"])
                .assert()
                .success()
                .stdout(predicate::str::contains(
                    r#"bundle=["About",{"dry-run":true}]"#,
                ));
        }

        #[test]
        fn override_without_main_reports_entry_not_found() {
            let temp = TempDir::new().unwrap();
            let local = temp.path().join("init");
            std::fs::create_dir_all(&local).unwrap();
            std::fs::write(local.join("package.json"), r#"{"name":"@trellis-cli/init"}"#).unwrap();

            trellis(&temp)
                .arg("--target-path")
                .arg(&local)
                .arg("init")
                .assert()
                .code(1)
                .stderr(predicate::str::contains("entry not found"));
        }
    }
}
