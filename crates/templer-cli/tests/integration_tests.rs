//! Integration tests for the templer binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Helper to run templer in `dir`
fn templer(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_templer"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute templer")
}

/// Get the fixtures path
fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Copy of the demo stack that tests may write into
fn demo_stack() -> TempDir {
    let dir = TempDir::new().unwrap();
    copy_dir(&fixtures_path().join("demo-stack"), dir.path());
    dir
}

mod render {
    use super::*;

    #[test]
    fn test_render_demo_stack() {
        let dir = demo_stack();
        let output = templer(dir.path(), &["stack.yml"]);
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );

        let web = fs::read_to_string(dir.path().join("out/shop-web.yml")).unwrap();
        assert_eq!(
            web,
            "# Frontend of shop\nservices:\n  web:\n    image: docker.io/nginx\n    restart: unless-stopped\n    deploy:\n      replicas: 2\n    ports:\n      - 80\n      - 443\n"
        );

        let db = fs::read_to_string(dir.path().join("out/shop-db.yml")).unwrap();
        assert!(db.contains("POSTGRES_DB: shop"));
        assert!(db.contains("POSTGRES_VERSION: 16"));
        assert!(!db.contains("healthcheck"));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Created file"));
    }

    #[test]
    fn test_quiet_hides_progress() {
        let dir = demo_stack();
        let output = templer(dir.path(), &["-q", "stack.yml"]);
        assert!(output.status.success());
        assert!(!String::from_utf8_lossy(&output.stderr).contains("Created file"));
    }

    #[test]
    fn test_existing_destination_requires_force() {
        let dir = demo_stack();
        assert!(templer(dir.path(), &["stack.yml"]).status.success());

        let output = templer(dir.path(), &["stack.yml"]);
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Destination already exists"));

        assert!(templer(dir.path(), &["--force", "stack.yml"]).status.success());
    }

    #[test]
    fn test_partial_failure() {
        let dir = demo_stack();
        fs::write(
            dir.path().join("templates/db.yml.j2"),
            "services:\n  db:\n    image: {{ unknown_image }}\n",
        )
        .unwrap();

        let output = templer(dir.path(), &["stack.yml"]);
        assert_eq!(output.status.code(), Some(1));
        assert!(dir.path().join("out/shop-web.yml").exists());
        assert!(!dir.path().join("out/shop-db.yml").exists());

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("1 error in 1 file"));
    }

    #[test]
    fn test_broken_definition_does_not_stop_others() {
        let dir = demo_stack();
        fs::write(dir.path().join("broken.yml"), "vars: {}\n").unwrap();

        let output = templer(dir.path(), &["broken.yml", "stack.yml"]);
        assert_eq!(output.status.code(), Some(1));
        assert!(dir.path().join("out/shop-web.yml").exists());
        assert!(String::from_utf8_lossy(&output.stderr).contains("Missing 'templates' definition"));
    }
}

mod arguments {
    use super::*;

    #[test]
    fn test_missing_definition() {
        let dir = TempDir::new().unwrap();
        let output = templer(dir.path(), &["nope.yml"]);
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Definition file does not exist: nope.yml"));
    }

    #[test]
    fn test_no_arguments() {
        let dir = TempDir::new().unwrap();
        let output = templer(dir.path(), &[]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        let output = templer(dir.path(), &["--version"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("minijinja"));
    }

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        let output = templer(dir.path(), &["--help"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("--auto-render"));
        assert!(stdout.contains("DEFINITION_FILE"));
    }
}
