use std::fs;
use std::path::Path;

use clap::Parser;
use dupescan::cli::Cli;
use dupescan::commands::run_with_output;
use dupescan::error::{CommandError, ExitCode};
use tempfile::{tempdir, TempDir};

use crate::{clear_env, ENV_MUTEX};

struct Workspace {
    state: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            state: tempdir().unwrap(),
        }
    }

    fn run(&self, args: &[&str]) -> (anyhow::Result<ExitCode>, String) {
        let db = self.state.path().join("dupescan.db");
        let config = self.state.path().join("config.toml");
        let mut argv = vec![
            "dupescan".to_string(),
            "--database".to_string(),
            db.display().to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| (*a).to_string()));

        let cli = Cli::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        let result = run_with_output(cli, &mut out);
        (result, String::from_utf8(out).unwrap())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_full_command_flow() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let root = tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"payload").unwrap();
    fs::write(root.path().join("b.txt"), b"payload").unwrap();
    let root_arg = path_arg(root.path());

    let (code, out) = ws.run(&["path", "add", &root_arg]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    assert!(out.contains("Added"));

    let (code, out) = ws.run(&["path", "list", "--output", "json"]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    let listed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(listed[0]["path"], root_arg.as_str());
    assert_eq!(listed[0]["status"], "idle");

    let (code, out) = ws.run(&["-q", "scan", "--output", "json"]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    let summary: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(summary["progress"]["files_scanned"], 2);
    assert_eq!(summary["stopped"], false);

    let (code, out) = ws.run(&["duplicates", "--output", "json"]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    let listing: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(listing["summary"]["groups"], 1);
    assert_eq!(listing["summary"]["wasted_space"], 7);
    let id = listing["groups"][0]["files"][1]["id"].as_i64().unwrap();

    let (code, out) = ws.run(&["remove", &id.to_string()]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    assert!(out.starts_with("Deleted"));

    let (code, out) = ws.run(&["duplicates"]);
    assert_eq!(code.unwrap(), ExitCode::NoDuplicates);
    assert_eq!(out, "No duplicates found.\n");

    let (code, out) = ws.run(&["stats"]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    assert!(out.contains("Files tracked:    1"));
}

#[test]
fn test_adding_same_path_twice_fails() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let root = tempdir().unwrap();
    let root_arg = path_arg(root.path());

    ws.run(&["path", "add", &root_arg]).0.unwrap();
    let (result, _) = ws.run(&["path", "add", &root_arg]);
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("path already exists"));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_scan_without_paths_fails() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();

    let (result, _) = ws.run(&["-q", "scan"]);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("no paths to scan"));
}

#[test]
fn test_remove_unknown_path_id() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();

    let (result, _) = ws.run(&["path", "remove", "17"]);
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CommandError>(),
        Some(CommandError::ScanPathNotFound(17))
    ));
}

#[test]
fn test_remove_in_path_command() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let root = tempdir().unwrap();
    let dupes = root.path().join("dupes");
    fs::create_dir(&dupes).unwrap();
    for name in ["1.bin", "2.bin", "3.bin"] {
        fs::write(dupes.join(name), b"xyz").unwrap();
    }

    ws.run(&["path", "add", &path_arg(root.path())]).0.unwrap();
    ws.run(&["-q", "scan"]).0.unwrap();

    let (code, out) = ws.run(&[
        "remove-in-path",
        &path_arg(&dupes),
        "--keep",
        "oldest",
        "--output",
        "json",
    ]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    let batch: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(batch["successes"].as_array().unwrap().len(), 2);
    assert_eq!(batch["bytes_freed"], 6);

    let remaining = fs::read_dir(&dupes).unwrap().count();
    assert_eq!(remaining, 1);
}

#[test]
fn test_config_command_prints_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();

    let (code, out) = ws.run(&["config"]);
    assert_eq!(code.unwrap(), ExitCode::Success);
    let parsed: toml::Value = toml::from_str(&out).unwrap();
    assert_eq!(parsed["hash_batch_size"].as_integer(), Some(10));
    assert!(parsed["database_path"]
        .as_str()
        .unwrap()
        .ends_with("dupescan.db"));
}
