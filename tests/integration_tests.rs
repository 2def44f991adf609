//! Integration tests for the night-cycle binary
//!
//! These drive the compiled CLI end to end, with mock GitHub and OpenAI
//! servers standing in for the real services.

use assert_cmd::Command;
use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::cargo_bin_cmd;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a night-cycle Command with a clean environment
fn night_cycle(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("night-cycle");
    cmd.env_clear().current_dir(dir.path());
    cmd
}

/// Point a command at the mock servers with a complete set of credentials
fn with_services(cmd: &mut Command, github: &MockServer, openai: &MockServer) {
    cmd.env("GITHUB_TOKEN", "ghp_integrationtoken")
        .env("OPENAI_API_KEY", "sk-integration")
        .env("REPO_NAME", "octo/widgets")
        .env("NIGHT_CYCLE_DELAY_SECS", "0")
        .env("GITHUB_API_URL", github.uri())
        .env("OPENAI_BASE_URL", format!("{}/v1", openai.uri()));
}

/// Run a prepared command off the async runtime so the mock servers keep serving
async fn run_blocking(mut cmd: Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

/// A repository with one Python file and no history
async fn mount_single_file_repo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "octo/widgets",
            "default_branch": "main"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "file", "name": "a.py", "path": "a.py", "sha": "f1"},
            {"type": "file", "name": "README.md", "path": "README.md", "sha": "f2"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/contents/a.py"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "name": "a.py",
            "path": "a.py",
            "sha": "f1",
            "encoding": "base64",
            "content": STANDARD.encode("print(1)")
        })))
        .mount(server)
        .await;
}

async fn mount_completion(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })))
        .mount(server)
        .await;
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("scan"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir).arg("sunrise").assert().failure();
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_cli {
    use super::*;

    #[test]
    fn test_missing_token_fails_fast() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir)
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "Missing required environment variable: GITHUB_TOKEN",
            ));
    }

    #[test]
    fn test_missing_repo_name_is_reported() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir)
            .env("GITHUB_TOKEN", "ghp_x")
            .env("OPENAI_API_KEY", "sk-x")
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("REPO_NAME"));
    }

    #[test]
    fn test_malformed_repo_name_is_reported() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir)
            .env("GITHUB_TOKEN", "ghp_x")
            .env("OPENAI_API_KEY", "sk-x")
            .env("REPO_NAME", "widgets")
            .arg("scan")
            .assert()
            .failure()
            .stderr(predicate::str::contains("owner/name"));
    }

    #[test]
    fn test_dotenv_file_supplies_credentials() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env"),
            "GITHUB_TOKEN=ghp_fromdotenv\nOPENAI_API_KEY=sk-fromdotenv\nREPO_NAME=octo/widgets\n",
        )
        .unwrap();

        night_cycle(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("repository      = octo/widgets"))
            .stdout(predicate::str::contains("ghp_****"))
            .stdout(predicate::str::contains("ghp_fromdotenv").not());
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        night_cycle(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let written = fs::read_to_string(dir.path().join("night-cycle.toml")).unwrap();
        assert!(written.contains("[cycle]"));
        assert!(written.contains("extension = \".py\""));
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("night-cycle.toml"), "[cycle]\ncommits = 7\n").unwrap();

        night_cycle(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let kept = fs::read_to_string(dir.path().join("night-cycle.toml")).unwrap();
        assert!(kept.contains("commits = 7"));
    }

    #[test]
    fn test_config_file_values_show_up() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("night-cycle.toml"),
            "[cycle]\nextension = \".rs\"\ncommits = 7\n",
        )
        .unwrap();

        night_cycle(&dir)
            .env("GITHUB_TOKEN", "ghp_x")
            .env("OPENAI_API_KEY", "sk-x")
            .env("REPO_NAME", "octo/widgets")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("extension       = .rs"))
            .stdout(predicate::str::contains("commits         = 7"));
    }
}

// =============================================================================
// Night cycle against mock services
// =============================================================================

mod cycle_runs {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_key_issues_no_remote_call() {
        let github = MockServer::start().await;
        let openai = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let mut cmd = night_cycle(&dir);
        with_services(&mut cmd, &github, &openai);
        cmd.env_remove("OPENAI_API_KEY").arg("run");

        let output = run_blocking(cmd).await;
        output
            .assert()
            .failure()
            .stderr(predicate::str::contains("OPENAI_API_KEY"));

        assert!(github.received_requests().await.unwrap().is_empty());
        assert!(openai.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_opens_one_pull_request() {
        let github = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_single_file_repo(&github).await;
        mount_completion(&openai, "print(1)  # improved").await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/git/ref/heads/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ref": "refs/heads/main",
                "object": {"sha": "c0ffee"}
            })))
            .mount(&github)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/widgets/git/refs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&github)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/widgets/contents/a.py"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&github)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/widgets/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 7,
                "html_url": "https://github.com/octo/widgets/pull/7"
            })))
            .expect(1)
            .mount(&github)
            .await;

        let dir = TempDir::new().unwrap();
        let mut cmd = night_cycle(&dir);
        with_services(&mut cmd, &github, &openai);
        cmd.arg("run");

        let output = run_blocking(cmd).await;
        output
            .assert()
            .success()
            .stdout(predicate::str::contains("a.py"))
            .stdout(predicate::str::contains("#7"))
            .stdout(predicate::str::contains("1 published, 0 skipped, 0 failed"));

        let requests = github.received_requests().await.unwrap();
        let put = requests
            .iter()
            .find(|r| r.method.as_str() == "PUT")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
        assert_eq!(body["content"], STANDARD.encode("print(1)  # improved"));
        assert_eq!(body["sha"], "f1");
        assert_eq!(body["message"], "Auto-improvement for a.py");
        assert!(
            body["branch"]
                .as_str()
                .unwrap()
                .starts_with("auto_improvement_")
        );

        // README.md never reaches the model.
        let prompts = openai.received_requests().await.unwrap();
        assert_eq!(prompts.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dry_run_creates_nothing() {
        let github = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_single_file_repo(&github).await;
        mount_completion(&openai, "print(2)").await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&github)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&github)
            .await;

        let dir = TempDir::new().unwrap();
        let mut cmd = night_cycle(&dir);
        with_services(&mut cmd, &github, &openai);
        cmd.args(["run", "--dry-run"]);

        let output = run_blocking(cmd).await;
        output
            .assert()
            .success()
            .stdout(predicate::str::contains("0 published, 1 skipped, 0 failed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_token_ends_run_cleanly() {
        let github = MockServer::start().await;
        let openai = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&github)
            .await;

        let dir = TempDir::new().unwrap();
        let mut cmd = night_cycle(&dir);
        with_services(&mut cmd, &github, &openai);
        cmd.arg("run");

        let output = run_blocking(cmd).await;
        output
            .assert()
            .success()
            .stdout(predicate::str::contains("Night cycle aborted"))
            .stdout(predicate::str::contains("published").not());
        assert!(openai.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_lists_matching_files() {
        let github = MockServer::start().await;
        let openai = MockServer::start().await;
        mount_single_file_repo(&github).await;

        let dir = TempDir::new().unwrap();
        let mut cmd = night_cycle(&dir);
        with_services(&mut cmd, &github, &openai);
        cmd.arg("scan");

        let output = run_blocking(cmd).await;
        output
            .assert()
            .success()
            .stdout(predicate::str::contains("a.py"))
            .stdout(predicate::str::contains("README.md").not())
            .stdout(predicate::str::contains("Found 1 file"));
    }
}
