//! Integration tests for the anchorchat binary
//!
//! Every run uses `--local` or a throwaway preferences file so nothing touches
//! the real per-user configuration. The model API is a canned HTTP server on
//! localhost.

use std::{
    io::{Read, Write},
    net::TcpListener,
    path::Path,
    process::Command,
    thread,
};

use assert_cmd::prelude::*;
use tempfile::tempdir;

fn anchorchat(prefs: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("anchorchat"));
    cmd.arg("--preferences")
        .arg(prefs)
        .env("NO_COLOR", "1")
        .env_remove("ANCHORCHAT_CLOUD")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("ANTHROPIC_BASE_URL");
    cmd
}

/// Answers `requests` calls: streaming requests get `fragments` as SSE, the
/// rest get the next entry of `replies`.
fn fake_anthropic(fragments: &'static [&'static str], replies: &'static [&'static str]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut replies = replies.iter();
        for stream in listener.incoming() {
            let mut socket = stream.unwrap();
            let request = read_request(&mut socket);
            let response = if request.contains("\"stream\":true") {
                let body: String = fragments
                    .iter()
                    .map(|f| {
                        format!(
                            "event: content_block_delta\ndata: {{\"type\":\"content_block_delta\",\"index\":0,\"delta\":{{\"type\":\"text_delta\",\"text\":\"{f}\"}}}}\n\n"
                        )
                    })
                    .chain(["event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n".to_string()])
                    .collect();
                http_response("text/event-stream", &body)
            } else {
                let text = replies.next().copied().unwrap_or("");
                let body = format!(r#"{{"content":[{{"type":"text","text":"{text}"}}]}}"#);
                http_response("application/json", &body)
            };
            socket.write_all(response.as_bytes()).unwrap();
        }
    });
    format!("http://{addr}")
}

fn read_request(socket: &mut std::net::TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).unwrap();
        request.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&request);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    l.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                return text.into_owned();
            }
        }
        if n == 0 {
            return text.into_owned();
        }
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempdir().unwrap();
    let help = stdout_of(anchorchat(&dir.path().join("prefs.toml")).arg("--help"));
    for sub in ["setup", "switch", "chat", "list", "show", "delete", "settings", "models", "whoami"] {
        assert!(help.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn test_models_marks_default() {
    let dir = tempdir().unwrap();
    let out = stdout_of(anchorchat(&dir.path().join("prefs.toml")).arg("models"));
    assert!(out.contains("* claude-opus-4-6"));
    assert!(out.contains("Claude Opus 4.6 (Preview)"));
}

#[test]
fn test_cloud_without_configuration_fails() {
    let dir = tempdir().unwrap();
    anchorchat(&dir.path().join("prefs.toml"))
        .arg("list")
        .assert()
        .failure();
}

#[test]
fn test_local_setup_needs_grant_on_later_runs() {
    let dir = tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let chats = dir.path().join("chats");
    std::fs::create_dir(&chats).unwrap();

    anchorchat(&prefs)
        .args(["setup", "local"])
        .arg(&chats)
        .assert()
        .success();
    assert!(chats.join("anchorchat chats").join("index.json").exists());
    assert!(std::fs::read_to_string(&prefs).unwrap().contains("storage-mode = \"local\""));

    anchorchat(&prefs).arg("list").assert().failure();
    let out = stdout_of(anchorchat(&prefs).arg("--local").arg(&chats).arg("list"));
    assert!(out.contains("No saved sessions."));

    anchorchat(&prefs).arg("switch").assert().success();
    assert!(!std::fs::read_to_string(&prefs).unwrap().contains("storage-mode"));
}

#[test]
fn test_fs_cloud_setup_remembers_path() {
    let dir = tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let bucket = dir.path().join("bucket");

    anchorchat(&prefs)
        .env("ANCHORCHAT_CLOUD", "fs")
        .env("ANCHORCHAT_CLOUD_FS_ROOT", &bucket)
        .args(["setup", "cloud", "~/team-chats"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(&prefs).unwrap();
    assert!(saved.contains("storage-mode = \"cloud\""));
    assert!(saved.contains("storage-path = \"~/team-chats\""));
    assert!(bucket.join("team-chats").join("index.json").exists());

    let out = stdout_of(
        anchorchat(&prefs)
            .env("ANCHORCHAT_CLOUD", "fs")
            .env("ANCHORCHAT_CLOUD_FS_ROOT", &bucket)
            .arg("list"),
    );
    assert!(out.contains("No saved sessions."));
}

#[test]
fn test_settings_are_saved_per_storage() {
    let dir = tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let chats = dir.path().join("chats");
    std::fs::create_dir(&chats).unwrap();

    let out = stdout_of(
        anchorchat(&prefs)
            .arg("--local")
            .arg(&chats)
            .args(["settings", "--model", "claude-opus-4-5", "--system-prompt", "Be terse"]),
    );
    assert!(out.contains("Claude Opus 4.5"));

    let settings =
        std::fs::read_to_string(chats.join("anchorchat chats").join("settings.json")).unwrap();
    assert!(settings.contains("\"defaultModel\": \"claude-opus-4-5\""));
    assert!(settings.contains("\"systemPrompt\": \"Be terse\""));

    anchorchat(&prefs)
        .arg("--local")
        .arg(&chats)
        .args(["settings", "--model", "gpt-4"])
        .assert()
        .failure();
}

#[test]
fn test_chat_streams_reply_and_saves_session() {
    let dir = tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let chats = dir.path().join("chats");
    std::fs::create_dir(&chats).unwrap();
    let url = fake_anthropic(&["Hel", "lo", " world"], &["Friendly Greeting", "Goal: greet."]);

    let out = stdout_of(
        anchorchat(&prefs)
            .env("ANTHROPIC_API_KEY", "test-key")
            .env("ANTHROPIC_BASE_URL", &url)
            .arg("--local")
            .arg(&chats)
            .args(["chat", "Hi"]),
    );
    assert_eq!(out.trim_end(), "Hello world");

    let listing = stdout_of(anchorchat(&prefs).arg("--local").arg(&chats).arg("list"));
    assert!(listing.contains("Friendly Greeting"));
    let id = listing.split_whitespace().next().unwrap().to_string();

    let shown = stdout_of(
        anchorchat(&prefs)
            .arg("--local")
            .arg(&chats)
            .args(["show", &id]),
    );
    assert!(shown.contains("Goal: greet."));
    assert!(shown.contains("Hello world"));

    anchorchat(&prefs)
        .arg("--local")
        .arg(&chats)
        .args(["delete", &id])
        .assert()
        .success();
    assert!(!chats.join("anchorchat chats").join(format!("{id}.json")).exists());
}

#[test]
fn test_chat_without_api_key_fails() {
    let dir = tempdir().unwrap();
    anchorchat(&dir.path().join("prefs.toml"))
        .arg("--local")
        .arg(dir.path())
        .args(["chat", "Hi"])
        .assert()
        .failure();
}

#[test]
fn test_delete_refuses_reserved_documents() {
    let dir = tempdir().unwrap();
    let prefs = dir.path().join("prefs.toml");
    let chats = dir.path().join("chats");
    std::fs::create_dir(&chats).unwrap();

    stdout_of(
        anchorchat(&prefs)
            .arg("--local")
            .arg(&chats)
            .args(["settings", "--system-prompt", "Keep me"]),
    );

    for id in ["index", "settings"] {
        anchorchat(&prefs)
            .arg("--local")
            .arg(&chats)
            .args(["delete", id])
            .assert()
            .failure();
    }

    let working = chats.join("anchorchat chats");
    assert!(working.join("index.json").exists());
    assert!(
        std::fs::read_to_string(working.join("settings.json"))
            .unwrap()
            .contains("Keep me")
    );
}

#[test]
fn test_missing_local_directory_is_not_created() {
    let dir = tempdir().unwrap();
    let mistyped = dir.path().join("chtas");

    anchorchat(&dir.path().join("prefs.toml"))
        .arg("--local")
        .arg(&mistyped)
        .arg("list")
        .assert()
        .failure();
    assert!(!mistyped.exists());
}
