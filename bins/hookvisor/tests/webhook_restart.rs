//! Drives the real `hookvisor` binary: a signed push restarts the command,
//! SIGTERM shuts everything down.

#![cfg(unix)]

use hookvisor_trigger::WebhookSecret;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const SECRET: &str = "e2e-secret";
const SCRIPT: &str = "trap 'echo stopping; exit 0' TERM; echo started; while :; do sleep 0.05; done";

/// Kills the binary if a test bails out early.
struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn hookvisor(dir: &Path, port: u16, extra: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hookvisor"));
    cmd.current_dir(dir)
        .env_remove("HOOKVISOR_SECRET")
        .env("RUST_LOG", "debug")
        .args(["--address", &format!("127.0.0.1:{port}")])
        .args(["--shutdown-timeout", "2s"])
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

async fn wait_for_lines(path: &Path, needle: &str, count: usize) -> String {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.lines().filter(|l| *l == needle).count() >= count {
            return content;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {count} x {needle:?}: {content:?}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn wait_for_listener(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(15);
    while tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err() {
        assert!(Instant::now() < deadline, "server never started listening");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        assert!(Instant::now() < deadline, "hookvisor did not exit");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn post(port: u16, event: &str, body: &[u8], signature: Option<String>) -> (StatusCode, Bytes) {
    let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();

    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("http://127.0.0.1:{port}/webhook"))
        .header("content-type", "application/json")
        .header("x-github-event", event);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    let request = builder.body(Full::new(Bytes::copy_from_slice(body))).unwrap();

    let response = client.request(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn test_signed_push_restarts_command() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let stdout = dir.path().join("command.out");
    std::fs::write(&stdout, "from a previous run\n").unwrap();

    let child = hookvisor(
        dir.path(),
        port,
        &["--secret", SECRET, "--command", "/bin/sh", "--params", "-c", "--params", SCRIPT],
    )
    .spawn()
    .unwrap();
    let mut running = Running(child);

    wait_for_listener(port).await;
    wait_for_lines(&stdout, "started", 1).await;

    let secret = WebhookSecret::new(SECRET).unwrap();

    // Unsigned and off-branch deliveries are answered but change nothing.
    let body = br#"{"ref":"refs/heads/main","after":"feedface"}"#;
    let (status, reply) = post(port, "push", body, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.is_empty());

    let dev = br#"{"ref":"refs/heads/dev"}"#;
    let (status, _) = post(port, "push", dev, Some(secret.sign(dev))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, reply) = post(port, "push", body, Some(secret.sign(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply.is_empty());

    wait_for_lines(&stdout, "started", 2).await;

    let pid = Pid::from_raw(running.0.id() as i32);
    kill(pid, Signal::SIGTERM).unwrap();
    let status = wait_for_exit(&mut running.0).await;
    assert!(status.success(), "hookvisor exited with {status}");

    let content = std::fs::read_to_string(&stdout).unwrap();
    assert_eq!(
        content,
        "from a previous run\nstarted\nstopping\nstarted\nstopping\n"
    );
    assert!(dir.path().join("command.err").exists());
}

#[tokio::test]
async fn test_missing_secret_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = hookvisor(dir.path(), free_port(), &["--command", "/bin/sh"])
        .spawn()
        .unwrap();

    let status = wait_for_exit(&mut child).await;
    assert!(!status.success());
}

#[tokio::test]
async fn test_unlaunchable_command_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let child = hookvisor(
        dir.path(),
        free_port(),
        &["--secret", SECRET, "--command", "./does-not-exist"],
    )
    .spawn()
    .unwrap();
    let mut running = Running(child);

    let status = wait_for_exit(&mut running.0).await;
    assert!(!status.success());
}
