#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use nestexec::server::{Registry, Server, ServerConfig};

struct TestServer {
    addr: String,
    registry: Arc<Registry>,
}

fn start_server() -> TestServer {
    let server =
        Server::bind(ServerConfig::with_addr("127.0.0.1:0")).expect("server should bind");
    let addr = server.local_addr().to_string();
    let registry = Arc::clone(server.registry());
    server.spawn().expect("accept loop should start");
    TestServer { addr, registry }
}

fn nestexec(addr: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nestexec"));
    cmd.env_remove("NESTEXEC_LOG")
        .arg("--log-level")
        .arg("error")
        .env("NESTEXEC_ADDR", addr)
        .stdin(Stdio::null());
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("nestexec should run")
}

fn unused_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("probe should bind");
    listener
        .local_addr()
        .expect("probe should have an address")
        .to_string()
}

#[test]
fn exec_prints_container_stdout() {
    let server = start_server();

    let out = run(nestexec(&server.addr).args(["exec", "cli-echo", "echo", "hi"]));

    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(out.stdout, b"hi\n");
}

#[test]
fn exec_keeps_stderr_separate() {
    let server = start_server();

    let out = run(nestexec(&server.addr).args([
        "exec",
        "cli-stderr",
        "sh",
        "-c",
        "echo out; echo err >&2",
    ]));

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout, b"out\n");
    assert!(String::from_utf8_lossy(&out.stderr).contains("err\n"));
}

#[test]
fn interactive_exec_forwards_stdin() {
    let server = start_server();

    let mut child = nestexec(&server.addr)
        .args(["exec", "-i", "cli-cat", "cat"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("nestexec should start");
    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        stdin.write_all(b"hello\n").expect("stdin should accept input");
    }
    let out = child.wait_with_output().expect("nestexec should finish");

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout, b"hello\n");
}

#[test]
fn list_prints_live_ids() {
    let server = start_server();
    let mut held = server
        .registry
        .launch("cli-held", "sleep", &["5".to_string()])
        .expect("launch should succeed");

    let plain = run(nestexec(&server.addr).args(["list", "--format", "plain"]));
    assert_eq!(plain.status.code(), Some(0));
    assert_eq!(plain.stdout, b"cli-held\n");

    let json = run(nestexec(&server.addr).args(["list", "--format", "json"]));
    assert_eq!(json.status.code(), Some(0));
    let value: serde_json::Value =
        serde_json::from_slice(&json.stdout).expect("list output should be json");
    assert_eq!(value["count"], 1);
    assert_eq!(value["containers"][0], "cli-held");

    let _ = held.kill();
    let _ = held.wait();
}

#[test]
fn exec_with_taken_id_exits_with_conflict() {
    let server = start_server();
    let mut held = server
        .registry
        .launch("cli-busy", "sleep", &["5".to_string()])
        .expect("launch should succeed");

    let out = run(nestexec(&server.addr).args(["exec", "cli-busy", "echo", "hi"]));

    assert_eq!(out.status.code(), Some(10));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("already exists"));

    let _ = held.kill();
    let _ = held.wait();
}

#[test]
fn attach_to_unknown_container_exits_not_found() {
    let server = start_server();

    let out = run(nestexec(&server.addr).args(["attach", "cli-missing"]));

    assert_eq!(out.status.code(), Some(11));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not found"));
}

#[test]
fn unreachable_server_exits_with_transport_error() {
    let addr = unused_addr();

    let out = run(nestexec(&addr).args(["list", "--format", "plain"]));

    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn addr_flag_overrides_env() {
    let server = start_server();

    let out = run(nestexec(&unused_addr()).args([
        "list",
        "--format",
        "plain",
        "--addr",
        &server.addr,
    ]));

    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn usage_errors_exit_64() {
    let out = run(nestexec("127.0.0.1:1").args(["exec", "only-id"]));
    assert_eq!(out.status.code(), Some(64));

    let out = run(nestexec("127.0.0.1:1").arg("frobnicate"));
    assert_eq!(out.status.code(), Some(64));
}
