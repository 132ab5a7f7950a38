#![expect(clippy::expect_used, clippy::unwrap_used, clippy::print_stdout)]
use std::{net::SocketAddr, process::Stdio};

use reqwest::Response;
use tempfile::NamedTempFile;
use tokio::{
    io::AsyncBufReadExt,
    process::{Child, Command},
    sync::mpsc::UnboundedReceiver,
};

pub fn gateway_path() -> String {
    // Compatibility with 'cargo nextest archive': https://nexte.st/docs/ci-features/archiving/#making-tests-relocatable
    std::env::var("NEXTEST_BIN_EXE_gateway")
        .unwrap_or_else(|_| env!("CARGO_BIN_EXE_gateway").to_string())
}

pub async fn start_gateway_on_random_port(config_suffix: &str) -> ChildData {
    let config_str = format!(
        r#"
        [gateway]
        bind_address = "127.0.0.1:0"
        {config_suffix}
    "#
    );

    let config_file = NamedTempFile::new().unwrap();
    std::fs::write(config_file.path(), config_str).unwrap();

    let mut child = Command::new(gateway_path())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .args([
            "--config-file",
            config_file.path().to_str().unwrap(),
            "--log-format",
            "json",
        ])
        // Make sure we don't inherit `RUST_LOG` from the outer `cargo test/nextest` invocation
        .env_remove("RUST_LOG")
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let mut stdout = tokio::io::BufReader::new(child.stdout.take().unwrap()).lines();

    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(line) = stdout.next_line().await.unwrap() {
            println!("{line}");
            let _ = line_tx.send(line);
        }
    });

    let mut listening_line = None;
    let mut output = Vec::new();
    while let Some(line) = line_rx.recv().await {
        if line.contains("listening on 127.0.0.1:") {
            listening_line = Some(line.clone());
        }
        output.push(line.clone());
        if line.contains("{\"message\":\"└") {
            // We're done logging the startup message
            break;
        }
    }

    let port = listening_line
        .expect("Gateway exited before listening")
        .split_once("listening on 127.0.0.1:")
        .expect("Gateway didn't log listening line")
        .1
        .split('"')
        .next()
        .unwrap()
        .parse::<u16>()
        .unwrap();

    ChildData {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        output,
        stdout: line_rx,
        child,
        _config_file: config_file,
    }
}

#[expect(dead_code)] // Not all tests use all fields
pub struct ChildData {
    pub addr: SocketAddr,
    pub output: Vec<String>,
    pub stdout: UnboundedReceiver<String>,
    // This kills the child on drop
    pub child: Child,
    _config_file: NamedTempFile,
}

impl ChildData {
    pub async fn get(&self, path_and_query: &str) -> Response {
        reqwest::Client::new()
            .get(format!("http://{}{path_and_query}", self.addr))
            .send()
            .await
            .unwrap()
    }
}
