//! Shared utilities for integration tests.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use format_relay::config::{FormatterConfig, ServiceConfig};
use format_relay::lifecycle::{prepare, Shutdown};
use format_relay::HttpServer;

/// A running service on an ephemeral port. Stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the service with `config` on `127.0.0.1:0`.
pub async fn start_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(prepare(config).unwrap());
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, receiver).await.unwrap();
    });

    TestServer { addr, shutdown }
}

/// Config whose formatter is `/bin/sh -c <script>`.
pub fn script_config(script: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.formatter = FormatterConfig {
        program: "/bin/sh".into(),
        args: vec!["-c".into(), script.into(), "formatter".into()],
        ..FormatterConfig::default()
    };
    config
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Wait until a formatter script has written its pid to `path`.
#[allow(dead_code)]
pub async fn wait_for_pid(path: &std::path::Path) -> String {
    for _ in 0..250 {
        if let Ok(pid) = std::fs::read_to_string(path) {
            let pid = pid.trim();
            if !pid.is_empty() {
                return pid.to_string();
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("formatter never wrote {}", path.display());
}

/// Whether `pid` is a running process. Zombies count as gone.
#[cfg(target_os = "linux")]
#[allow(dead_code)]
pub fn process_running(pid: &str) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let state = stat.rsplit(')').next()?.split_whitespace().next()?;
            Some(state != "Z")
        })
        .unwrap_or(false)
}

/// Send a one-byte POST to `/` over a raw connection, without reading.
#[allow(dead_code)]
pub async fn raw_post(addr: SocketAddr) -> tokio::net::TcpStream {
    use tokio::io::AsyncWriteExt;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 1\r\n\r\nx")
        .await
        .unwrap();
    stream
}
