//! Backend subprocess lifecycle: spawn, readiness handshake, stop.
//!
//! The shell owns the backend: spawned at startup, output forwarded to
//! the log under the "backend" target, killed when the host exits.
//! Readiness is an explicit health poll rather than a fixed delay.

use crate::config::BackendConfig;
use anyhow::{Context, Result};
use std::io::BufRead;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PROBE_TIMEOUT: Duration = Duration::from_millis(800);

/// Handle to the spawned backend process. Killed on drop so the backend
/// never outlives the shell.
pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    /// Spawn the backend with piped output. Stdout and stderr lines are
    /// forwarded line-by-line to the log.
    pub fn spawn(backend: &BackendConfig) -> Result<Self> {
        let mut child = Command::new(&backend.command)
            .args(&backend.args)
            .arg("--port")
            .arg(backend.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning backend {}", backend.command))?;
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr);
        }
        log::info!("backend started: {} (port {})", backend.command, backend.port);
        Ok(Self { child })
    }

    /// True while the subprocess has not exited.
    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    pub fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for BackendProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn forward_lines(reader: impl std::io::Read + Send + 'static) {
    std::thread::spawn(move || {
        let reader = std::io::BufReader::new(reader);
        for line in reader.lines() {
            match line {
                Ok(l) => log::info!(target: "backend", "{}", l),
                Err(_) => break,
            }
        }
    });
}

/// True if something already accepts connections on the backend address
/// (a backend left running by another host, for example).
pub fn probe(host: &str, port: u16) -> bool {
    use std::net::ToSocketAddrs;
    let Ok(mut addrs) = (host.trim(), port).to_socket_addrs() else {
        return false;
    };
    addrs
        .next()
        .map(|addr| std::net::TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok())
        .unwrap_or(false)
}

/// Poll the backend health endpoint until it reports running or the
/// readiness deadline passes.
pub async fn wait_ready(backend: &BackendConfig) -> Result<()> {
    let url = format!("http://{}:{}/", backend.host.trim(), backend.port);
    let client = reqwest::Client::new();
    let deadline = Instant::now() + Duration::from_millis(backend.readiness_timeout_ms);
    let mut last_err: Option<String> = None;

    while Instant::now() < deadline {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<serde_json::Value>().await {
                    Ok(json)
                        if json.get("runtime").and_then(|v| v.as_str()) == Some("running") =>
                    {
                        log::info!("backend ready at {}", url);
                        return Ok(());
                    }
                    Ok(_) => last_err = Some("health payload not running yet".to_string()),
                    Err(e) => last_err = Some(e.to_string()),
                }
            }
            Ok(resp) => last_err = Some(format!("health returned {}", resp.status())),
            Err(e) => last_err = Some(e.to_string()),
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }

    anyhow::bail!(
        "backend not ready within {}ms{}",
        backend.readiness_timeout_ms,
        last_err
            .map(|e| format!(" (last error: {})", e))
            .unwrap_or_default()
    )
}
