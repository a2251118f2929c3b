use super::{PlaybackDevice, PlayerEvent};
use crate::session::events::Event;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    sync::mpsc,
};

/// An mpv child process driven over its JSON IPC socket.
#[derive(Debug)]
pub struct MpvHandle {
    child: Child,
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    request_id: AtomicU64,
}

impl MpvHandle {
    pub async fn spawn(
        event_tx: mpsc::Sender<Event>,
        audio_device: Option<&str>,
        log_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let socket_path =
            std::env::temp_dir().join(format!("lingotune-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let mut cmd = Command::new("mpv");
        cmd.args([
            "--no-video",
            "--idle=yes",
            "--input-terminal=no",
            "--really-quiet",
            "--audio-channels=stereo",
        ]);
        if let Some(dev) = audio_device {
            cmd.arg(format!("--audio-device={dev}"));
        }
        if let Some(p) = log_file {
            cmd.arg(format!("--log-file={}", p.display()));
        }
        let child = cmd
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("spawn mpv")?;

        // mpv creates the socket shortly after starting.
        let stream = connect_with_retry(&socket_path).await?;
        let (reader, writer) = tokio::io::split(stream);

        tokio::spawn(read_events_loop(reader, event_tx));

        let this = Self {
            child,
            socket_path,
            writer: tokio::sync::Mutex::new(writer),
            request_id: AtomicU64::new(1),
        };

        this.command(json!({"command":["request_log_messages", "warn"]}))
            .await?;
        this.command(json!({"command":["observe_property", 1, "time-pos"]}))
            .await?;
        this.command(json!({"command":["observe_property", 2, "duration"]}))
            .await?;
        this.command(json!({"command":["observe_property", 3, "pause"]}))
            .await?;
        this.command(json!({"command":["observe_property", 4, "paused-for-cache"]}))
            .await?;

        Ok(this)
    }

    async fn command(&self, mut v: Value) -> anyhow::Result<()> {
        // Tag requests so failures come back as structured replies.
        if v.get("request_id").is_none() {
            let id = self.request_id.fetch_add(1, Ordering::Relaxed);
            if let Value::Object(ref mut o) = v {
                o.insert("request_id".to_string(), Value::from(id));
            }
        }
        let mut w = self.writer.lock().await;
        let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
        line.push(b'\n');
        w.write_all(&line).await.context("write mpv ipc")?;
        w.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

#[async_trait]
impl PlaybackDevice for MpvHandle {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.command(json!({"command":["loadfile", url, "replace"]}))
            .await?;
        self.command(json!({"command":["set_property", "pause", false]}))
            .await
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", true]}))
            .await
    }

    async fn resume(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", false]}))
            .await
    }

    async fn seek(&self, seconds: f64) -> anyhow::Result<()> {
        self.command(json!({"command":["seek", seconds.max(0.0), "absolute"]}))
            .await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["stop"]})).await
    }

    async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "volume", volume.min(100)]}))
            .await
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn connect_with_retry(path: &Path) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e).with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_events_loop(reader: tokio::io::ReadHalf<UnixStream>, event_tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        // Command replies: {"request_id":..., "error":"..."}. A rejected
        // command is not a media failure, so it is only logged.
        if let (Some(rid), Some(err)) = (v.get("request_id"), v.get("error").and_then(Value::as_str))
            && err != "success"
        {
            tracing::warn!(request_id = %rid, "mpv ipc error: {err}");
        }
        if let Some(pe) = map_mpv_event(&v)
            && event_tx.send(Event::Player(pe)).await.is_err()
        {
            break;
        }
    }
    tracing::debug!("mpv event stream closed");
}

fn map_mpv_event(v: &Value) -> Option<PlayerEvent> {
    match v.get("event")?.as_str()? {
        "property-change" => {
            let data = v.get("data")?;
            match v.get("name")?.as_str()? {
                "time-pos" => Some(PlayerEvent::Progress {
                    seconds: data.as_f64()?,
                }),
                "duration" => Some(PlayerEvent::Duration {
                    seconds: data.as_f64()?,
                }),
                "pause" => Some(if data.as_bool()? {
                    PlayerEvent::Paused
                } else {
                    PlayerEvent::Resumed
                }),
                "paused-for-cache" => Some(PlayerEvent::Buffering(data.as_bool()?)),
                _ => None,
            }
        }
        "file-loaded" => Some(PlayerEvent::Ready),
        "end-file" => match v.get("reason").and_then(Value::as_str).unwrap_or("") {
            "eof" => Some(PlayerEvent::Ended),
            "error" => {
                let err = v.get("file_error").or_else(|| v.get("error"));
                let err = err.and_then(Value::as_str).unwrap_or("unknown");
                Some(PlayerEvent::Error(format!("mpv end-file error: {err}")))
            }
            // stop/quit/redirect follow our own commands.
            _ => None,
        },
        "log-message" => {
            let level = v.get("level").and_then(Value::as_str).unwrap_or("info");
            let text = v.get("text").and_then(Value::as_str).unwrap_or("").trim();
            if !text.is_empty() {
                tracing::debug!(level, "mpv: {text}");
            }
            None
        }
        _ => None,
    }
}
