//! Audio backend abstraction: the mixer drives three independent streams
//! (noise/music/overlay) through this trait, never touching a concrete
//! player process directly. The shipped implementation drives `mpv` over
//! its JSON IPC socket, one process per stream, grounded in the same
//! request/reply-over-a-socket shape used by `radio-daemon`'s mpv driver.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// One audio stream: load/stop/volume/seek plus an end-of-file subscription.
#[async_trait]
pub trait AudioStream: Send + Sync {
    async fn load_file(&self, path: &str) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
    async fn set_volume(&self, vol_0_100: u8) -> anyhow::Result<()>;
    async fn seek_absolute(&self, position_s: f64) -> anyhow::Result<()>;
    async fn duration(&self) -> anyhow::Result<Option<f64>>;
    fn subscribe_end_of_file(&self) -> broadcast::Receiver<()>;
}

/// Owns the three named streams the mixer needs.
pub trait AudioBackend: Send + Sync {
    fn noise(&self) -> Arc<dyn AudioStream>;
    fn music(&self) -> Arc<dyn AudioStream>;
    fn overlay(&self) -> Arc<dyn AudioStream>;
}

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// A single mpv process talking JSON-IPC over a Unix domain socket.
pub struct MpvStream {
    tx: mpsc::Sender<PendingRequest>,
    eof_tx: broadcast::Sender<()>,
    _process: tokio::process::Child,
}

impl MpvStream {
    pub async fn spawn(socket_path: &std::path::Path, audio_device: &str, initial_volume: u8) -> anyhow::Result<Self> {
        let _ = tokio::fs::remove_file(socket_path).await;

        let child = tokio::process::Command::new("mpv")
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg(format!("--audio-device={audio_device}"))
            .arg(format!("--volume={initial_volume}"))
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear at {}", socket_path.display());
        }

        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
        let (eof_tx, _) = broadcast::channel(16);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(reader, pending, eof_tx.clone()));

        Ok(Self {
            tx: cmd_tx,
            eof_tx,
            _process: child,
        })
    }

    async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut payload = serde_json::to_string(&msg)?;
        payload.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest { req_id, payload, reply: reply_tx })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={req_id}"))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={req_id}"))?
    }
}

#[async_trait]
impl AudioStream for MpvStream {
    async fn load_file(&self, path: &str) -> anyhow::Result<()> {
        self.send(json!(["loadfile", path, "replace"])).await?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let _ = self.send(json!(["stop"])).await;
        Ok(())
    }

    async fn set_volume(&self, vol_0_100: u8) -> anyhow::Result<()> {
        self.send(json!(["set_property", "volume", vol_0_100])).await?;
        Ok(())
    }

    async fn seek_absolute(&self, position_s: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", position_s, "absolute", "exact"])).await?;
        Ok(())
    }

    async fn duration(&self) -> anyhow::Result<Option<f64>> {
        match self.send(json!(["get_property", "duration"])).await {
            Ok(resp) => Ok(resp.get("data").and_then(|v| v.as_f64())),
            Err(_) => Ok(None),
        }
    }

    fn subscribe_end_of_file(&self) -> broadcast::Receiver<()> {
        self.eof_tx.subscribe()
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>,
    eof_tx: broadcast::Sender<()>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            Err(anyhow::anyhow!("mpv error: {err}"))
                        };
                        let _ = tx.send(result);
                    }
                } else if val.get("event").and_then(|v| v.as_str()) == Some("end-file") {
                    let _ = eof_tx.send(());
                }
            }
            Err(e) => {
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {e}")));
                }
                break;
            }
        }
    }
}

async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        if writer.write_all(req.payload.as_bytes()).await.is_err() {
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error")));
            }
            break;
        }
    }
}

/// Backend that spawns one `mpv --idle` process per stream, each with its
/// own IPC socket under a temp/work directory.
pub struct MpvBackend {
    noise: Arc<MpvStream>,
    music: Arc<MpvStream>,
    overlay: Arc<MpvStream>,
}

impl MpvBackend {
    pub async fn spawn(socket_dir: &std::path::Path, audio_device: &str) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(socket_dir).await?;
        let noise = MpvStream::spawn(&socket_path(socket_dir, "noise"), audio_device, 0).await?;
        let music = MpvStream::spawn(&socket_path(socket_dir, "music"), audio_device, 0).await?;
        let overlay = MpvStream::spawn(&socket_path(socket_dir, "overlay"), audio_device, 0).await?;
        Ok(Self {
            noise: Arc::new(noise),
            music: Arc::new(music),
            overlay: Arc::new(overlay),
        })
    }
}

fn socket_path(dir: &std::path::Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.sock"))
}

impl AudioBackend for MpvBackend {
    fn noise(&self) -> Arc<dyn AudioStream> {
        self.noise.clone()
    }

    fn music(&self) -> Arc<dyn AudioStream> {
        self.music.clone()
    }

    fn overlay(&self) -> Arc<dyn AudioStream> {
        self.overlay.clone()
    }
}
