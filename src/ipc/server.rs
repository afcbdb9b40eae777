//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! dispatched actions to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::{Disposition, EngineMessage};
use crate::events::{ActionEvent, ActionSink, BroadcastSink};
use crate::input::{Edge, InputEvent, InputListener};
use crate::profile::DeviceProfile;
use crate::settings::{SettingValue, SettingsCache};
use crate::sysfs::{KernelControl, VibratorStrength};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};

/// Test pulse played after the vibrator strength changes
const STRENGTH_PREVIEW: Duration = Duration::from_millis(250);

/// Everything request handlers need from the rest of the daemon
pub struct ServerContext {
    pub profile: Arc<DeviceProfile>,
    pub engine_tx: mpsc::Sender<EngineMessage>,
    pub settings: Arc<SettingsCache>,
    pub actions: BroadcastSink,
    pub kernel: KernelControl,
    pub vibrator: VibratorStrength,
    pub vibrator_present: bool,
    pub proximity_gate: bool,
    pub listener: Option<Arc<InputListener>>,
    pub started: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, context: Arc<ServerContext>) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = Arc::clone(&self.context);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// Requests are answered in order. Responses and notifications share one
    /// writer task so frames never interleave. Helper tasks live in a
    /// `JoinSet` and are aborted when the connection ends.
    async fn handle_client(stream: UnixStream, context: Arc<ServerContext>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(32);
        let mut tasks = JoinSet::new();

        tasks.spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(?e, "client write failed");
                    break;
                }
            }
        });

        let mut is_subscribed = false;

        loop {
            let Some(body) = read_frame(&mut reader).await? else {
                debug!("client disconnected");
                return Ok(());
            };

            let response = match serde_json::from_slice::<Request>(&body) {
                Ok(Request::Subscribe) => {
                    if !is_subscribed {
                        is_subscribed = true;
                        tasks.spawn(forward_actions(
                            context.actions.subscribe(),
                            frame_tx.clone(),
                        ));
                        debug!("client subscribed to notifications");
                    }
                    Response::Subscribed
                }
                Ok(request) => {
                    debug!(?request, "received request");
                    Self::process_request(request, &context).await
                }
                Err(e) => {
                    warn!(?e, "failed to parse request");
                    Response::error("bad_request", e.to_string())
                }
            };

            let frame = serde_json::to_vec(&response).context("failed to encode response")?;
            if frame_tx.send(frame).await.is_err() {
                debug!("client writer closed");
                return Ok(());
            }
        }
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &ServerContext) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => Response::Status(Self::status(context)),

            Request::Subscribe => Response::Subscribed,

            Request::InjectKey { scancode, edge } => {
                Self::inject_key(context, scancode, edge).await
            }

            Request::GetSettings => Response::Settings {
                values: context.settings.store().entries(),
                resolved: context.settings.get().as_ref().clone(),
            },

            Request::PutSetting { key, value } => Self::put_setting(context, &key, value),

            Request::ReloadSettings => match context.settings.store().reload() {
                Ok(()) => {
                    context.settings.on_external_change();
                    info!("settings reloaded via IPC");
                    Response::Ok
                }
                Err(e) => Response::error("settings_read", e.to_string()),
            },

            Request::GetVibratorStrength => {
                if !context.vibrator.is_supported() {
                    return Response::error("unsupported", "vibrator strength is not supported");
                }
                match context.vibrator.get() {
                    Ok(level) => Self::strength(level),
                    Err(e) => Response::error("sysfs", e.to_string()),
                }
            }

            Request::SetVibratorStrength { level } => {
                match context.vibrator.set(level, context.settings.store().as_ref()) {
                    Ok(level) => {
                        if context.vibrator_present {
                            context.actions.clone().vibrate(STRENGTH_PREVIEW);
                        }
                        Self::strength(level)
                    }
                    Err(e) => Response::error("sysfs", e.to_string()),
                }
            }

            Request::SetGesturesEnabled { enabled } => match context.kernel.enable_gestures(enabled)
            {
                Ok(nodes) => Response::GesturesEnabled { enabled, nodes },
                Err(e) => Response::error("sysfs", e.to_string()),
            },
        }
    }

    fn status(context: &ServerContext) -> DaemonStatus {
        DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            profile: context.profile.kind.to_string(),
            uptime_secs: context.started.elapsed().as_secs(),
            input_listener: context
                .listener
                .as_ref()
                .is_some_and(|listener| listener.is_running()),
            proximity_gate: context.proximity_gate,
            vibrator: context.vibrator_present,
            vibrator_strength_supported: context.vibrator.is_supported(),
            touchscreen_gestures: context.kernel.has_touchscreen_gestures(),
            arrow_up_supported: context.kernel.is_arrow_up_supported(),
        }
    }

    async fn inject_key(context: &ServerContext, scancode: u16, edge: Edge) -> Response {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = EngineMessage::Input {
            event: InputEvent::new(scancode, edge, timestamp_ms),
            reply: Some(reply_tx),
        };

        if context.engine_tx.send(message).await.is_err() {
            return Response::error("engine_unavailable", "dispatch engine is not running");
        }

        match reply_rx.await {
            Ok(disposition) => Response::KeyHandled {
                consumed: disposition == Disposition::Consumed,
                disposition,
            },
            Err(_) => Response::error("engine_unavailable", "dispatch engine dropped the key"),
        }
    }

    fn put_setting(context: &ServerContext, key: &str, value: SettingValue) -> Response {
        if let Err(e) = context.settings.store().put(key, value) {
            return Response::error("settings_write", e.to_string());
        }
        context.settings.on_external_change();
        info!(key, "setting changed via IPC");
        Response::Ok
    }

    fn strength(level: u32) -> Response {
        Response::VibratorStrength {
            level,
            min: VibratorStrength::MIN,
            max: VibratorStrength::MAX,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Push dispatched actions to one subscribed client
async fn forward_actions(
    mut action_rx: broadcast::Receiver<ActionEvent>,
    frame_tx: mpsc::Sender<Vec<u8>>,
) {
    loop {
        let action = match action_rx.recv().await {
            Ok(action) => action,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "action subscriber lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let frame = match serde_json::to_vec(&Notification::Action { action }) {
            Ok(frame) => frame,
            Err(e) => {
                error!(?e, "failed to encode notification");
                continue;
            }
        };

        if frame_tx.send(frame).await.is_err() {
            break;
        }
    }
}

/// Read one length-prefixed frame; `None` on clean EOF or an oversized frame
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        warn!(len, "message too large, disconnecting");
        return Ok(None);
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("failed to read message body")?;
    Ok(Some(body))
}

/// Send a length-prefixed frame
async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).context("frame too large")?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(body).await?;
    Ok(())
}
