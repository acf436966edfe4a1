//! Unix domain socket server.
//!
//! Single-line JSON in, single-line JSON out, one exchange per connection.
//! The socket is filesystem-secured (0o600); malformed input is answered
//! with a diagnostic message response, never a crash or a silent drop.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use shellward_pipeline::Pipeline;
use shellward_session::SessionRegistry;
use shellward_types::{CommandRequest, DaemonConfig, PipelineResponse, ShellwardError};

/// Maximum allowed length of an incoming request line (1 MB).
/// Prevents memory exhaustion from malicious or buggy clients.
const MAX_LINE_LENGTH: u64 = 1024 * 1024;

/// The session daemon: socket config, session registry, and pipeline.
pub struct Daemon {
    config: DaemonConfig,
    registry: SessionRegistry,
    pipeline: Pipeline,
}

impl Daemon {
    pub fn new(config: DaemonConfig, pipeline: Pipeline) -> Self {
        let registry = SessionRegistry::new(config.history_capacity);
        Self {
            config,
            registry,
            pipeline,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Bind the socket and serve until `shutdown` signals.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ShellwardError> {
        let socket_path = self.config.socket_path.clone();
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Remove a stale socket; ignore NotFound to avoid a TOCTOU race.
        match std::fs::remove_file(&socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(&socket_path)?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;
        info!(path = %socket_path.display(), "shellward daemon listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let daemon = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = daemon.handle_connection(stream).await {
                                    debug!("connection ended: {e}");
                                }
                            });
                        }
                        Err(e) => warn!("accept error: {e}"),
                    }
                }
                _ = shutdown.wait_for(|&v| v) => {
                    info!("shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&socket_path);
        Ok(())
    }

    /// Service one connection: one request line, one response line.
    async fn handle_connection(&self, stream: UnixStream) -> Result<(), ShellwardError> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader.take(MAX_LINE_LENGTH)).lines();

        let Some(line) = lines.next_line().await? else {
            debug!("client closed without sending a request");
            return Ok(());
        };

        let response = match serde_json::from_str::<CommandRequest>(line.trim()) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "malformed request");
                PipelineResponse::message(format!("invalid request: {e}"))
            }
        };

        let mut json = serde_json::to_string(&response)
            .map_err(|e| ShellwardError::Protocol(e.to_string()))?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Route a request through its session and the pipeline.
    ///
    /// Acquires the session's in-flight guard (queuing up to the configured
    /// depth, otherwise answering busy) and holds it for the whole
    /// evaluation; the guard drops on every exit path.
    pub async fn dispatch(&self, request: CommandRequest) -> PipelineResponse {
        let session_id = request.session().clone();
        let handle = self.registry.lookup_or_create(&session_id);

        let mut session = match handle.acquire(self.config.queue_depth).await {
            Ok(guard) => guard,
            Err(ShellwardError::SessionBusy) => {
                info!(session = %session_id, "session busy");
                return PipelineResponse::message(
                    "session busy: another command is being evaluated; retry shortly",
                );
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "failed to acquire session");
                return PipelineResponse::message(format!("internal error: {e}"));
            }
        };

        debug!(session = %session_id, event = %request.kind(), "evaluating request");
        self.pipeline.handle(&mut session, request).await
    }

    /// Number of sessions seen so far.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}
