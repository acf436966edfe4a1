//! Integration tests for the wire protocol and session behavior.
//!
//! Each test boots a daemon on a socket in a fresh temp directory, talks
//! single-line JSON over `UnixStream`, and checks the response object.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::watch;

use shellward_daemon::Daemon;
use shellward_guard::RuleSet;
use shellward_pipeline::{
    CollaboratorError, Fixer, Pipeline, PipelineConfig, Translation, Translator,
};
use shellward_session::SessionSnapshot;
use shellward_types::{DaemonConfig, PipelineResponse};

/// Collaborator answering with a fixed command after an optional delay.
struct Canned {
    command: Option<&'static str>,
    explanation: &'static str,
    delay: Duration,
}

impl Canned {
    fn answering(command: &'static str, explanation: &'static str) -> Arc<Self> {
        Arc::new(Self {
            command: Some(command),
            explanation,
            delay: Duration::ZERO,
        })
    }

    fn slow(command: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            command: Some(command),
            explanation: "",
            delay,
        })
    }

    fn declining() -> Arc<Self> {
        Arc::new(Self {
            command: None,
            explanation: "nothing to offer",
            delay: Duration::ZERO,
        })
    }

    async fn respond(&self) -> Result<Option<Translation>, CollaboratorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.command.map(|c| Translation {
            command: c.into(),
            explanation: self.explanation.into(),
        }))
    }
}

#[async_trait]
impl Translator for Canned {
    async fn translate(
        &self,
        _intent: &str,
        _ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        self.respond().await
    }
}

#[async_trait]
impl Fixer for Canned {
    async fn suggest_fix(
        &self,
        _command: &str,
        _stderr_tail: &str,
        _intent: Option<&str>,
        _ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        self.respond().await
    }
}

struct TestDaemon {
    socket: PathBuf,
    shutdown: watch::Sender<bool>,
    _dir: tempfile::TempDir,
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn start_daemon(
    queue_depth: usize,
    translator: Arc<dyn Translator>,
    fixer: Arc<dyn Fixer>,
) -> TestDaemon {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket = dir.path().join("shellward.sock");
    let config = DaemonConfig {
        socket_path: socket.clone(),
        queue_depth,
        collaborator_timeout_secs: 5,
        ..DaemonConfig::default()
    };
    let pipeline = Pipeline::new(
        RuleSet::builtin().unwrap(),
        translator,
        fixer,
        PipelineConfig::from(&config),
    );
    let daemon = Arc::new(Daemon::new(config, pipeline));
    let (tx, rx) = watch::channel(false);
    tokio::spawn(daemon.run(rx));

    // Wait for the socket to appear.
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(socket.exists(), "daemon did not bind its socket");

    TestDaemon {
        socket,
        shutdown: tx,
        _dir: dir,
    }
}

/// One request/response exchange, raw line in, typed response out.
async fn exchange_raw(socket: &Path, line: &str) -> PipelineResponse {
    let mut stream = UnixStream::connect(socket).await.expect("connect");
    stream
        .write_all(format!("{line}\n").as_bytes())
        .await
        .expect("write");
    let (reader, _writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();
    let reply = lines
        .next_line()
        .await
        .expect("read")
        .expect("daemon closed without a response");
    serde_json::from_str(&reply).expect("response should be valid JSON")
}

async fn exchange(socket: &Path, request: serde_json::Value) -> PipelineResponse {
    exchange_raw(socket, &request.to_string()).await
}

#[tokio::test]
async fn scenario_a_safe_preexec_proceeds_unchanged() {
    let d = start_daemon(4, Canned::declining(), Canned::declining()).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "sl", "cwd": "/home/u"}),
    )
    .await;
    assert_eq!(
        resp,
        PipelineResponse::Proceed {
            command: "sl".into(),
            require_confirmation: false,
            danger_reasons: vec![],
        }
    );
}

#[tokio::test]
async fn scenario_b_failed_command_gets_suggest_fix() {
    let fixer = Canned::answering("ls", "sl is not installed; you likely meant ls");
    let d = start_daemon(4, Canned::declining(), fixer).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({
            "event": "postexec",
            "session": "s1",
            "cmd": "sl",
            "exit_code": 127,
            "stderr_tail": "sl: command not found",
        }),
    )
    .await;
    match resp {
        PipelineResponse::SuggestFix {
            suggested_command, ..
        } => assert_eq!(suggested_command, "ls"),
        other => panic!("expected suggest_fix, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_c_dangerous_preexec_requires_confirmation() {
    let d = start_daemon(4, Canned::declining(), Canned::declining()).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "rm -rf /"}),
    )
    .await;
    match resp {
        PipelineResponse::Proceed {
            command,
            require_confirmation,
            danger_reasons,
        } => {
            assert_eq!(command, "rm -rf /");
            assert!(require_confirmation);
            assert_eq!(danger_reasons, vec!["recursive delete from root"]);
        }
        other => panic!("expected proceed, got {other:?}"),
    }
}

#[tokio::test]
async fn successful_postexec_is_a_noop() {
    let d = start_daemon(4, Canned::declining(), Canned::answering("unused", "")).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({
            "event": "postexec",
            "session": "s1",
            "cmd": "ls",
            "exit_code": 0,
        }),
    )
    .await;
    assert_eq!(resp, PipelineResponse::None {});
}

#[tokio::test]
async fn directive_line_is_translated() {
    let translator = Canned::answering("ls -a /etc", "lists hidden files in /etc");
    let d = start_daemon(4, translator, Canned::declining()).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({
            "event": "preexec",
            "session": "s1",
            "cmd": "/e list only hidden files in /etc",
        }),
    )
    .await;
    match resp {
        PipelineResponse::Replace {
            command,
            require_confirmation,
            ..
        } => {
            assert_eq!(command, "ls -a /etc");
            assert!(!require_confirmation);
        }
        other => panic!("expected replace, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_request_gets_a_diagnostic_message() {
    let d = start_daemon(4, Canned::declining(), Canned::declining()).await;
    let resp = exchange_raw(&d.socket, "{not json at all").await;
    match resp {
        PipelineResponse::Message { message } => {
            assert!(message.contains("invalid request"), "{message}");
        }
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_event_gets_a_diagnostic_message() {
    let d = start_daemon(4, Canned::declining(), Canned::declining()).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "telepathy", "session": "s1", "cmd": "ls"}),
    )
    .await;
    assert!(matches!(resp, PipelineResponse::Message { .. }));
}

#[tokio::test]
async fn same_session_contention_answers_busy_when_queue_is_full() {
    let translator = Canned::slow("ls", Duration::from_millis(500));
    let d = start_daemon(0, translator, Canned::declining()).await;

    let socket = d.socket.clone();
    let first = tokio::spawn(async move {
        exchange(
            &socket,
            serde_json::json!({"event": "preexec", "session": "s1", "cmd": "/e slow request"}),
        )
        .await
    });
    // Let the first request take the in-flight guard.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = exchange(
        &d.socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "pwd"}),
    )
    .await;
    match second {
        PipelineResponse::Message { message } => {
            assert!(message.contains("busy"), "{message}");
        }
        other => panic!("expected busy message, got {other:?}"),
    }

    let first = first.await.unwrap();
    assert!(matches!(first, PipelineResponse::Replace { .. }), "{first:?}");
}

#[tokio::test]
async fn distinct_sessions_are_not_serialized() {
    let translator = Canned::slow("ls", Duration::from_millis(300));
    let d = start_daemon(0, translator, Canned::declining()).await;

    let socket = d.socket.clone();
    let other = tokio::spawn(async move {
        exchange(
            &socket,
            serde_json::json!({"event": "preexec", "session": "a", "cmd": "/e slow"}),
        )
        .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Session b is evaluated while a's request is still in flight.
    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "preexec", "session": "b", "cmd": "pwd"}),
    )
    .await;
    assert!(matches!(resp, PipelineResponse::Proceed { .. }), "{resp:?}");

    let other = other.await.unwrap();
    assert!(matches!(other, PipelineResponse::Replace { .. }));
}

#[tokio::test]
async fn replan_state_survives_reconnects() {
    // The session remembers the pending candidate between connections.
    let translator = Canned::answering("find /var/log -name '*.log' -mtime +30 -delete", "scoped");
    let d = start_daemon(4, translator, Canned::declining()).await;

    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "rm -rf /"}),
    )
    .await;
    assert!(resp.requires_confirmation());

    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "feedback", "session": "s1", "feedback": "only old logs"}),
    )
    .await;
    match resp {
        PipelineResponse::Replace {
            command,
            require_confirmation,
            ..
        } => {
            assert_eq!(command, "find /var/log -name '*.log' -mtime +30 -delete");
            assert!(!require_confirmation);
        }
        other => panic!("expected replace, got {other:?}"),
    }
}

#[tokio::test]
async fn feedback_without_pending_candidate_is_a_message() {
    let d = start_daemon(4, Canned::declining(), Canned::declining()).await;
    let resp = exchange(
        &d.socket,
        serde_json::json!({"event": "feedback", "session": "fresh", "feedback": "safer"}),
    )
    .await;
    assert!(matches!(resp, PipelineResponse::Message { .. }));
}

#[tokio::test]
async fn collaborator_timeout_releases_the_session() {
    let translator = Canned::slow("ls", Duration::from_secs(60));
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("shellward.sock");
    let config = DaemonConfig {
        socket_path: socket.clone(),
        collaborator_timeout_secs: 1,
        ..DaemonConfig::default()
    };
    let pipeline = Pipeline::new(
        RuleSet::builtin().unwrap(),
        translator,
        Canned::declining(),
        PipelineConfig::from(&config),
    );
    let daemon = Arc::new(Daemon::new(config, pipeline));
    let (tx, rx) = watch::channel(false);
    tokio::spawn(daemon.run(rx));
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let resp = exchange(
        &socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "/e slow"}),
    )
    .await;
    match resp {
        PipelineResponse::Message { message } => {
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("expected timeout message, got {other:?}"),
    }

    // The in-flight guard was released: the session still answers.
    let resp = exchange(
        &socket,
        serde_json::json!({"event": "preexec", "session": "s1", "cmd": "pwd"}),
    )
    .await;
    assert!(matches!(resp, PipelineResponse::Proceed { .. }), "{resp:?}");
    let _ = tx.send(true);
}
