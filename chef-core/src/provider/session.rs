// chef-core/src/provider/session.rs
// One live provider process: an outbound line writer, a background line reader
// and the id-keyed map of requests still waiting for an answer.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chef_aio::shell_invocation;
use chef_common::error::{ChefError, Result};
use chef_common::model::ProviderRegistration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::{ProviderCommand, ProviderRequest, ProviderResponse, PROVIDER_FLAG};

type PendingTx = oneshot::Sender<Result<ProviderResponse>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Default)]
struct SessionState {
    closed: bool,
    pending: HashMap<String, PendingTx>,
}

struct Shared {
    provider: String,
    state: Mutex<SessionState>,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, line: &str) {
        let response: ProviderResponse = match serde_json::from_str(line) {
            Ok(response) => response,
            Err(e) => {
                debug!("[{}] Ignoring unparseable line: {}", self.provider, e);
                return;
            }
        };
        let Some(tx) = self.lock().pending.remove(&response.id) else {
            debug!(
                "[{}] Ignoring response for unknown request id {}",
                self.provider, response.id
            );
            return;
        };
        // The requester may have given up already.
        let _ = tx.send(Ok(response));
    }

    /// Moves the session to closed and fails everything still pending.
    fn close(&self) {
        let pending = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        debug!(
            "[{}] Provider session closed with {} pending request(s)",
            self.provider,
            pending.len()
        );
        for (_, tx) in pending {
            let _ = tx.send(Err(ChefError::ProviderSessionClosed(self.provider.clone())));
        }
        self.shutdown.cancel();
    }

    fn forget(&self, id: &str) {
        self.lock().pending.remove(id);
    }
}

pub struct ProviderSession {
    shared: Arc<Shared>,
    writer: AsyncMutex<BoxedWriter>,
}

impl ProviderSession {
    /// Starts a session over an already-open channel. When `child` is given,
    /// a non-zero exit closes the session and closing the session kills it.
    pub fn connect<R, W>(provider: &str, reader: R, writer: W, child: Option<Child>) -> Arc<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            provider: provider.to_string(),
            state: Mutex::new(SessionState::default()),
            shutdown: CancellationToken::new(),
        });

        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = reader_shared.shutdown.cancelled() => break,
                    line = lines.next_line() => line,
                };
                match next {
                    Ok(Some(line)) => reader_shared.dispatch(&line),
                    Ok(None) => {
                        debug!("[{}] Provider output ended", reader_shared.provider);
                        break;
                    }
                    Err(e) => {
                        warn!("[{}] Failed reading provider output: {}", reader_shared.provider, e);
                        break;
                    }
                }
            }
            reader_shared.close();
        });

        if let Some(child) = child {
            tokio::spawn(watch_child(Arc::clone(&shared), child));
        }

        Arc::new(Self {
            shared,
            writer: AsyncMutex::new(Box::new(writer)),
        })
    }

    /// Launches `<command> --chef` through the shell with piped stdio.
    pub fn spawn(registration: &ProviderRegistration) -> Result<Arc<Self>> {
        let line = format!("{} {}", registration.command, PROVIDER_FLAG);
        let (program, args) = shell_invocation(&line);
        debug!("[{}] Launching provider: {}", registration.name, line);

        let unreachable = |reason: String| ChefError::ProviderUnreachable(registration.name.clone(), reason);
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unreachable(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unreachable("provider stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| unreachable("provider stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            let name = registration.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}] stderr: {}", name, line);
                }
            });
        }

        Ok(Self::connect(&registration.name, stdout, stdin, Some(child)))
    }

    pub fn provider(&self) -> &str {
        &self.shared.provider
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn close(&self) {
        self.shared.close();
    }

    async fn send(&self, request: &ProviderRequest) -> Result<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Sends `command` and waits for the matching response line.
    ///
    /// If `cancel` fires first the pending entry is dropped, a best-effort
    /// `cancel` message is sent while the session is still open, and the call
    /// fails with [`ChefError::Cancelled`].
    pub async fn request(
        &self,
        command: ProviderCommand,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        if cancel.is_cancelled() {
            return Err(ChefError::Cancelled);
        }
        let provider = &self.shared.provider;
        let id = Uuid::new_v4().to_string();
        let label = command.label();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(ChefError::ProviderSessionClosed(provider.clone()));
            }
            state.pending.insert(id.clone(), tx);
        }

        debug!("[{}] -> {} ({})", provider, label, id);
        let request = ProviderRequest {
            id: id.clone(),
            command,
        };
        if let Err(e) = self.send(&request).await {
            warn!("[{}] Failed to write request: {}", provider, e);
            self.shared.forget(&id);
            self.shared.close();
            return Err(ChefError::ProviderUnreachable(provider.clone(), e.to_string()));
        }

        tokio::select! {
            biased;
            answer = rx => {
                let response = answer
                    .map_err(|_| ChefError::ProviderSessionClosed(provider.clone()))??;
                debug!("[{}] <- {} ({}) success={}", provider, label, id, response.success);
                Ok(response)
            }
            _ = cancel.cancelled() => {
                self.shared.forget(&id);
                if !self.is_closed() {
                    let cancel_request = ProviderRequest {
                        id: Uuid::new_v4().to_string(),
                        command: ProviderCommand::Cancel { target_id: id.clone() },
                    };
                    if let Err(e) = self.send(&cancel_request).await {
                        debug!("[{}] Could not deliver cancel for {}: {}", provider, id, e);
                    }
                }
                Err(ChefError::Cancelled)
            }
        }
    }
}

async fn watch_child(shared: Arc<Shared>, mut child: Child) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = shared.shutdown.cancelled() => None,
    };
    match exited {
        Some(Ok(status)) if status.success() => {
            debug!("[{}] Provider process exited", shared.provider);
        }
        Some(Ok(status)) => {
            warn!("[{}] Provider process exited with {}", shared.provider, status);
            shared.close();
        }
        Some(Err(e)) => {
            warn!("[{}] Failed waiting on provider process: {}", shared.provider, e);
            shared.close();
        }
        None => {
            if let Err(e) = child.kill().await {
                debug!("[{}] Provider process already gone: {}", shared.provider, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    /// Connects a session to an in-process provider that answers each request
    /// with `handler` and reports every request it saw.
    pub(crate) fn fake_session<F>(
        name: &str,
        handler: F,
    ) -> (Arc<ProviderSession>, mpsc::UnboundedReceiver<ProviderRequest>)
    where
        F: Fn(&ProviderRequest) -> Option<ProviderResponse> + Send + 'static,
    {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let session = ProviderSession::connect(name, our_read, our_write, None);
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (their_read, mut their_write) = tokio::io::split(theirs);
            let mut lines = BufReader::new(their_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(request) = serde_json::from_str::<ProviderRequest>(&line) else {
                    continue;
                };
                let reply = handler(&request);
                let _ = seen_tx.send(request);
                if let Some(response) = reply {
                    let mut out = serde_json::to_string(&response).unwrap();
                    out.push('\n');
                    if their_write.write_all(out.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        });
        (session, seen_rx)
    }

    #[tokio::test]
    async fn concurrent_requests_correlate_by_id_out_of_order() {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let session = ProviderSession::connect("p", our_read, our_write, None);

        // Answers the first two requests in reverse order, echoing the name.
        tokio::spawn(async move {
            let (their_read, mut their_write) = tokio::io::split(theirs);
            let mut lines = BufReader::new(their_read).lines();
            let mut held = Vec::new();
            while held.len() < 2 {
                let line = lines.next_line().await.unwrap().unwrap();
                held.push(serde_json::from_str::<ProviderRequest>(&line).unwrap());
            }
            for request in held.into_iter().rev() {
                let ProviderCommand::Remove { name } = &request.command else {
                    panic!("unexpected command");
                };
                let response =
                    ProviderResponse::ok(&request.id, None, Some(serde_json::json!(name)));
                let mut out = serde_json::to_string(&response).unwrap();
                out.push('\n');
                their_write.write_all(out.as_bytes()).await.unwrap();
            }
        });

        let token = CancellationToken::new();
        let (a, b) = tokio::join!(
            session.request(ProviderCommand::Remove { name: "a".into() }, &token),
            session.request(ProviderCommand::Remove { name: "b".into() }, &token),
        );
        assert_eq!(a.unwrap().data, Some(serde_json::json!("a")));
        assert_eq!(b.unwrap().data, Some(serde_json::json!("b")));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn stream_end_fails_pending_requests() {
        let (ours, theirs) = tokio::io::duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let session = ProviderSession::connect("p", our_read, our_write, None);

        tokio::spawn(async move {
            let (their_read, _their_write) = tokio::io::split(theirs);
            let mut lines = BufReader::new(their_read).lines();
            let _ = lines.next_line().await;
            // Dropping both halves ends the stream without answering.
        });

        let err = session
            .request(ProviderCommand::List, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChefError::ProviderSessionClosed(ref p) if p == "p"));
        assert!(session.is_closed());

        let again = session
            .request(ProviderCommand::List, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(again, ChefError::ProviderSessionClosed(_)));
    }

    #[tokio::test]
    async fn garbage_and_unknown_ids_are_ignored() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (our_read, our_write) = tokio::io::split(ours);
        let session = ProviderSession::connect("p", our_read, our_write, None);

        tokio::spawn(async move {
            let (their_read, mut their_write) = tokio::io::split(theirs);
            let mut lines = BufReader::new(their_read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let request: ProviderRequest = serde_json::from_str(&line).unwrap();
            let noise = "not json at all\n{\"id\":\"someone-else\",\"success\":true}\n{\"progress\":5}\n";
            their_write.write_all(noise.as_bytes()).await.unwrap();
            let mut out = serde_json::to_string(&ProviderResponse::ok(&request.id, Some("list"), None)).unwrap();
            out.push('\n');
            their_write.write_all(out.as_bytes()).await.unwrap();
            // Keep the stream open until the test is done with it.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let response = session
            .request(ProviderCommand::List, &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.kind.as_deref(), Some("list"));
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn cancellation_sends_cancel_for_the_original_id() {
        // Never answers anything.
        let (session, mut seen) = fake_session("p", |_| None);
        let token = CancellationToken::new();

        let call = {
            let session = Arc::clone(&session);
            let token = token.clone();
            tokio::spawn(async move {
                session
                    .request(
                        ProviderCommand::Update {
                            name: "tool".into(),
                            version: "2".into(),
                            force: false,
                        },
                        &token,
                    )
                    .await
            })
        };

        let original = seen.recv().await.unwrap();
        token.cancel();
        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(session.pending_count(), 0);

        let cancel = seen.recv().await.unwrap();
        assert_eq!(
            cancel.command,
            ProviderCommand::Cancel {
                target_id: original.id
            }
        );
    }

    #[tokio::test]
    async fn already_cancelled_token_sends_nothing() {
        let (session, mut seen) = fake_session("p", |_| None);
        let token = CancellationToken::new();
        token.cancel();
        let err = session.request(ProviderCommand::List, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(seen.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_provider_answers_list() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("provider.sh");
        std::fs::write(
            &script,
            r#"[ "$1" = "--chef" ] || exit 3
while read -r line; do
  id=$(printf '%s' "$line" | sed 's/^{"id":"\([^"]*\)".*/\1/')
  printf '{"id":"%s","type":"list","success":true,"data":[{"name":"tool","version":"","latestVersion":"1.0"}]}\n' "$id"
done
"#,
        )
        .unwrap();

        let session = ProviderSession::spawn(&ProviderRegistration {
            name: "sh".into(),
            command: format!("sh {}", script.display()),
        })
        .unwrap();
        let response = session
            .request(ProviderCommand::List, &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap()[0]["name"], "tool");
        session.close();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provider_exiting_with_failure_closes_the_session() {
        let session = ProviderSession::spawn(&ProviderRegistration {
            name: "broken".into(),
            command: "exit 3;".into(),
        })
        .unwrap();
        let err = session
            .request(ProviderCommand::List, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(!err.is_cancelled());
        assert!(matches!(
            err,
            ChefError::ProviderSessionClosed(_) | ChefError::ProviderUnreachable(_, _)
        ));
    }
}
