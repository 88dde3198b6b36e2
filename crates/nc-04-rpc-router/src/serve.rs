//! # Session Serve Loop
//!
//! Reads frames from one session's transport and dispatches RPCs on a shared,
//! bounded worker pool. Handlers for different requests may run at the same
//! time, but replies are written in the order the requests arrived.
//!
//! A streaming request (one whose handler writes on the session channel
//! itself) first waits for every earlier reply to be written, so its
//! acknowledgement cannot overtake them.
//!
//! Pool slots are async permits, not threads: a handler waiting on a lock or
//! on I/O holds a permit but no worker thread.

use crate::router::{Completion, RpcRouter};
use futures::future::BoxFuture;
use futures::stream::FuturesOrdered;
use futures::StreamExt;
use nc_03_session::{
    CloseReason, EstablishedSession, InFlightGuard, Session, SessionManager, TransportError,
};
use shared_types::{RpcError, RpcReply, RpcRequest, WireMessage};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

/// Bounded set of concurrently executing handler tasks.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently running a task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot, then run `task` on it.
    pub async fn spawn<F>(&self, task: F) -> Result<JoinHandle<F::Output>, PoolClosed>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;
        Ok(tokio::spawn(async move {
            let _permit = permit;
            task.await
        }))
    }

    /// Refuse further work.
    pub fn close(&self) {
        self.permits.close();
    }
}

type Pending = BoxFuture<'static, (String, Result<Completion, JoinError>, InFlightGuard)>;

/// Serves established sessions until they close.
#[derive(Clone)]
pub struct SessionServer {
    router: Arc<RpcRouter>,
    manager: Arc<SessionManager>,
    pool: WorkerPool,
}

impl SessionServer {
    pub fn new(router: Arc<RpcRouter>, manager: Arc<SessionManager>, pool: WorkerPool) -> Self {
        Self {
            router,
            manager,
            pool,
        }
    }

    pub fn router(&self) -> &Arc<RpcRouter> {
        &self.router
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run the session's read loop. Returns once the session is closed.
    pub async fn serve(&self, established: EstablishedSession) {
        let EstablishedSession {
            session,
            mut reader,
        } = established;
        let id = session.id();
        let mut pending: FuturesOrdered<Pending> = FuturesOrdered::new();
        let mut exit = CloseReason::TransportFailure;

        let closing = session.closing();
        tokio::pin!(closing);

        loop {
            tokio::select! {
                biased;

                _ = &mut closing => {
                    debug!(session_id = %id, "[Router] session closing, serve loop exits");
                    break;
                }

                Some((message_id, outcome, guard)) = pending.next(), if !pending.is_empty() => {
                    let completion = self.settle(&message_id, outcome);
                    let keep_going = self.deliver(&session, completion).await;
                    drop(guard);
                    if !keep_going {
                        exit = CloseReason::ClientRequest;
                        break;
                    }
                }

                frame = reader.read_frame(), if session.is_accepting() => match frame {
                    Ok(Some(WireMessage::Rpc { message_id, operation, payload })) => {
                        let request = RpcRequest {
                            message_id,
                            operation,
                            payload,
                            session_id: id,
                            sequence: session.next_sequence(),
                        };
                        if self.router.is_streaming(&request.operation) {
                            if !self.run_streaming(&session, request, &mut pending).await {
                                exit = CloseReason::ClientRequest;
                                break;
                            }
                        } else {
                            pending.push_back(self.spawn_unary(&session, request).await);
                        }
                    }
                    Ok(Some(other)) => {
                        warn!(session_id = %id, frame = frame_kind(&other), "[Router] unexpected frame");
                        let error = RpcError::malformed_message(format!(
                            "unexpected {} frame on an established session",
                            frame_kind(&other)
                        ));
                        if session.channel().send_reply(RpcReply::error("", error)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(session_id = %id, "[Router] peer closed transport");
                        break;
                    }
                    Err(e @ (TransportError::Codec(_) | TransportError::FrameTooLarge { .. })) => {
                        let error = RpcError::malformed_message(e.to_string());
                        if session.channel().send_reply(RpcReply::error("", error)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "[Router] transport read failed");
                        break;
                    }
                },
            }
        }

        if self.manager.close_session(id, exit).await {
            debug!(session_id = %id, reason = %exit, "[Router] serve loop closed session");
        }
    }

    async fn spawn_unary(&self, session: &Arc<Session>, request: RpcRequest) -> Pending {
        let guard = session.begin_request();
        let message_id = request.message_id.clone();
        let router = Arc::clone(&self.router);
        let task_session = Arc::clone(session);

        match self
            .pool
            .spawn(async move { router.dispatch_with_channel(&request, &task_session).await })
            .await
        {
            Ok(handle) => Box::pin(async move { (message_id, handle.await, guard) }),
            Err(PoolClosed) => {
                let completion = Completion::failed(
                    &message_id,
                    RpcError::resource_denied("server is shutting down"),
                );
                Box::pin(async move { (message_id, Ok(completion), guard) })
            }
        }
    }

    /// Flush earlier replies, then run a streaming handler inline.
    async fn run_streaming(
        &self,
        session: &Arc<Session>,
        request: RpcRequest,
        pending: &mut FuturesOrdered<Pending>,
    ) -> bool {
        while let Some((message_id, outcome, guard)) = pending.next().await {
            let completion = self.settle(&message_id, outcome);
            let keep_going = self.deliver(session, completion).await;
            drop(guard);
            if !keep_going {
                return false;
            }
        }

        let _guard = session.begin_request();
        let completion = self.router.dispatch_with_channel(&request, session).await;
        self.deliver(session, completion).await
    }

    /// Turn a finished task into a completion; a panicked handler becomes
    /// `operation-failed` for that one request.
    fn settle(&self, message_id: &str, outcome: Result<Completion, JoinError>) -> Completion {
        match outcome {
            Ok(completion) => completion,
            Err(join_error) => {
                self.router.metrics().record_panic();
                error!(message_id, error = %join_error, "[Router] handler task failed");
                Completion::failed(
                    message_id,
                    RpcError::operation_failed("internal error while processing the request"),
                )
            }
        }
    }

    /// Write the reply. Returns `false` when the session should stop.
    async fn deliver(&self, session: &Arc<Session>, completion: Completion) -> bool {
        if let Some(reply) = completion.reply {
            if session.channel().send_reply(reply).await.is_err() {
                return false;
            }
        }
        if completion.close_session {
            self.manager
                .close_session(session.id(), CloseReason::ClientRequest)
                .await;
            return false;
        }
        true
    }
}

fn frame_kind(frame: &WireMessage) -> &'static str {
    match frame {
        WireMessage::Auth(_) => "auth",
        WireMessage::Hello { .. } => "hello",
        WireMessage::Rpc { .. } => "rpc",
        WireMessage::RpcReply(_) => "rpc-reply",
        WireMessage::Notification(_) => "notification",
    }
}
