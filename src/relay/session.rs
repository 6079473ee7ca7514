//! Per-connection relay state machine.
//!
//! # Responsibilities
//! - Read a request from the client and resolve its origin
//! - Strip proxy headers and set `Connection` to match the persistence mode
//! - Forward the request, read the response, write it back
//! - Decide whether the client connection carries another exchange
//!
//! # States
//! ```text
//! AwaitRequest → ResolveUpstream → ForwardRequest → AwaitResponse → ForwardResponse
//!      ▲                                                                  │
//!      └──────────────── persistent ──────────────────────────────────────┤
//!                                                                          ▼
//!                                                                      Terminate
//! ```
//! Any failure moves straight to `Terminate`. Termination is an ordinary
//! transition that carries a [`TerminateReason`].

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::context::ProxyContext;
use crate::error::FramingError;
use crate::http::framing::FramingReader;
use crate::http::message::{Message, CONNECTION, PROXY_CONNECTION};
use crate::net::ConnectionGuard;
use crate::observability::{logging, metrics};
use crate::relay::upstream::{Connector, UpstreamSlot};
use crate::relay::{close_quietly, target};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    /// The client closed its connection between exchanges.
    ClientClosed,
    /// The client sent nothing within the idle timeout.
    ClientIdle,
    /// Reading the request or writing the response failed.
    ClientError,
    /// The request target was not an `http://` URL.
    UnsupportedScheme,
    /// The origin could not be reached.
    UpstreamConnectFailed,
    /// Writing the request or reading the response failed.
    UpstreamError,
    /// One exchange completed and persistence is off.
    NonPersistent,
    /// The running flag was cleared.
    ShuttingDown,
    /// The registry force-closed the connection.
    ForceClosed,
}

impl TerminateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminateReason::ClientClosed => "client_closed",
            TerminateReason::ClientIdle => "client_idle",
            TerminateReason::ClientError => "client_error",
            TerminateReason::UnsupportedScheme => "unsupported_scheme",
            TerminateReason::UpstreamConnectFailed => "upstream_connect_failed",
            TerminateReason::UpstreamError => "upstream_error",
            TerminateReason::NonPersistent => "non_persistent",
            TerminateReason::ShuttingDown => "shutting_down",
            TerminateReason::ForceClosed => "force_closed",
        }
    }
}

impl std::fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response pair in flight.
#[derive(Debug)]
struct Exchange {
    request: Message,
    host: String,
    started: Instant,
}

#[derive(Debug)]
enum State {
    AwaitRequest,
    ResolveUpstream(Exchange),
    ForwardRequest(Exchange),
    AwaitResponse(Exchange),
    ForwardResponse(Exchange, Message),
}

#[derive(Debug)]
enum Step {
    Next(State),
    Terminate(TerminateReason),
}

/// Relays HTTP exchanges for one client connection.
pub struct RelaySession<C: Connector, S> {
    ctx: Arc<ProxyContext>,
    client: FramingReader<S>,
    guard: ConnectionGuard,
    upstream: UpstreamSlot<C>,
}

impl<C, S> RelaySession<C, S>
where
    C: Connector,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ctx: Arc<ProxyContext>, connector: Arc<C>, client: S, guard: ConnectionGuard) -> Self {
        let options = ctx.framing_options();
        Self {
            client: FramingReader::new(client, options),
            upstream: UpstreamSlot::new(connector, options),
            guard,
            ctx,
        }
    }

    /// Drive the session to completion. Both sockets are closed on return.
    pub async fn run(mut self) -> TerminateReason {
        let mut state = State::AwaitRequest;
        let reason = loop {
            state = match self.step(state).await {
                Step::Next(next) => next,
                Step::Terminate(reason) => break reason,
            };
        };
        self.teardown(reason).await;
        reason
    }

    async fn step(&mut self, state: State) -> Step {
        match state {
            State::AwaitRequest => self.await_request().await,
            State::ResolveUpstream(exchange) => self.resolve_upstream(exchange).await,
            State::ForwardRequest(exchange) => self.forward_request(exchange).await,
            State::AwaitResponse(exchange) => self.await_response(exchange).await,
            State::ForwardResponse(exchange, response) => self.forward_response(exchange, response).await,
        }
    }

    async fn await_request(&mut self) -> Step {
        if !self.ctx.is_running() {
            return Step::Terminate(TerminateReason::ShuttingDown);
        }

        let result = tokio::select! {
            biased;
            _ = self.guard.close_requested() => return Step::Terminate(TerminateReason::ForceClosed),
            result = self.client.read_message() => result,
        };

        let mut request = match result {
            Ok(request) => request,
            Err(FramingError::Disconnected) => return Step::Terminate(TerminateReason::ClientClosed),
            Err(FramingError::Timeout(_)) => return Step::Terminate(TerminateReason::ClientIdle),
            Err(e) => {
                tracing::debug!(peer_addr = %self.guard.peer(), error = %e, "Failed to read request");
                return Step::Terminate(TerminateReason::ClientError);
            }
        };
        let started = Instant::now();

        let host = match target::origin_host(request.target()) {
            Ok(host) => host,
            Err(e) => {
                logging::log_rejected(self.ctx.next_exchange(), self.guard.peer(), &request);
                tracing::debug!(error = %e, "Request target rejected");
                metrics::record_rejected(TerminateReason::UnsupportedScheme.as_str());
                return Step::Terminate(TerminateReason::UnsupportedScheme);
            }
        };

        request.set_header(PROXY_CONNECTION, "");
        request.set_header(CONNECTION, self.connection_value());

        Step::Next(State::ResolveUpstream(Exchange {
            request,
            host,
            started,
        }))
    }

    async fn resolve_upstream(&mut self, exchange: Exchange) -> Step {
        let reuse = self.ctx.persistent();
        match self.upstream.acquire(&exchange.host, reuse).await {
            Ok(_) => Step::Next(State::ForwardRequest(exchange)),
            Err(e) => {
                tracing::warn!(host = %exchange.host, error = %e, "Failed to connect to origin");
                metrics::record_rejected(TerminateReason::UpstreamConnectFailed.as_str());
                Step::Terminate(TerminateReason::UpstreamConnectFailed)
            }
        }
    }

    async fn forward_request(&mut self, exchange: Exchange) -> Step {
        let Some(conn) = self.upstream.current_mut() else {
            return Step::Terminate(TerminateReason::UpstreamError);
        };

        let result = tokio::select! {
            biased;
            _ = self.guard.close_requested() => return Step::Terminate(TerminateReason::ForceClosed),
            result = conn.reader().write_message(&exchange.request) => result,
        };
        if let Err(e) = result {
            tracing::debug!(host = %exchange.host, error = %e, "Failed to write request to origin");
            return Step::Terminate(TerminateReason::UpstreamError);
        }
        Step::Next(State::AwaitResponse(exchange))
    }

    async fn await_response(&mut self, exchange: Exchange) -> Step {
        let Some(conn) = self.upstream.current_mut() else {
            return Step::Terminate(TerminateReason::UpstreamError);
        };

        let result = tokio::select! {
            biased;
            _ = self.guard.close_requested() => return Step::Terminate(TerminateReason::ForceClosed),
            result = conn.reader().read_message() => result,
        };

        let mut response = match result {
            Ok(response) => response,
            Err(e) if e.is_transport() => {
                tracing::debug!(host = %exchange.host, error = %e, "Origin connection lost");
                return Step::Terminate(TerminateReason::UpstreamError);
            }
            Err(e) => {
                tracing::warn!(host = %exchange.host, error = %e, "Malformed response from origin");
                return Step::Terminate(TerminateReason::UpstreamError);
            }
        };

        response.set_header(CONNECTION, self.connection_value());
        if !self.ctx.persistent() {
            self.upstream.release().await;
        }

        Step::Next(State::ForwardResponse(exchange, response))
    }

    async fn forward_response(&mut self, exchange: Exchange, response: Message) -> Step {
        let result = tokio::select! {
            biased;
            _ = self.guard.close_requested() => return Step::Terminate(TerminateReason::ForceClosed),
            result = self.client.write_message(&response) => result,
        };
        if let Err(e) = result {
            tracing::debug!(peer_addr = %self.guard.peer(), error = %e, "Failed to write response to client");
            return Step::Terminate(TerminateReason::ClientError);
        }

        logging::log_exchange(self.ctx.next_exchange(), self.guard.peer(), &exchange.request, &response);
        metrics::record_exchange(exchange.started);

        if self.ctx.persistent() {
            Step::Next(State::AwaitRequest)
        } else {
            Step::Terminate(TerminateReason::NonPersistent)
        }
    }

    fn connection_value(&self) -> &'static str {
        if self.ctx.persistent() {
            "keep-alive"
        } else {
            "close"
        }
    }

    /// Close both sockets; the guard deregisters the client when dropped.
    async fn teardown(mut self, reason: TerminateReason) {
        self.upstream.release().await;
        close_quietly(self.client.get_mut()).await;
        tracing::debug!(
            connection_id = %self.guard.id(),
            peer_addr = %self.guard.peer(),
            reason = %reason,
            unread = self.client.buffered().len(),
            "Session closed"
        );
    }
}
