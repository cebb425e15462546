use crate::error::AppError;
use crate::middleware::guards::session_token;
use crate::models::User;
use crate::services::ChatService;
use crate::state::AppState;
use crate::websocket::{
    ConnectionId, ConnectionSession, LiveConnection, SessionBinder, WsInboundEvent, WsOutboundEvent,
};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use error_types::error_codes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// Frame produced off the actor (send results) to be written to the socket
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Reply(String);

/// A `send-message` frame waiting for the per-connection send worker
struct SendJob {
    recipient_uuid: String,
    text: String,
    client_ref: Option<String>,
}

// WebSocket Actor
struct WsSession {
    session: ConnectionSession,
    user: User,
    connection_id: ConnectionId,
    binder: Arc<SessionBinder>,
    chat: Arc<ChatService>,
    /// Frames routed to this connection; taken when the actor starts.
    outbound: Option<mpsc::Receiver<String>>,
    jobs: mpsc::UnboundedSender<SendJob>,
    jobs_rx: Option<mpsc::UnboundedReceiver<SendJob>>,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                tracing::warn!(
                    user = %act.user.uuid,
                    connection = %act.connection_id,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Sends from one connection are handled in arrival order.
    fn start_send_worker(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(mut jobs) = self.jobs_rx.take() else {
            return;
        };
        let chat = self.chat.clone();
        let user = self.user.clone();
        let origin = self.connection_id;
        let addr = ctx.address();

        actix::spawn(async move {
            while let Some(job) = jobs.recv().await {
                if let Some(frame) = handle_send(&chat, &user, origin, job).await {
                    addr.do_send(Reply(frame));
                }
            }
        });
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, code: &str, message: String) {
        let event = WsOutboundEvent::Error {
            code: code.to_string(),
            message,
            client_ref: None,
        };
        match event.to_frame() {
            Ok(frame) => ctx.text(frame),
            Err(e) => tracing::error!(error = %e, "failed to encode error frame"),
        }
    }
}

async fn handle_send(chat: &ChatService, user: &User, origin: ConnectionId, job: SendJob) -> Option<String> {
    let event = match chat
        .send(user, &job.recipient_uuid, &job.text, Some(origin))
        .await
    {
        Ok(message) => WsOutboundEvent::SendAck {
            client_ref: job.client_ref,
            message,
        },
        Err(e) => {
            tracing::debug!(user = %user.uuid, code = e.code(), error = %e, "send-message rejected");
            WsOutboundEvent::Error {
                code: e.code().to_string(),
                message: e.public_message(),
                client_ref: job.client_ref,
            }
        }
    };

    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode send result");
            None
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user = %self.user.uuid,
            connection = %self.connection_id,
            "WebSocket session started"
        );

        self.hb(ctx);

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(ReceiverStream::new(rx));
        }
        self.start_send_worker(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            user = %self.user.uuid,
            connection = %self.connection_id,
            "WebSocket session stopped"
        );

        if let Some((user, connection)) = self.session.close() {
            let binder = self.binder.clone();
            actix::spawn(async move {
                binder.release(user, connection).await;
            });
        }
    }
}

impl Handler<Reply> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Reply, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Frames routed through the presence registry. The stream ends once the
// registry drops this connection, which closes the socket.
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(connection = %self.connection_id, "outbound stream closed");
        ctx.stop();
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(WsInboundEvent::SendMessage {
                    recipient_uuid,
                    text,
                    client_ref,
                }) => {
                    let job = SendJob {
                        recipient_uuid,
                        text,
                        client_ref,
                    };
                    if self.jobs.send(job).is_err() {
                        tracing::warn!(connection = %self.connection_id, "send worker gone");
                        ctx.stop();
                    }
                }
                Err(e) => {
                    tracing::warn!(connection = %self.connection_id, error = %e, "failed to parse WS frame");
                    self.send_error(ctx, error_codes::INVALID_REQUEST, format!("unrecognized frame: {e}"));
                }
            },
            Ok(ws::Message::Binary(_)) => {
                self.send_error(
                    ctx,
                    error_codes::INVALID_REQUEST,
                    "binary frames are not supported".to_string(),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(connection = %self.connection_id, ?reason, "WebSocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(connection = %self.connection_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    // Authentication happens before any presence state is touched.
    let token = session_token(&req, &state.config.session.cookie_name);
    let user = state.binder.authenticate(token.as_deref()).await?;

    // Reject non-upgrade requests before binding so presence never flickers.
    ws::handshake(&req)?;

    let (tx, rx) = mpsc::channel(state.config.ws.outbound_buffer);
    let connection = LiveConnection::new(tx);
    let connection_id = connection.id();

    let mut session = ConnectionSession::new();
    session.authenticate(user.uuid, connection_id).map_err(|e| {
        tracing::error!(error = %e, "connection session transition failed");
        AppError::Internal
    })?;

    state.binder.bind(&user, connection).await;

    let (jobs, jobs_rx) = mpsc::unbounded_channel();
    let actor = WsSession {
        session,
        user: user.clone(),
        connection_id,
        binder: state.binder.clone(),
        chat: state.chat.clone(),
        outbound: Some(rx),
        jobs,
        jobs_rx: Some(jobs_rx),
        hb: Instant::now(),
        heartbeat_interval: Duration::from_secs(state.config.ws.heartbeat_interval_secs),
        client_timeout: Duration::from_secs(state.config.ws.client_timeout_secs),
    };

    match ws::start(actor, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            tracing::error!(user = %user.uuid, error = %e, "WebSocket start failed");
            state.binder.release(user.uuid, connection_id).await;
            Err(e)
        }
    }
}
