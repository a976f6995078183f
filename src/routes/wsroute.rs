use crate::error::{AppError, AppResult};
use crate::middleware::error_handling::map_error;
use crate::services::ChatService;
use crate::state::AppState;
use crate::websocket::subscription::Snapshot;
use crate::websocket::{SubscriberId, Subscription};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use chat_core::{ConversationKey, SubscriptionFrame};
use std::time::{Duration, Instant};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

// WebSocket Actor
struct WsSession {
    conversation_key: ConversationKey,
    subscriber_id: SubscriberId,
    // Taken in `started` and attached to the context as a stream
    subscription: Option<Subscription>,
    chat: ChatService,
    hb: Instant,
}

impl WsSession {
    fn new(subscription: Subscription, chat: ChatService) -> Self {
        Self {
            conversation_key: subscription.conversation_key().clone(),
            subscriber_id: subscription.id(),
            subscription: Some(subscription),
            chat,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    conversation_key = %act.conversation_key,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_frame(&self, frame: &SubscriptionFrame, ctx: &mut ws::WebsocketContext<Self>) {
        match frame.to_json() {
            Ok(payload) => ctx.text(payload),
            Err(e) => tracing::error!(error = %e, "failed to encode subscription frame"),
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            conversation_key = %self.conversation_key,
            subscriber_id = ?self.subscriber_id,
            "WebSocket session started"
        );

        self.hb(ctx);

        if let Some(subscription) = self.subscription.take() {
            ctx.add_stream(subscription.into_stream());
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            conversation_key = %self.conversation_key,
            subscriber_id = ?self.subscriber_id,
            "WebSocket session stopped"
        );

        let registry = self.chat.registry().clone();
        let conversation_key = self.conversation_key.clone();
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            registry
                .remove_subscriber(conversation_key.as_str(), subscriber_id)
                .await;
        });
    }
}

// Snapshots from the subscription
impl StreamHandler<AppResult<Snapshot>> for WsSession {
    fn handle(&mut self, item: AppResult<Snapshot>, ctx: &mut Self::Context) {
        match item {
            Ok(snapshot) => {
                let frame = SubscriptionFrame::Snapshot {
                    conversation_key: self.conversation_key.to_string(),
                    messages: snapshot.as_ref().clone(),
                };
                self.send_frame(&frame, ctx);
            }
            Err(e) => {
                let (_, body) = map_error(&e);
                let frame = SubscriptionFrame::Error {
                    code: body.code,
                    message: e.to_string(),
                };
                self.send_frame(&frame, ctx);
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Error,
                    description: Some("subscription terminated".into()),
                }));
                ctx.stop();
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
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
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // Read-only channel; messages are sent over POST.
                tracing::debug!("ignoring inbound WebSocket data frame");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// GET /api/chat/{key}/ws
/// Live snapshots of one conversation. The subscription is registered before
/// the upgrade, so a store failure is reported as a plain HTTP error.
#[get("/api/chat/{key}/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let conversation_key = ConversationKey::parse(&key.into_inner()).map_err(AppError::from)?;

    let subscription = state.chat.subscribe(&conversation_key).await?;
    let registry = state.chat.registry().clone();
    let subscriber_id = subscription.id();

    let session = WsSession::new(subscription, state.chat.clone());

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // Handshake rejected: the actor never ran, so release the slot here.
            registry
                .remove_subscriber(conversation_key.as_str(), subscriber_id)
                .await;
            Err(e)
        }
    }
}
