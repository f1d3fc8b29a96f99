//! The live feed WebSocket endpoint.
//!
//! Clients connect to `/ws`, optionally narrowing the feed with `payment` (or `p`) for the tenant and `categories` (or
//! `c`) for the category. They must show signs of life, either with protocol pings or with a text `ping` frame, which
//! is answered with `pong`. Silent connections are dropped by the heartbeat worker.
use actix_web::{get, rt, web, HttpRequest, HttpResponse};
use actix_ws::{CloseReason, Message, Session};
use async_trait::async_trait;
use donation_engine::broadcast::{BroadcastError, BroadcastHub, ConnId, SubscriberFilter, SubscriberSink};
use futures::StreamExt;
use log::*;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{config::ServerOptions, errors::ServerError, helpers::get_remote_ip};

pub const TEXT_PING: &str = "ping";
pub const TEXT_PONG: &str = "pong";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedParams {
    #[serde(alias = "p")]
    pub payment: Option<String>,
    #[serde(alias = "c")]
    pub categories: Option<String>,
}

impl FeedParams {
    pub fn filter(&self) -> SubscriberFilter {
        SubscriberFilter::new(self.payment.as_deref(), self.categories.as_deref())
    }
}

/// The sending half of a client connection, shared with the broadcast hub.
pub struct WsSink {
    session: Mutex<Option<Session>>,
}

impl WsSink {
    pub fn new(session: Session) -> Self {
        Self { session: Mutex::new(Some(session)) }
    }
}

#[async_trait]
impl SubscriberSink for WsSink {
    async fn send_text(&self, text: String) -> Result<(), BroadcastError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(BroadcastError::Closed)?;
        session.text(text).await.map_err(|_| BroadcastError::Closed)
    }

    async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            // The peer may already be gone
            let _ = session.close(Some(CloseReason::from(actix_ws::CloseCode::Away))).await;
        }
    }
}

/// What the connection loop should do with an incoming frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// Answer with a text `pong` and record the heartbeat
    ReplyPong,
    /// Answer a protocol ping and record the heartbeat
    ReplyPing(Vec<u8>),
    Heartbeat,
    Close,
    Ignore,
}

pub fn classify(msg: &Message) -> FrameAction {
    match msg {
        Message::Text(text) if text.trim().eq_ignore_ascii_case(TEXT_PING) => FrameAction::ReplyPong,
        Message::Text(text) if text.trim().eq_ignore_ascii_case(TEXT_PONG) => FrameAction::Heartbeat,
        Message::Ping(bytes) => FrameAction::ReplyPing(bytes.to_vec()),
        Message::Pong(_) => FrameAction::Heartbeat,
        Message::Close(_) => FrameAction::Close,
        _ => FrameAction::Ignore,
    }
}

#[get("/ws")]
pub async fn live_feed(
    req: HttpRequest,
    body: web::Payload,
    params: web::Query<FeedParams>,
    hub: web::Data<BroadcastHub>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let (response, session, mut stream) =
        actix_ws::handle(&req, body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let remote_ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string());
    let mut reply = session.clone();
    let hub = hub.get_ref().clone();
    let id = hub.register(std::sync::Arc::new(WsSink::new(session)), params.filter(), remote_ip);
    rt::spawn(async move {
        while let Some(frame) = stream.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("📣️ Protocol error on subscriber {id}. {e}");
                    break;
                },
            };
            if !handle_frame(&hub, &id, &mut reply, &msg).await {
                break;
            }
        }
        hub.unregister(&id);
        let _ = reply.close(None).await;
    });
    Ok(response)
}

/// Returns false when the connection should end.
async fn handle_frame(hub: &BroadcastHub, id: &ConnId, reply: &mut Session, msg: &Message) -> bool {
    match classify(msg) {
        FrameAction::ReplyPong => {
            hub.touch(id);
            reply.text(TEXT_PONG).await.is_ok()
        },
        FrameAction::ReplyPing(bytes) => {
            hub.touch(id);
            reply.pong(&bytes).await.is_ok()
        },
        FrameAction::Heartbeat => {
            hub.touch(id);
            true
        },
        FrameAction::Close => {
            trace!("📣️ Subscriber {id} said goodbye");
            false
        },
        FrameAction::Ignore => true,
    }
}
