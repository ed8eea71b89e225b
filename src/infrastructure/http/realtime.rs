use crate::application::services::ConnectionService;
use crate::domain::entities::ConnectionRole;
use crate::infrastructure::http::error::ApiResult;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::realtime::{ChannelTransport, RealtimeEvent};
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    #[serde(default)]
    pub role: Option<String>,
}

/// Tears the socket down once axum drops the event stream.
struct SocketGuard {
    socket_id: String,
    transport: Arc<ChannelTransport>,
    connection_service: ConnectionService,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let socket_id = std::mem::take(&mut self.socket_id);
        let transport = self.transport.clone();
        let connection_service = self.connection_service.clone();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime to clean up socket {}", socket_id);
            return;
        };
        handle.spawn(async move {
            transport.unregister_socket(&socket_id).await;
            if let Err(e) = connection_service.on_disconnect(&socket_id).await {
                tracing::warn!("Failed to disconnect socket {}: {}", socket_id, e);
            }
        });
    }
}

fn to_sse(frame: RealtimeEvent) -> Event {
    let data = serde_json::to_string(&frame.payload).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize realtime payload: {}", e);
        "{}".to_string()
    });
    Event::default().event(frame.event).data(data)
}

/// Opens a realtime stream for `user_id`. Each stream is one socket; opening a
/// second one for the same user supersedes the first.
pub async fn realtime_stream(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<RealtimeQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let role = match query.role.as_deref() {
        Some(role) => role.parse::<ConnectionRole>()?,
        None => ConnectionRole::Visitor,
    };

    let socket_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel::<RealtimeEvent>(state.realtime_channel_capacity);
    state
        .transport
        .register_socket(&socket_id, BTreeSet::from([role]), tx)
        .await;

    if let Err(e) = state
        .connection_service
        .on_connect(&user_id, &socket_id, vec![role])
        .await
    {
        state.transport.unregister_socket(&socket_id).await;
        return Err(e.into());
    }

    tracing::info!("SSE stream opened for {} {} on socket {}", role, user_id, socket_id);

    let guard = SocketGuard {
        socket_id,
        transport: state.transport.clone(),
        connection_service: state.connection_service.clone(),
    };

    let stream = ReceiverStream::new(rx).map(move |frame| {
        let _guard = &guard;
        Ok(to_sse(frame))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
