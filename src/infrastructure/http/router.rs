use crate::infrastructure::http::state::AppState;
use crate::infrastructure::http::{chats, commercials, realtime};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/chats", post(chats::create_chat))
        .route("/api/chats/pending", get(chats::list_pending))
        .route("/api/chats/abandon-expired", post(chats::abandon_expired))
        .route("/api/chats/:id", get(chats::get_chat))
        .route("/api/chats/:id/assign", post(chats::assign_chat))
        .route("/api/chats/:id/auto-assign", post(chats::request_auto_assignment))
        .route("/api/chats/:id/transfer", post(chats::transfer_chat))
        .route("/api/chats/:id/activate", post(chats::activate_chat))
        .route("/api/chats/:id/close", post(chats::close_chat))
        .route("/api/chats/:id/abandon", post(chats::abandon_chat))
        .route(
            "/api/chats/:id/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route("/api/commercials", post(commercials::register_commercial))
        .route("/api/commercials/available", get(commercials::list_available))
        .route("/api/commercials/:id/heartbeat", post(commercials::heartbeat))
        .route("/api/commercials/:id/online", put(commercials::set_online))
        .route("/api/assignment-rules", put(commercials::save_rules))
        .route("/api/assignment-rules/:company_id", get(commercials::list_rules));

    Router::new()
        .route("/health", get(health_handler))
        .route("/realtime/:user_id", get(realtime::realtime_stream))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
