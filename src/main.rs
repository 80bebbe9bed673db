mod auth;
mod catalog;
mod event;
mod room;
mod shared;
mod websockets;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use catalog::InMemoryCatalog;
use event::EventBus;
use room::repository::InMemoryRoomRepository;
use room::service::RoomSessionService;
use room::sweeper::{start_sweeper, SweeperConfig};
use shared::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "praiseroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room collaboration server");

    // Shared application state with dependency injection. The in-memory
    // backends are swappable behind their traits.
    let repository = Arc::new(InMemoryRoomRepository::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let rooms = Arc::new(RoomSessionService::new(
        repository,
        catalog,
        EventBus::new(),
    ));
    let app_state = AppState::new(Arc::clone(&rooms), auth::TokenConfig::new());

    // Background presence and idle-room sweeper
    tokio::spawn(start_sweeper(Arc::clone(&rooms), SweeperConfig::default()));

    // Routes that require a bearer token
    let protected = Router::new()
        .route(
            "/rooms",
            post(room::handlers::create_room).get(room::handlers::list_my_rooms),
        )
        .route("/rooms/public", get(room::handlers::list_public_rooms))
        .route(
            "/rooms/:room_id",
            get(room::handlers::get_room)
                .patch(room::handlers::update_room)
                .delete(room::handlers::delete_room),
        )
        .route("/rooms/code/:code", get(room::handlers::get_room_by_code))
        .route("/rooms/:room_id/join", post(room::handlers::join_room))
        .route(
            "/rooms/code/:code/join",
            post(room::handlers::join_room_by_code),
        )
        .route(
            "/rooms/code/:code/request-join",
            post(room::handlers::request_join),
        )
        .route(
            "/rooms/:room_id/join-requests",
            get(room::handlers::list_join_requests),
        )
        .route(
            "/rooms/:room_id/join-requests/:request_id/approve",
            post(room::handlers::approve_request),
        )
        .route(
            "/rooms/:room_id/join-requests/:request_id/reject",
            post(room::handlers::reject_request),
        )
        .route("/rooms/:room_id/leave", post(room::handlers::leave_room))
        .route(
            "/rooms/:room_id/participants",
            get(room::handlers::list_participants),
        )
        .route(
            "/rooms/:room_id/songs/:song_id",
            post(room::handlers::add_song).delete(room::handlers::remove_song),
        )
        .route(
            "/rooms/:room_id/songs/order",
            put(room::handlers::reorder_songs),
        )
        .route(
            "/rooms/:room_id/import-list/:list_id",
            post(room::handlers::import_list),
        )
        .route(
            "/rooms/:room_id/messages",
            post(room::handlers::send_message).get(room::handlers::get_messages),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::bearer_auth,
        ));

    // The WebSocket handshake carries its token in Sec-WebSocket-Protocol,
    // so the event channel sits outside the bearer middleware
    let public = Router::new()
        .route("/auth/token", post(auth::handlers::create_token))
        .route(
            "/rooms/:room_id/events",
            get(websockets::room_events_handler),
        );

    let app = Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind("0.0.0.0:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind port 3000");
            std::process::exit(1);
        }
    };
    info!("Server running on http://localhost:3000");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }
}
