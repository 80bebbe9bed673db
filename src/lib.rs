// Library crate for the room collaboration server
// This file exposes the public API for integration tests

pub mod auth;
pub mod catalog;
pub mod event;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use auth::{Claims, TokenConfig};
pub use catalog::{CatalogService, InMemoryCatalog};
pub use event::{EventBus, RoomEvent};
pub use room::repository::{InMemoryRoomRepository, RoomRepository};
pub use room::service::RoomSessionService;
pub use shared::{AppError, AppState};
