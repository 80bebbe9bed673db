// Event fan-out infrastructure for room collaboration.
//
// Commands publish domain events here after committing state; live channels
// subscribe per room and forward frames to clients.

// Public API - what other modules can use
pub use bus::EventBus;
pub use events::RoomEvent;

// Internal modules
mod bus;
mod events;
