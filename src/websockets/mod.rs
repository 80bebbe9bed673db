pub mod handler;
pub mod socket;

pub use handler::room_events_handler;
