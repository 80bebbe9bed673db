pub mod handlers;
pub mod middleware;
pub mod token;
pub mod types;

pub use middleware::bearer_auth;
pub use token::TokenConfig;
pub use types::Claims;
