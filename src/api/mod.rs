//! Command Surface — HTTP/WebSocket API over the planning core

mod envelope;
pub mod handlers;
mod routes;
mod ws;

pub use envelope::{ApiErrorResponse, ApiResponse};
pub use handlers::ApiState;
pub use routes::{api_routes, create_app};
