pub mod dashboard_metrics;
pub mod dashboard_queue;
pub mod error;
pub mod push;
pub mod server;

pub use error::ApiError;
pub use push::{PushEvent, PushHub, Subscription};
pub use server::{router, start_dashboard_server};
