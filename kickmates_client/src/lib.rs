pub mod api;
pub mod cli;
pub mod comments;
pub mod config;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod models;
pub mod session;
pub mod telemetry;
pub mod threading;
pub mod utils;
pub mod votes;

pub use api::ApiClient;
pub use error::{ClientError, ErrorCategory, Result};
pub use session::{Session, SessionStore};
