pub mod config;
pub mod protocol;
pub mod query;
pub mod session;
pub mod tls;

pub use config::MindConfig;
pub use query::{AirDate, EpisodeKey, MindSearch, Record};
pub use session::{Credential, MindError, MindRpc, Session, retry_unavailable};
