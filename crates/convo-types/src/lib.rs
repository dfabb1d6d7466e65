pub mod message;
pub mod conversation;
pub mod event;
pub mod config;
pub mod error;
pub mod ids;
pub mod timestamp;


pub use error::ClientError;
pub type Result<T> = std::result::Result<T, ClientError>;
