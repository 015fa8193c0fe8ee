pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod json_text;
pub mod models;
pub mod voice;

pub use config::HelplineConfig;
pub use error::HelplineError;
pub use voice::{ElevenLabsClient, VoiceError, VoiceProvider};
