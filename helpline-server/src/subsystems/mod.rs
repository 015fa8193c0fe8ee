pub mod analytics;
pub mod auth;
pub mod detail;
pub mod listing;
