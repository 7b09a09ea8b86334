pub mod api;
pub mod auth;
pub mod config;
pub mod detect;
pub mod error;
pub mod messages;
pub mod monitor;
pub mod notify;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

/// Indiegogo REST API base URL (v1.1)
pub const API_BASE: &str = "https://api.indiegogo.com/1.1";

/// OAuth token endpoint (password and refresh grants)
pub const AUTH_TOKEN_URL: &str = "https://auth.indiegogo.com/oauth/token";

/// Public website, used for deep links in notifications
pub const WEB_BASE: &str = "https://www.indiegogo.com";

/// Automation (IFTTT Maker) webhook host.
/// Triggers are posted to `/trigger/<event>/with/key/<key>`.
pub const AUTOMATION_BASE: &str = "https://maker.ifttt.com";
