//! # coursehub-api
//!
//! The HTTP surface: index page, static assets, the OAuth2/OIDC login
//! callback, the WebSocket upgrade into the realtime engine, and the
//! admin mode endpoint.

pub mod cookies;
pub mod handlers;
pub mod oidc;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
