//! # deliver-api
//!
//! HTTP API layer for the checkout and fulfillment service.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout creation against the payment provider
//! - The two payment confirmation entry points (redirect and webhook)
//! - Diagnostics for the catalog, files and configuration
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/payments/create-preference/` | Create checkout session |
//! | GET | `/api/payments/validate/` | Confirm payment after redirect |
//! | POST | `/api/payments/webhook/` | Provider notification |
//! | GET | `/api/payments/products-check/` | Product file diagnostics |
//! | GET | `/api/payments/env-check/` | Configuration presence |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, EnvironmentReport};
