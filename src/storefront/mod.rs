//! Storefront back end: store, order rules and the HTTP surface.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (router, layers, state wiring)       │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         v                                        │
//!                       │  service.rs  (Storefront: orders, cutoff)        │
//!                       │         │              │                         │
//!                       │         v              v                         │
//!                       │  db.rs (SQLite)   calendar:: (pure core)         │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! Code validation goes out through `crate::codes`; admin-only routes are
//! guarded by `crate::session`.

pub mod api;
pub mod db;
pub mod server;
pub mod service;

pub use service::{CutoffStatus, OrderChange, PlaceOrder, Storefront};
