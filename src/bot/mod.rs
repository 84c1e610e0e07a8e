//! Bot Module
//!
//! HTTP control API over the grid [`Supervisor`](crate::grid::Supervisor).
//!
//! # Routes
//!
//! ```text
//! POST /api/configure   JSON object, same keys as the saved config file
//! POST /api/start
//! POST /api/stop
//! GET  /api/status      running/configured/error, redacted config, engine counts
//! GET  /api/grid        engine counts or null
//! GET  /api/grid-levels {"grid_levels": [...]}, ascending price
//! GET  /api/orders      ?limit=N (default 50)&status=active|filled|cancelled, newest first
//! GET  /api/trades      ?limit=N (default 50), newest first
//! GET  /api/dashboard   status, trade totals, 10 trades, 50 active orders, levels
//! ```
//!
//! Failures answer 400 (validation), 409 (lifecycle), 502 (connection) or
//! 500, always with a `ControlResponse` body.

mod server;

pub use server::{router, start_server};
