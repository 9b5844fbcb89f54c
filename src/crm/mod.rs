//! The CRM service.
//!
//! | Module       | Concern                                                  |
//! |--------------|----------------------------------------------------------|
//! | `db`         | SQLite schema and per-account queries                    |
//! | `repository` | Async repository traits and the SQLite-backed store      |
//! | `auth`       | Accounts, password hashes, bearer sessions               |
//! | `context`    | Per-account cached view with toasts and reload           |
//! | `toast`      | Expiring notification queue                              |
//! | `seed`       | Demo data set                                            |
//! | `api`        | HTTP routes and error mapping                            |
//! | `ws`         | Change events pushed to connected clients                |
//! | `server`     | State wiring, background tasks, listener                 |

pub mod api;
pub mod auth;
pub mod context;
pub mod db;
pub mod repository;
pub mod seed;
pub mod server;
pub mod toast;
pub mod ws;
