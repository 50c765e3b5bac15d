//! # rpi-remote
//!
//! A small resident HTTP agent for resource-constrained hosts. Automation
//! clients use it for one-shot access to a device without keeping a remote
//! shell session open.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  http (axum listener, one task per connection)           │
//! └──────────────────────────────────────────────────────────┘
//!                           │ RequestEnvelope
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Dispatcher                                              │
//! │   - GET  → "rpi-remote ok"                               │
//! │   - POST → authorize, parse, route, run, serialize       │
//! │   - any error → {"error": ...} (500, or 401)             │
//! └──────────────────────────────────────────────────────────┘
//!        │             │              │              │
//!        ▼             ▼              ▼              ▼
//!     /cmd          /read          /write         /status
//!   exec::run    fs::read_file  fs::write_file  status::report
//!        │             │              │              │
//!        ▼             ▼              ▼              ▼
//! ┌────────────────┐  ┌─────────────────────┐  ┌────────────────┐
//! │ host::Shell    │  │ host::FileStore     │  │ host::Shell    │
//! │ (sh -c, timed) │  │ (tokio::fs)         │  │ (free/top/df)  │
//! └────────────────┘  └─────────────────────┘  └────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | any | - | `rpi-remote ok` |
//! | POST | `/cmd` | `{"cmd"}` | `{"stdout","stderr","code"}` |
//! | POST | `/read` | `{"path"}` | `{"content","ok":true}` / `{"error","ok":false}` |
//! | POST | `/write` | `{"path","content"}` | `{"ok":true}` |
//! | POST | `/status` | - | `{"mem","cpu","disk"}` |
//! | POST | other | - | `{"error":"Unknown endpoint"}` |
//!
//! The agent executes arbitrary shell commands with its own privileges.
//! Without `RPI_REMOTE_TOKEN` set, anyone who can reach the port can.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod fs;
pub mod host;
pub mod http;
pub mod protocol;
pub mod status;

pub use auth::{AllowAll, Authorizer, BearerToken};
pub use config::{AgentConfig, ConfigError};
pub use dispatch::Dispatcher;
pub use error::{AgentError, Result};
pub use host::{FileStore, Shell, ShellOutput};
