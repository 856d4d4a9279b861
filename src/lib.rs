//! # rosbridge - RouterOS command/response translation
//!
//! `rosbridge` talks to MikroTik RouterOS devices over SSH and turns their
//! human-oriented console output into structured records, and structured
//! data back into safe console commands.
//!
//! ## Features
//!
//! - **Session Pooling**: One authenticated session per `host:port`, reused
//!   while alive and replaced when it dies
//! - **RouterOS Compatibility**: Algorithm preferences that negotiate with
//!   both RouterOS 7 and older RouterOS 6 firmware
//! - **Output Parsing**: Heuristic block detection for `print` output
//! - **Command Synthesis**: Ordered argument builder with mandatory
//!   sanitization of user-supplied values
//! - **Async/Await**: Built on Tokio; every network operation is a
//!   suspension point
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rosbridge::config::ManagerConfig;
//! use rosbridge::router::RouterService;
//! use rosbridge::session::{SessionPool, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Arc::new(SessionPool::ssh(ManagerConfig::from_env()));
//!     let service = RouterService::new(pool.clone());
//!
//!     let target = Target::new("192.168.88.1", None, "admin", "password");
//!     let status = service.test_connection(&target).await;
//!     println!("{} ({:?} ms)", status.message, status.latency);
//!
//!     for entry in service.address_lists(&target).await? {
//!         println!("{} {} {}", entry.list, entry.address, entry.comment);
//!     }
//!
//!     pool.release_all().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`parser::parse`] - RouterOS output to [`parser::Record`]s
//! - [`command::CommandBuilder`] - Sanitized command lines
//! - [`session::SessionPool`] - Session pool and command execution
//! - [`router::RouterService`] - Identity, resource, address-list and
//!   firewall-filter operations
//! - [`error::ConnectError`] - Error types and their HTTP-boundary classes

pub mod command;
pub mod config;
pub mod error;
pub mod parser;
pub mod router;
pub mod session;
