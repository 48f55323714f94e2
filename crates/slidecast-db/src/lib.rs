//! Slidecast-DB: Job store schema, migrations, and query operations
//!
//! This crate persists video generation jobs in SQLite using rusqlite
//! with r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema, including the
//!   job stage state machine
//! - `queries` - Database query operations
//!
//! Every stage advance is a single guarded UPDATE: the progress value, the
//! status message, and the artifacts a stage produced are published together
//! or not at all, and the guard list is derived from the one authoritative
//! transition table on [`models::JobStage`].
//!
//! # Example
//!
//! ```no_run
//! use slidecast_db::pool::{init_pool, get_conn};
//! use slidecast_db::queries::jobs;
//! use slidecast_common::{InputKind, StylePreset, AvatarOption};
//!
//! let pool = init_pool("/var/lib/slidecast/db.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let job = jobs::create_job(
//!     &conn,
//!     "paper.pdf",
//!     "/uploads/abc/paper.pdf",
//!     InputKind::Document,
//!     StylePreset::Concise,
//!     AvatarOption::None,
//! )
//! .unwrap();
//! println!("Created job: {}", job.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
