//! # Folio
//!
//! A portfolio content API with a recycle bin.
//!
//! Content records (about, projects, services, skills, blog posts,
//! certificates, contact messages) live in SQLite. Deleting a record moves
//! it into a recycle bin; from there it can be restored under a fresh id or
//! purged, which also deletes its images from the hosted asset store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │   HTTP   │──▶│  Lifecycle / │──▶│   SQLite   │
//! │   CLI    │   │   Content    │   │ collections│
//! └──────────┘   └──────┬───────┘   │ recycle_bin│
//!                       │           └────────────┘
//!                       ▼
//!                ┌────────────┐
//!                │ Asset store│
//!                │(Cloudinary)│
//!                └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio init                    # create database
//! folio serve                   # start HTTP API
//! folio bin list                # inspect the recycle bin
//! folio bin restore <id>
//! folio bin purge <id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Store and manager wiring |
//! | [`assets`] | Disabled and Cloudinary asset stores |
//! | [`sqlite_store`] | SQLite store implementation |
//! | [`server`] | HTTP API server |
//! | [`recycle_cmd`] | `folio bin` commands |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod app;
pub mod assets;
pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod recycle_cmd;
pub mod server;
pub mod sqlite_store;
