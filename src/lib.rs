//! # Audit Trail
//!
//! Records every content mutation of an object store as an append-only,
//! time-partitioned TSV log per storage space, persisted back into the same
//! store.
//!
//! ## Pipeline
//!
//! - **Content events** describe one create/update/delete/copy of one item.
//! - The **event listener** accepts events without blocking, buffers them in a
//!   pending pool and keeps at most one flush worker per space.
//! - A **flush worker** waits out a debounce window (and any write pause),
//!   drains its space's events in one step and hands them to the log store.
//! - The **log store** appends to the space's current log, rotates it at a
//!   size limit and re-uploads it with an MD5 checksum, retrying transient
//!   failures a bounded number of times.
//! - The **auditor** binds all of this to a store handle and exposes
//!   initialization, log listing, log removal and shutdown.
//!
//! ```rust,ignore
//! use audit_trail::builders::start_auditor;
//! use audit_trail::config::AuditConfig;
//! use audit_trail::core::{Action, ContentEvent};
//! use audit_trail::infra::{InMemoryObjectStore, StaticConnector};
//! use audit_trail::runtime::TokioSpawner;
//!
//! let connector = StaticConnector::new(InMemoryObjectStore::with_spaces(["photos"]));
//! let auditor = start_auditor(AuditConfig::default(), TokioSpawner::current(), &connector).await?;
//!
//! auditor.on_content_event(
//!     ContentEvent::builder(Action::CreateContent, "photos", "beach.jpg")
//!         .content_size(1024)
//!         .build()?,
//! )?;
//!
//! // Flush everything that is pending and stop.
//! auditor.shutdown(true).await?;
//! println!("{}", auditor.get_audit_logs("photos").await?);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Audit pipeline: events, listener, flush workers, log store and auditor.
pub mod core;
/// Configuration models for the audit pipeline.
pub mod config;
/// Builders to construct the auditor from configuration.
pub mod builders;
/// Infrastructure adapters for the remote object store.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
