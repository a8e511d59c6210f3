#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` is the core of distdiff: it walks two virtual trees in lockstep,
//! classifies every leaf into one of the five file statuses, deduplicates
//! repeated mismatches by content digest, computes bounded diffs for the
//! survivors, and emits every terminal decision through the [`Reporter`]
//! contract. Concrete report destinations live outside this crate and only
//! consume the contract.
//!
//! # Design
//!
//! - [`visitor::ItemVisitor`] performs the structural recursion on the
//!   calling thread and fans each leaf comparison out to the
//!   [`work::WorkManager`] compute pool.
//! - All shared mutable state is confined to the digest registries
//!   ([`digests`]), the scheduler's counters, and the run statistics; every
//!   [`Item`] is a flat value holding no tree references.
//! - The [`DiffContext`] bundle is threaded explicitly through every call so
//!   independent comparison runs can coexist in one process (tests rely on
//!   this).

pub mod digests;
pub mod disasm;
pub mod item;
pub mod reporter;
pub mod settings;
pub mod stats;
pub mod visitor;
pub mod work;

pub use item::{FileInfo, FileKind, FileStatus, Item};
pub use reporter::{DiffContext, Reporter};
pub use settings::DiffSettings;
pub use stats::RunStats;
pub use visitor::ItemVisitor;
pub use work::{TaskHandle, TaskScope, WorkManager, WorkQueue};
