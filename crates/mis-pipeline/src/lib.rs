//! MIS staging pipeline
//!
//! Fixed-width record extracts move through these stages:
//!
//! 1. **Intake** ([`intake`]): producer downloads are keyed by their first
//!    record and committed to the versioned extract store.
//! 2. **Selection** ([`selector`]): the newest version of every
//!    `(type, campus, term)` key is picked, superseded files are reported.
//! 3. **Merge** ([`merge`]): selected extracts replace their campus's records
//!    inside the term's sorted master files, or rebuild them outright.
//! 4. **Strip** ([`stripper`]): analyst-flagged records are removed.
//! 5. **Trailer** ([`trailer`]): per-file record counts are written to the
//!    term's `TX` file.
//! 6. **Load** ([`loader`]): masters are streamed into the relational sink in
//!    checkpointed batches.
//!
//! Every stage reports to an [`activity::ActivityLog`] handed in by the
//! caller and works inside one instance [`workspace::Workspace`].
//!
//! # Example
//!
//! ```no_run
//! use mis_pipeline::{activity::ActivityLog, PipelineContext, PipelineSettings};
//! use mis_pipeline::trailer::generate_trailer;
//!
//! # fn main() -> mis_pipeline::Result<()> {
//! let ctx = PipelineContext::new("/srv/mis/2025", PipelineSettings::default())?;
//! let (mut log, _) = ActivityLog::in_memory("trailer");
//! let report = generate_trailer(&ctx, &ctx.workspace.final_dat(), "253", &mut log)?;
//! println!("{} entries", report.entries());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod activity;
pub mod context;
pub mod error;
pub mod exceptions;
pub mod files;
pub mod intake;
pub mod key;
pub mod layout;
pub mod loader;
pub mod lock;
pub mod master;
pub mod merge;
pub mod normalize;
pub mod selector;
pub mod settings;
pub mod store;
pub mod stripper;
pub mod trailer;
pub mod workspace;

pub use activity::{ActivityLog, RunOutcome};
pub use context::PipelineContext;
pub use error::{ErrorClass, PipelineError, Result};
pub use key::{ArtifactKey, VersionedName};
pub use layout::{LayoutRegistry, RecordLayout};
pub use lock::RunLock;
pub use selector::{Ambiguity, Candidate, Selection};
pub use settings::{PipelineSettings, ResumePolicy};
pub use store::{HistoryStore, Scope, VersionedStore};
pub use workspace::{Area, Workspace};
