//! # Gallery Sync
//!
//! Keeps a portfolio website's JSON gallery catalogs in step with the image
//! folders the artist drops files into. Images are renamed to web-safe names,
//! their embedded IPTC/EXIF captions become catalog fields, and every change
//! is committed and pushed so the site redeploys.
//!
//! # Architecture: One Pass, Many Triggers
//!
//! All work happens in a *pass*, a full reconciliation of every configured
//! gallery:
//!
//! ```text
//! list dir → normalize names → read metadata → reconcile → write catalog
//!                                                    └──▶ (any changed) publish
//! ```
//!
//! A pass always looks at the whole directory, never at the event that
//! triggered it. Watcher events only decide *when* the next pass runs, so a
//! missed or coalesced event can never leave a catalog stale.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Canonical filename normalization and collision-safe renames |
//! | [`scan`] | Gallery directory listing, applies renames, yields the images of a pass |
//! | [`metadata`] | IPTC-IIM / EXIF parsing behind the [`metadata::MetadataReader`] capability |
//! | [`catalog`] | Catalog JSON model, atomic load/save, reconciliation with stable ids |
//! | [`sync`] | One pass over all galleries, per-gallery failure isolation |
//! | [`publish`] | The [`publish::Publisher`] capability and its git implementation |
//! | [`watch`] | notify-based directory watcher with per-file debounce |
//! | [`orchestrator`] | Idle / Syncing / SyncingWithPending state machine driving passes |
//! | [`config`] | `gallery-sync.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Identity by `src`
//!
//! A catalog entry belongs to the file whose web path equals its `src`. The
//! `id` is minted once and never recomputed, so correcting a title in
//! Lightroom updates the entry in place instead of creating a new one. A
//! renamed file becomes a new entry.
//!
//! ## Never Overwrite
//!
//! Normalizing `Sunset Bay.JPG` to `sunset-bay.jpg` must not clobber an
//! existing `sunset-bay.jpg`. Conflicting renames are skipped and reported;
//! the file is still cataloged under its original name.
//!
//! ## Queue Depth One
//!
//! The orchestrator runs one pass at a time and remembers at most one more.
//! Because every pass is a full reconciliation, one queued pass absorbs any
//! number of triggers that arrived while the previous one ran.

pub mod catalog;
pub mod config;
pub mod metadata;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod publish;
pub mod scan;
pub mod sync;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
