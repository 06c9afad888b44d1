//! # PG Gallery
//!
//! Image ingestion for accommodation galleries (PG locations, rooms, beds).
//! A user selects files; each one is compressed to a JPEG byte budget,
//! checked against a hard size ceiling, uploaded to remote storage, and its
//! public URL appended to the owning entity's ordered image list.
//!
//! # Architecture: Per-File Pipeline, Batch Commit
//!
//! ```text
//! ImageFile ─► data URI ─► decode ─► compress(budget) ─► validate(ceiling) ─► upload ─► URL
//!    (source)              (imaging)                                          (upload)
//!
//! gallery: run one pipeline per accepted file concurrently, then commit
//!          existing ++ [url₁ … urlₙ] (selection order) to the owner
//! ```
//!
//! - **Pure imaging core**: compression and validation are synchronous
//!   functions over an [`ImageBackend`](imaging::ImageBackend), so the byte
//!   budget loop is tested against a recording mock without encoding pixels.
//! - **Async edges**: reading, uploading and auto-save are async; CPU-bound
//!   work runs on tokio's blocking pool.
//! - **Owner holds the list**: the [`gallery`] never stores images itself. It
//!   takes the current list, computes the next one and hands it back.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Selected files: read from disk, MIME guess, data URI encoding |
//! | [`imaging`] | Raster backend trait, byte-budget compressor, size validator |
//! | [`upload`] | Upload wire types, `Uploader` trait, reqwest client |
//! | [`naming`] | Collision-free upload file names |
//! | [`gallery`] | Gallery state manager: normalize, add, remove, jobs, auto-save |
//! | [`store`] | JSON manifest used as the CLI's owning record and auto-save hook |
//! | [`config`] | Layered `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Quality As Integer Percent
//!
//! The schedule steps quality by 0.15 down to a 0.20 floor. Carried as
//! floats, `0.8 - 4 * 0.15` lands just under `0.2` and the floor check
//! misfires. [`Quality`](imaging::Quality) stores whole percents, so the
//! sequence is exactly 80, 65, 50, 35, 20.
//!
//! ## Size From Base64 Length
//!
//! The compressor and validator measure the payload from the data URI's
//! base64 body (`len * 3 / 4` minus padding) rather than re-decoding it.
//! This is exact for well-formed base64 and needs no allocation.
//!
//! ## All-Or-Nothing Batches
//!
//! Per-file pipelines are joined with `try_join_all`: the first failure
//! cancels the rest and nothing is appended. Uploads that already finished
//! stay in remote storage; no cleanup is attempted.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing (Lanczos3) and JPEG encoding use the `image` crate
//! only. No system libraries, no headless browser.

pub mod config;
pub mod gallery;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod source;
pub mod store;
pub mod upload;
