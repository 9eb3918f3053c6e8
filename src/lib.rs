//! # photo-label
//!
//! Tag photos with labels from an image-recognition service and store them as
//! IPTC keywords inside the JPEG, once per photo, without losing existing
//! keywords or touching any other byte of the file.
//!
//! ## Quick Start
//!
//! Walk a directory tree and tag everything that has not been tagged yet:
//!
//! ```rust,no_run
//! use photo_label::config::Config;
//! use photo_label::pipeline::{LogReporter, walk_and_tag};
//! use photo_label::vision::GoogleVisionService;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let service = GoogleVisionService::from_config(&config.vision);
//!
//!     let summary = walk_and_tag(Path::new("./photos"), &service, &config, &mut LogReporter).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## How a photo is tagged
//!
//! 1. The IPTC record is read from the Photoshop APP13 segment ([`iptc::load_record`]).
//!    A record whose `custom1` field holds the processed marker is left alone.
//! 2. The raw image goes to a [`vision::LabelService`]; [`vision::select_labels`]
//!    keeps the confident labels, best first.
//! 3. New labels are appended to the existing keywords and the marker is set
//!    ([`iptc::MetadataRecord::merge`]).
//! 4. The original is copied to `photo.jpg~` ([`iptc::backup::protect`]), then
//!    the photo is rewritten in place with the new APP13 segment.
//!
//! A leftover `~` backup means an earlier run was interrupted on that file;
//! the photo is not touched again until the backup is dealt with.
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading
//! - [`iptc`] — JPEG container codec, IPTC record, backups
//! - [`vision`] — Label service trait, Google Cloud Vision client, label selection
//! - [`pipeline`] — Single-file labeling and the directory walk

pub mod config;
pub mod error;
pub mod iptc;
pub mod pipeline;
pub mod vision;

#[cfg(test)]
mod testing;

pub use error::LabelError;
