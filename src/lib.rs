//! # tripnote
//!
//! Turn a folder of geotagged photos into map-ready notes for a Markdown note
//! library: one trip note holding the frontmatter properties and a Leaflet map
//! block, plus one marker note per photo that places it on that map.
//!
//! GPS coordinates read from EXIF are WGS-84. Chinese map tiles expect GCJ-02,
//! so every coordinate goes through the AMap convert API before it is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tripnote::config::Config;
//! use tripnote::pipeline::{Pipeline, PipelineSettings, build_service};
//! use tripnote::request::TravelRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let service = build_service(&config)?;
//!     let mut pipeline = Pipeline::new(service, PipelineSettings::from_config(&config));
//!
//!     let request = TravelRequest {
//!         trip_name: "Hangzhou".into(),
//!         trip_date: "2024-05-01".into(),
//!         input_dir: "./photos".into(),
//!         output_dir: "./vault/Trips".into(),
//!         properties: config.properties.clone(),
//!     };
//!
//!     let report = pipeline.run(&request).await?;
//!     println!("{} photo(s) on the map", report.valid_count);
//!     for photo in &report.invalid_photos {
//!         println!("skipped {}: {}", photo.file_name, photo.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! <output>/<trip>/<trip>.md             trip note
//! <output>/<trip>/markers/<lat>,<long>.md  one per photo
//! <output>/<trip>/pictures/              archive fallback
//! ```
//!
//! ## Modules
//!
//! - [`request`]: trip request and frontmatter property kinds
//! - [`scanner`]: photo discovery and classification
//! - [`exif`]: EXIF reading
//! - [`geocode`]: coordinate conversion service and bounded fan-out
//! - [`center`]: map center
//! - [`compose`]: trip note and marker rendering
//! - [`archive`]: photo copy/transcode and original removal
//! - [`pipeline`]: the whole flow
//! - [`config`]: configuration loading/saving

pub mod archive;
pub mod center;
pub mod compose;
pub mod config;
pub mod error;
pub mod exif;
pub mod geocode;
pub mod model;
pub mod pipeline;
pub mod request;
pub mod scanner;
