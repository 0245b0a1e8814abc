//! # dicom-smooth
//!
//! A demonstration processing module for DICOM image-routing hosts.
//!
//! The host drops a directory of slices named `<seriesUID>#<sopUID>.dcm`
//! next to a `task.json` descriptor and invokes this module with the input
//! and output directory paths. The module then, strictly sequentially:
//!
//!  1. groups the incoming files into series by filename prefix,
//!  2. applies a 2D Gaussian smoothing filter to every slice and writes
//!     the result under a freshly generated series UID, and
//!  3. attaches one Basic Text SR document per series that names the
//!     applied filter and references the first image as evidence.
//!
//! This library is part of the dicom-rs ecosystem and leverages its
//! components for reading, re-tagging and writing DICOM instances. The
//! filter strength (`sigma`) and the series-number offset applied to the
//! output can be overridden through the task descriptor:
//!
//! ```json
//! { "process": { "settings": { "sigma": 3, "series_offset": 3000 } } }
//! ```
//!
//! Scheduling, containerization and delivery of the results are the host's
//! concern; the module runs to completion or aborts with a non-zero exit
//! status.
//!
//! # Examples
//!
//! Processing a prepared input directory with default settings:
//!
//! ```no_run
//! # use dicom_smooth::{module, settings::Settings, uid::RandomUid};
//! # use std::path::Path;
//! let settings = Settings::load(Path::new("in"))
//!     .expect("should have loaded the task descriptor");
//! let summary = module::run(Path::new("in"), Path::new("out"), &settings, &RandomUid)
//!     .expect("should have processed all series");
//! println!("{} series, {} slices", summary.series, summary.slices);
//! ```

pub mod filter;
pub mod module;
pub mod pixels;
pub mod process;
pub mod report;
pub mod series;
pub mod settings;
pub mod uid;
