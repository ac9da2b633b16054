//! Quantify spinal cord lesions in zebrafish from multi-series microscope files: parse the series
//! names into embryo positions and timepoints, trace the fluorescence along the cord and compute
//! statistics on those traces.

pub mod axes;
#[cfg(feature = "bioformats")]
pub mod bioformats;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod names;
pub mod options;
pub mod process;
pub mod reader;
pub mod session;
pub mod stats;
pub mod table;
pub mod trace;
pub mod view;

pub use axes::{Axis, AxisOrder, AxisSelector, Selection};
#[cfg(feature = "bioformats")]
pub use bioformats::{BioFormatsSource, download_bioformats};
pub use error::Error;
pub use memory::{MemorySeries, MemorySource};
pub use metadata::{SeriesMetadata, parse_metadata};
pub use names::{MarkSentinel, NameParser, Position};
pub use options::{StatOptions, TraceOptions};
pub use process::{PositionTraces, TracesByPosition, traces_dict};
pub use reader::{Frame, ImageSource, PixelType, lif_metadata_string_size};
pub use session::Session;
pub use stats::Statistic;
pub use table::StatisticsTable;
