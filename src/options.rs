use crate::error::Error;
use crate::names::NameParser;
use crate::stats::{Statistic, kernel_radius};
use serde::{Deserialize, Serialize};

/// Parameters of the trace statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatOptions {
    /// smooth traces with a gaussian filter of this width before computing slope and missing
    /// fluorescence
    pub sigma: Option<f64>,
    /// baseline for the missing fluorescence, estimated from the margins if absent
    pub height: Option<f64>,
    /// number of values at both ends of a trace used to estimate the baseline
    pub margins: usize,
}

impl Default for StatOptions {
    fn default() -> Self {
        StatOptions {
            sigma: None,
            height: None,
            margins: 50,
        }
    }
}

impl StatOptions {
    pub fn new(sigma: Option<f64>, height: Option<f64>, margins: usize) -> Result<Self, Error> {
        if let Some(sigma) = sigma {
            kernel_radius(sigma)?;
        }
        Ok(StatOptions {
            sigma,
            height,
            margins,
        })
    }
}

/// Configuration of [crate::process::traces_dict].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceOptions {
    /// series to process, all series if None
    pub series: Option<Vec<usize>>,
    /// channel containing the image to be traced
    pub channel: usize,
    pub names: NameParser,
    pub statistics: Vec<Statistic>,
    pub stat_options: StatOptions,
    /// keep the z projected images with the traces
    pub return_images: bool,
    /// leave the statistics of images without fluorescence empty
    pub skip_bad_images: bool,
    pub bad_image_threshold: f64,
}

impl Default for TraceOptions {
    fn default() -> Self {
        TraceOptions {
            series: None,
            channel: 0,
            names: NameParser::default(),
            statistics: Statistic::ALL.to_vec(),
            stat_options: StatOptions::default(),
            return_images: false,
            skip_bad_images: false,
            bad_image_threshold: 100.0,
        }
    }
}
