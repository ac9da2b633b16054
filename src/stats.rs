//! Statistics of the traces of an injured spinal cord. The most basic one is min/max, the ratio
//! of the dimmest to the brightest point of the cord.

use crate::error::Error;
use crate::options::StatOptions;
use crate::trace::Trace;
use ndarray::{Array1, ArrayView, ArrayView1, Dimension, s};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The statistics in the columns of a [crate::table::StatisticsTable].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    MinMax,
    Slope,
    Missing,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::MinMax, Statistic::Slope, Statistic::Missing];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::MinMax => "min_max",
            Statistic::Slope => "slope",
            Statistic::Missing => "missing",
        }
    }

    pub fn compute(&self, trace: ArrayView1<'_, f64>, options: &StatOptions) -> Result<f64, Error> {
        match self {
            Statistic::MinMax => min_max(trace),
            Statistic::Slope => slope(trace, options.sigma),
            Statistic::Missing => {
                missing_fluorescence(trace, options.sigma, options.height, options.margins)
            }
        }
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.name() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown statistic {s}")))
    }
}

fn check_empty(trace: &ArrayView1<'_, f64>) -> Result<(), Error> {
    if trace.is_empty() {
        Err(Error::EmptyTrace)
    } else {
        Ok(())
    }
}

fn smooth(trace: ArrayView1<'_, f64>, sigma: Option<f64>) -> Result<Trace, Error> {
    match sigma {
        Some(sigma) => gaussian_filter1d(trace, sigma),
        None => Ok(trace.to_owned()),
    }
}

/// Ratio of the minimum over the maximum of a trace, NaN or infinite when the maximum is zero.
pub fn min_max(trace: ArrayView1<'_, f64>) -> Result<f64, Error> {
    check_empty(&trace)?;
    let min = trace.fold(f64::INFINITY, |prev, curr| prev.min(*curr));
    let max = trace.fold(f64::NEG_INFINITY, |prev, curr| prev.max(*curr));
    Ok(min / max)
}

/// Absolute slope between the first minimum and the first maximum of a trace, optionally after
/// smoothing with a gaussian of width `sigma`.
pub fn slope(trace: ArrayView1<'_, f64>, sigma: Option<f64>) -> Result<f64, Error> {
    check_empty(&trace)?;
    let tr = smooth(trace, sigma)?;
    let (mut m, mut big_m) = (0, 0);
    for (i, &v) in tr.iter().enumerate() {
        if v < tr[m] {
            m = i;
        }
        if v > tr[big_m] {
            big_m = i;
        }
    }
    if m == big_m {
        return Err(Error::DegenerateTrace(m));
    }
    Ok(((tr[m] - tr[big_m]) / (m as f64 - big_m as f64)).abs())
}

/// Area between a baseline at `height` and the trace.
///
/// Without `height` the baseline is the mean of the first and last `margins` values, the trace
/// needs to be at least twice that long. The trace is smoothed (with `sigma`) after estimating the
/// baseline and clipped into `[0, height]` before integration.
pub fn missing_fluorescence(
    trace: ArrayView1<'_, f64>,
    sigma: Option<f64>,
    height: Option<f64>,
    margins: usize,
) -> Result<f64, Error> {
    check_empty(&trace)?;
    let height = match height {
        Some(height) => height,
        None => {
            let len = trace.len();
            if margins == 0 || len < 2 * margins {
                return Err(Error::MarginTooWide(len, margins));
            }
            let ends = &trace.slice(s![..margins]) + &trace.slice(s![len - margins..]);
            ends.sum() / margins as f64 / 2.0
        }
    };
    let tr = smooth(trace, sigma)?;
    Ok(tr.iter().map(|v| height - v.max(0.0).min(height)).sum())
}

/// Index into a signal of length `n` mirrored at both ends: `d c b a | a b c d | d c b a`.
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Largest half width of the gaussian kernel.
pub const MAX_KERNEL_RADIUS: usize = 1 << 16;

/// Radius of the gaussian kernel of width `sigma`, truncated at four sigma.
pub(crate) fn kernel_radius(sigma: f64) -> Result<usize, Error> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::Configuration(format!(
            "sigma has to be positive, not {sigma}"
        )));
    }
    let radius = 4.0 * sigma + 0.5;
    if radius > MAX_KERNEL_RADIUS as f64 {
        return Err(Error::Configuration(format!(
            "sigma {sigma} is too large, the kernel radius is limited to {MAX_KERNEL_RADIUS}"
        )));
    }
    Ok(radius as usize)
}

/// Smooth a trace with a normalized gaussian kernel truncated at four sigma, mirroring the trace
/// at its ends.
pub fn gaussian_filter1d(trace: ArrayView1<'_, f64>, sigma: f64) -> Result<Trace, Error> {
    let radius = kernel_radius(sigma)? as isize;
    let n = trace.len();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    Ok(Array1::from_shape_fn(n, |i| {
        weights
            .iter()
            .zip(-radius..=radius)
            .map(|(w, d)| w * trace[reflect(i as isize + d, n)])
            .sum::<f64>()
            / total
    }))
}

/// Images of a dead or misaligned embryo show little fluorescence: true when no pixel reaches
/// `threshold`.
pub fn bad_image<D: Dimension>(image: ArrayView<'_, f64, D>, threshold: f64) -> bool {
    image.fold(f64::NEG_INFINITY, |prev, curr| prev.max(*curr)) < threshold
}
