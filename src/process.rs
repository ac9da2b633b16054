//! Process an image file into traces and a table of statistics per embryo and timepoint.

use crate::axes::{AxisOrder, Selection};
use crate::error::Error;
use crate::metadata::{METADATA_ORDER, metadata};
use crate::names::Position;
use crate::options::TraceOptions;
use crate::reader::ImageSource;
use crate::stats::{Statistic, bad_image};
use crate::table::StatisticsTable;
use crate::trace::{Trace, traces};
use crate::view::series_iter;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Order in which series are read, C is dropped after selecting a single channel.
pub const TRACE_ORDER: &str = "TZCYX";

/// Everything recorded for one embryo, in the order the series were read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionTraces {
    pub times: Vec<f64>,
    pub traces: Vec<Trace>,
    /// z projections, only kept when asked for
    pub images: Vec<Array2<f64>>,
}

/// Traces per position, in the order positions are first seen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TracesByPosition(IndexMap<Position, PositionTraces>);

impl TracesByPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, position: Position) -> &mut PositionTraces {
        self.0.entry(position).or_default()
    }

    pub fn get(&self, position: Position) -> Option<&PositionTraces> {
        self.0.get(&position)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Position, &PositionTraces)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// All timepoints, sorted and unique, assuming that series starting at the same time cover the
/// same times: of those only the first is used.
pub fn global_timepoints(times: &[Vec<f64>]) -> Vec<f64> {
    times
        .iter()
        .filter_map(|t| Some((OrderedFloat(*t.first()?), t)))
        .unique_by(|(start, _)| *start)
        .flat_map(|(_, t)| t.iter().copied().map(OrderedFloat))
        .sorted()
        .dedup()
        .map(|t| t.0)
        .collect()
}

/// Read every series of a file, trace its z projected images and compute the statistics.
pub fn traces_dict<S>(
    source: &S,
    options: &TraceOptions,
) -> Result<(TracesByPosition, StatisticsTable), Error>
where
    S: ImageSource + ?Sized,
{
    let all = metadata(source, &METADATA_ORDER.parse()?)?;
    let ids = match &options.series {
        Some(ids) => {
            if let Some(id) = ids.iter().find(|&&id| id >= all.len()) {
                return Err(Error::Validation(format!(
                    "series {id} out of range, the file has {} series",
                    all.len()
                )));
            }
            ids.clone()
        }
        None => (0..all.len()).collect(),
    };
    let names: Vec<&str> = ids.iter().map(|&id| all[id].name.as_str()).collect();
    let parsed = names
        .iter()
        .map(|name| options.names.parse(name))
        .collect::<Result<Vec<_>, _>>()?;
    let positions: Vec<Position> = parsed.iter().map(|(p, _)| *p).collect();
    let times: Vec<Vec<f64>> = parsed.iter().map(|(_, t)| t.clone()).collect();
    let mut table = StatisticsTable::new(
        &global_timepoints(&times),
        &positions,
        &options.statistics,
    );
    info!(
        series = ids.len(),
        positions = table.positions().len(),
        timepoints = table.shape().0,
        "extracting traces"
    );

    let order: AxisOrder = TRACE_ORDER.parse()?;
    let stacks = series_iter(
        source,
        Some(ids.clone()),
        Some(order),
        Selection::channel(options.channel),
    )?;
    let mut by_position = TracesByPosition::new();
    let series = ids.iter().zip(&names).zip(parsed).zip(stacks);
    for (((id, name), (position, times)), stack) in series {
        let images = stack?.squeeze_axis(2)?.project_z()?;
        debug!(series = id, position, images = images.len(), "read series");
        if images.len() != times.len() {
            warn!(
                series = id,
                name,
                times = times.len(),
                images = images.len(),
                "number of timepoints and images differ, using the shorter"
            );
        }
        let n = images.len().min(times.len());
        let times = &times[..n];
        let images = &images[..n];
        let current = traces(images);

        let stats = current
            .par_iter()
            .zip(images.par_iter())
            .map(|(trace, image)| {
                if options.skip_bad_images && bad_image(image.view(), options.bad_image_threshold) {
                    return Ok(None);
                }
                options
                    .statistics
                    .iter()
                    .map(|stat| -> Result<(Statistic, f64), Error> {
                        Ok((*stat, stat.compute(trace.view(), &options.stat_options)?))
                    })
                    .collect::<Result<Vec<_>, Error>>()
                    .map(Some)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        for (time, values) in times.iter().zip(stats) {
            if table.row_of(*time).is_none() {
                return Err(Error::Validation(format!(
                    "timepoint {time} of series {id} ({name}) is not covered by the first series \
                     starting at {}",
                    times[0]
                )));
            }
            let Some(values) = values else {
                debug!(
                    series = id,
                    position,
                    time,
                    "bad image, statistics left empty"
                );
                continue;
            };
            for (stat, value) in values {
                table.set(*time, position, stat, value);
            }
        }

        let entry = by_position.get_or_insert(position);
        entry.times.extend_from_slice(times);
        entry.traces.extend(current);
        if options.return_images {
            entry.images.extend(images.iter().cloned());
        }
    }
    Ok((by_position, table))
}
