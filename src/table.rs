use crate::error::Error;
use crate::names::Position;
use crate::stats::Statistic;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use std::io::Write;

/// Statistics per timepoint (rows) for every position and statistic (columns).
///
/// Cells without a trace are NaN.
#[derive(Clone, Debug)]
pub struct StatisticsTable {
    times: IndexMap<OrderedFloat<f64>, usize>,
    columns: IndexSet<(Position, Statistic)>,
    values: Array2<f64>,
}

impl StatisticsTable {
    /// `times` become the rows as given; columns are every position (first seen first) with
    /// every statistic.
    pub fn new(times: &[f64], positions: &[Position], statistics: &[Statistic]) -> Self {
        let times: IndexMap<_, _> = times
            .iter()
            .map(|t| OrderedFloat(*t))
            .unique()
            .enumerate()
            .map(|(i, t)| (t, i))
            .collect();
        let columns: IndexSet<_> = positions
            .iter()
            .unique()
            .cartesian_product(statistics.iter())
            .map(|(p, s)| (*p, *s))
            .collect();
        let values = Array2::from_elem((times.len(), columns.len()), f64::NAN);
        StatisticsTable {
            times,
            columns,
            values,
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.times.keys().map(|t| t.0).collect()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.columns.iter().map(|(p, _)| *p).unique().collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &(Position, Statistic)> {
        self.columns.iter()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row_of(&self, time: f64) -> Option<usize> {
        self.times.get(&OrderedFloat(time)).copied()
    }

    pub fn get(&self, time: f64, position: Position, statistic: Statistic) -> Option<f64> {
        let row = self.row_of(time)?;
        let col = self.columns.get_index_of(&(position, statistic))?;
        Some(self.values[[row, col]])
    }

    /// Write a cell, false if the table has no such row or column.
    pub fn set(
        &mut self,
        time: f64,
        position: Position,
        statistic: Statistic,
        value: f64,
    ) -> bool {
        match (
            self.row_of(time),
            self.columns.get_index_of(&(position, statistic)),
        ) {
            (Some(row), Some(col)) => {
                self.values[[row, col]] = value;
                true
            }
            _ => false,
        }
    }

    pub fn column(&self, position: Position, statistic: Statistic) -> Option<ArrayView1<'_, f64>> {
        let col = self.columns.get_index_of(&(position, statistic))?;
        Some(self.values.column(col))
    }

    /// Tab separated, a header row with `position:statistic` per column and a row per timepoint
    /// led by its time. Empty cells are written as NaN.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        writeln!(
            writer,
            "time\t{}",
            self.columns
                .iter()
                .map(|(p, s)| format!("{p}:{s}"))
                .join("\t")
        )?;
        for (time, row) in self.times.keys().zip(self.values.rows()) {
            writeln!(writer, "{}\t{}", time.0, row.iter().join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StatisticsTable {
        StatisticsTable::new(&[-1.0, 0.0, 0.5, 1.0], &[8, 13, 8], &Statistic::ALL)
    }

    #[test]
    fn layout() {
        let table = table();
        assert_eq!(table.shape(), (4, 6));
        assert_eq!(table.positions(), vec![8, 13]);
        assert_eq!(
            table.columns().take(4).copied().collect::<Vec<_>>(),
            vec![
                (8, Statistic::MinMax),
                (8, Statistic::Slope),
                (8, Statistic::Missing),
                (13, Statistic::MinMax)
            ]
        );
        assert!(table.values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn set_and_get() {
        let mut table = table();
        assert!(table.set(0.5, 13, Statistic::Slope, 1.5));
        assert!(table.set(0.5, 13, Statistic::Slope, 2.5));
        assert_eq!(table.get(0.5, 13, Statistic::Slope), Some(2.5));
        assert!(table.get(0.0, 13, Statistic::Slope).unwrap().is_nan());
        assert!(!table.set(7.0, 13, Statistic::Slope, 1.0));
        assert!(!table.set(0.5, 14, Statistic::Slope, 1.0));
        assert_eq!(table.column(13, Statistic::Slope).unwrap()[2], 2.5);
    }

    #[test]
    fn nan_rows() {
        let mut table = StatisticsTable::new(&[f64::NAN, -1.0, f64::NAN], &[1], &Statistic::ALL);
        assert_eq!(table.shape(), (2, 3));
        assert!(table.set(f64::NAN, 1, Statistic::MinMax, 0.25));
        assert_eq!(table.get(f64::NAN, 1, Statistic::MinMax), Some(0.25));
    }

    #[test]
    fn tsv() -> Result<(), Error> {
        let mut table = StatisticsTable::new(&[-1.0, 0.5], &[4], &[Statistic::MinMax]);
        table.set(0.5, 4, Statistic::MinMax, 0.25);
        let mut buffer = Vec::new();
        table.write_tsv(&mut buffer)?;
        assert_eq!(
            String::from_utf8_lossy(&buffer),
            "time\t4:min_max\n-1\tNaN\n0.5\t0.25\n"
        );
        Ok(())
    }
}
