use crate::axes::{Axis, AxisOrder, Selection, permutation, select_indices};
use crate::error::Error;
use crate::reader::ImageSource;
use crate::trace;
use ndarray::{Array2, ArrayD, ErrorKind, IxDyn, ShapeError, SliceInfoElem};
use num::{FromPrimitive, Zero};
use tracing::debug;

const FULL: SliceInfoElem = SliceInfoElem::Slice {
    start: 0,
    end: None,
    step: 1,
};

/// Read the selected planes of a series into an array with axes in `desired` order.
///
/// The series id is checked before anything is read. Without `desired` the axes are in the
/// reverse of the native order of the source.
pub fn materialize<T, S>(
    source: &S,
    series: usize,
    desired: Option<&AxisOrder>,
    selection: &Selection,
) -> Result<ArrayD<T>, Error>
where
    T: FromPrimitive + Zero + Clone + 'static,
    S: ImageSource + ?Sized,
{
    source.check_series(series)?;
    let native = source.axis_order(series)?;
    let shape = source.sizes(series)?;
    let desired = match desired {
        Some(order) => order.clone(),
        None => native.reversed(),
    };
    let perm = permutation(&native, &desired)?;
    let (planes, selected_shape) = select_indices(&shape, &native, selection)?;
    let out_shape: Vec<usize> = perm.iter().map(|&i| selected_shape[i]).collect();

    let (Some(y), Some(x)) = (desired.position(Axis::Y), desired.position(Axis::X)) else {
        return Err(Error::Format(format!(
            "series {series} with axes {native} has no Y and X axes"
        )));
    };
    let frame_shape = [out_shape[y], out_shape[x]];
    let mut array = ArrayD::<T>::zeros(IxDyn(&out_shape));
    let mut slice = vec![FULL; desired.len()];
    debug!(series, %native, %desired, planes = planes.len(), "materialize series");
    for plane in planes {
        for (i, axis) in desired.axes().iter().enumerate() {
            if let Some(offset) = plane.offset_of(*axis) {
                slice[i] = SliceInfoElem::Index(offset as isize);
            }
        }
        let frame: Array2<T> = source
            .read_plane(series, plane.c, plane.z, plane.t)?
            .try_into()?;
        if frame.shape() != frame_shape {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        let mut target = array.slice_mut(slice.as_slice());
        if x < y {
            target.assign(&frame.t());
        } else {
            target.assign(&frame);
        }
    }
    Ok(array)
}

/// A materialized series, integer pixels are widened to i64 and floating point pixels to f64.
#[derive(Clone, Debug, PartialEq)]
pub enum Stack {
    Int(ArrayD<i64>),
    Float(ArrayD<f64>),
}

impl Stack {
    pub fn shape(&self) -> &[usize] {
        match self {
            Stack::Int(a) => a.shape(),
            Stack::Float(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Remove an axis of length 1.
    pub fn squeeze_axis(self, axis: usize) -> Result<Self, Error> {
        match self.shape().get(axis) {
            Some(1) => {}
            Some(n) => {
                return Err(Error::Validation(format!(
                    "cannot drop axis {axis} of length {n}"
                )));
            }
            None => return Err(Error::DimensionalityMismatch(axis + 1, self.ndim())),
        }
        Ok(match self {
            Stack::Int(a) => Stack::Int(a.index_axis_move(ndarray::Axis(axis), 0)),
            Stack::Float(a) => Stack::Float(a.index_axis_move(ndarray::Axis(axis), 0)),
        })
    }

    /// Sum out z of a (T, Z, Y, X) or (Z, Y, X) stack, see [trace::project_z].
    pub fn project_z(&self) -> Result<Vec<Array2<f64>>, Error> {
        match self {
            Stack::Int(a) => Ok(trace::project_z(a)?
                .into_iter()
                .map(|image| image.mapv(|v| v as f64))
                .collect()),
            Stack::Float(a) => trace::project_z(a),
        }
    }
}

/// [materialize] a series in the element type matching its pixel type.
pub fn read_image_series<S>(
    source: &S,
    series: usize,
    desired: Option<&AxisOrder>,
    selection: &Selection,
) -> Result<Stack, Error>
where
    S: ImageSource + ?Sized,
{
    source.check_series(series)?;
    let stack = if source.pixel_type(series)?.is_float() {
        Stack::Float(materialize(source, series, desired, selection)?)
    } else {
        Stack::Int(materialize(source, series, desired, selection)?)
    };
    Ok(stack)
}

/// Lazily read a list of series, one [Stack] at a time.
pub struct SeriesIter<'a, S: ?Sized> {
    source: &'a S,
    series: std::vec::IntoIter<usize>,
    desired: Option<AxisOrder>,
    selection: Selection,
}

impl<S: ImageSource + ?Sized> Iterator for SeriesIter<'_, S> {
    type Item = Result<Stack, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let series = self.series.next()?;
        Some(read_image_series(
            self.source,
            series,
            self.desired.as_ref(),
            &self.selection,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.series.size_hint()
    }
}

/// Iterate over `series` (all series of the source if None).
pub fn series_iter<'a, S>(
    source: &'a S,
    series: Option<Vec<usize>>,
    desired: Option<AxisOrder>,
    selection: Selection,
) -> Result<SeriesIter<'a, S>, Error>
where
    S: ImageSource + ?Sized,
{
    let series = match series {
        Some(series) => series,
        None => (0..source.series_count()?).collect(),
    };
    Ok(SeriesIter {
        source,
        series: series.into_iter(),
        desired,
        selection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::AxisSelector;
    use crate::memory::{MemorySeries, MemorySource};
    use crate::reader::{Frame, PixelType};
    use std::cell::Cell;

    fn order(s: &str) -> AxisOrder {
        s.parse().unwrap()
    }

    fn value(t: usize, z: usize, y: usize, x: usize) -> u16 {
        (t * 1000 + z * 100 + y * 10 + x) as u16
    }

    fn source() -> MemorySource {
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4, 5]), |ix| {
            value(ix[0], ix[1], ix[2], ix[3])
        });
        let pre = MemorySeries::new("Pre/Pos001_S001", "TZYX", data.clone());
        let ranged = MemorySeries::new("0h to 0.5h/Pos002_S001", "XYZT", data.reversed_axes());
        MemorySource::new(vec![pre.unwrap(), ranged.unwrap()])
    }

    #[test]
    fn default_order_is_reversed() -> Result<(), Error> {
        let array: ArrayD<i64> = materialize(&source(), 0, None, &Selection::default())?;
        assert_eq!(array.shape(), &[5, 4, 3, 2]);
        assert_eq!(array[[4, 3, 2, 1]], value(1, 2, 3, 4) as i64);
        Ok(())
    }

    #[test]
    fn desired_order_and_selection() -> Result<(), Error> {
        let selection = Selection {
            z: AxisSelector::Subset(vec![2, 0]),
            t: AxisSelector::Single(1),
            ..Default::default()
        };
        for series in 0..2 {
            let array: ArrayD<u16> =
                materialize(&source(), series, Some(&order("TZYX")), &selection)?;
            assert_eq!(array.shape(), &[1, 2, 4, 5]);
            assert_eq!(array[[0, 0, 1, 3]], value(1, 2, 1, 3));
            assert_eq!(array[[0, 1, 3, 4]], value(1, 0, 3, 4));
        }
        Ok(())
    }

    #[test]
    fn transposed_planes() -> Result<(), Error> {
        let selection = Selection::default();
        let array: ArrayD<u16> = materialize(&source(), 0, Some(&order("ZXTY")), &selection)?;
        assert_eq!(array.shape(), &[3, 5, 2, 4]);
        assert_eq!(array[[2, 4, 1, 3]], value(1, 2, 3, 4));
        Ok(())
    }

    #[test]
    fn mismatched_order() {
        let selection = Selection::default();
        assert!(matches!(
            materialize::<u16, _>(&source(), 0, Some(&order("CZYX")), &selection),
            Err(Error::Configuration(_))
        ));
    }

    struct Counting {
        reads: Cell<usize>,
        size: usize,
    }

    impl ImageSource for Counting {
        fn series_count(&self) -> Result<usize, Error> {
            Ok(1)
        }

        fn axis_order(&self, _: usize) -> Result<AxisOrder, Error> {
            "TYX".parse()
        }

        fn sizes(&self, _: usize) -> Result<Vec<usize>, Error> {
            Ok(vec![2, 4, 4])
        }

        fn pixel_type(&self, _: usize) -> Result<PixelType, Error> {
            Ok(PixelType::U16)
        }

        fn read_plane(&self, _: usize, _: usize, _: usize, _: usize) -> Result<Frame, Error> {
            self.reads.set(self.reads.get() + 1);
            Ok(Frame::U16(Array2::zeros((self.size, self.size))))
        }

        fn ome_xml(&self) -> Result<String, Error> {
            Ok(String::new())
        }
    }

    #[test]
    fn invalid_series_reads_nothing() {
        let source = Counting {
            reads: Cell::new(0),
            size: 4,
        };
        assert!(matches!(
            read_image_series(&source, 5, None, &Selection::default()),
            Err(Error::Validation(_))
        ));
        assert_eq!(source.reads.get(), 0);
        let selection = Selection::default();
        assert!(read_image_series(&source, 0, None, &selection).is_ok());
        assert_eq!(source.reads.get(), 2);
    }

    #[test]
    fn frames_of_the_wrong_size() {
        let source = Counting {
            reads: Cell::new(0),
            size: 3,
        };
        assert!(matches!(
            materialize::<i64, _>(&source, 0, None, &Selection::default()),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn widened_projection() {
        let data = ArrayD::from_elem(IxDyn(&[2, 3, 1, 2, 2]), 60000u16);
        let source = MemorySource::new(vec![MemorySeries::new("x", "TZCYX", data).unwrap()]);
        let stack = read_image_series(&source, 0, Some(&order("TZCYX")), &Selection::channel(0))
            .unwrap()
            .squeeze_axis(2)
            .unwrap();
        assert_eq!(stack.shape(), &[2, 3, 2, 2]);
        let images = stack.project_z().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0], Array2::from_elem((2, 2), 180000.0));
    }

    #[test]
    fn iterate_series() -> Result<(), Error> {
        let source = source();
        let shapes: Vec<_> = series_iter(&source, None, Some(order("ZTYX")), Selection::default())?
            .map(|stack| stack.map(|s| s.shape().to_vec()))
            .collect::<Result<_, _>>()?;
        assert_eq!(shapes, vec![vec![3, 2, 4, 5], vec![3, 2, 4, 5]]);
        let mut iter = series_iter(&source, Some(vec![1, 7]), None, Selection::default())?;
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(iter.next(), Some(Err(Error::Validation(_)))));
        assert!(iter.next().is_none());
        Ok(())
    }
}
