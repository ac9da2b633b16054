use crate::axes::{Axis, AxisOrder};
use crate::error::Error;
use crate::reader::{Frame, ImageSource, PixelType};
use ndarray::{ArrayD, Ix2, SliceInfoElem};
use quick_xml::escape::escape;
use std::fmt::Write;

/// One series of a [MemorySource].
#[derive(Clone, Debug)]
pub struct MemorySeries {
    pub name: String,
    pub order: AxisOrder,
    pub data: ArrayD<u16>,
    /// physical size of a voxel along x, y and z
    pub resolution: [f64; 3],
}

impl MemorySeries {
    pub fn new(name: &str, order: &str, data: ArrayD<u16>) -> Result<Self, Error> {
        let order: AxisOrder = order.parse()?;
        if data.ndim() != order.len() {
            return Err(Error::DimensionalityMismatch(data.ndim(), order.len()));
        }
        if !(order.contains(Axis::Y) && order.contains(Axis::X)) {
            return Err(Error::Configuration(format!(
                "axis order {order} has no Y and X axes"
            )));
        }
        Ok(MemorySeries {
            name: name.to_string(),
            order,
            data,
            resolution: [1.0; 3],
        })
    }

    pub fn with_resolution(mut self, resolution: [f64; 3]) -> Self {
        self.resolution = resolution;
        self
    }

    fn size_of(&self, axis: Axis) -> usize {
        self.order
            .position(axis)
            .map(|i| self.data.shape()[i])
            .unwrap_or(1)
    }
}

/// An image file held in memory, for synthetic data and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    series: Vec<MemorySeries>,
}

impl MemorySource {
    pub fn new(series: Vec<MemorySeries>) -> Self {
        MemorySource { series }
    }

    fn get(&self, series: usize) -> Result<&MemorySeries, Error> {
        self.check_series(series)?;
        Ok(&self.series[series])
    }
}

impl ImageSource for MemorySource {
    fn series_count(&self) -> Result<usize, Error> {
        Ok(self.series.len())
    }

    fn axis_order(&self, series: usize) -> Result<AxisOrder, Error> {
        Ok(self.get(series)?.order.clone())
    }

    fn sizes(&self, series: usize) -> Result<Vec<usize>, Error> {
        Ok(self.get(series)?.data.shape().to_vec())
    }

    fn pixel_type(&self, series: usize) -> Result<PixelType, Error> {
        self.get(series)?;
        Ok(PixelType::U16)
    }

    fn read_plane(&self, series: usize, c: usize, z: usize, t: usize) -> Result<Frame, Error> {
        let s = self.get(series)?;
        let mut slice = Vec::with_capacity(s.order.len());
        for axis in s.order.axes() {
            let index = match axis {
                Axis::C => c,
                Axis::Z => z,
                Axis::T => t,
                Axis::Y | Axis::X => {
                    slice.push(SliceInfoElem::Slice {
                        start: 0,
                        end: None,
                        step: 1,
                    });
                    continue;
                }
            };
            if index >= s.size_of(*axis) {
                return Err(Error::Validation(format!(
                    "{axis} index {index} out of bounds for series {series}"
                )));
            }
            slice.push(SliceInfoElem::Index(index as isize));
        }
        for (axis, index) in [(Axis::C, c), (Axis::Z, z), (Axis::T, t)] {
            if !s.order.contains(axis) && index > 0 {
                return Err(Error::Validation(format!(
                    "{axis} index {index} out of bounds for series {series}"
                )));
            }
        }
        let plane = s.data.slice(slice.as_slice()).into_dimensionality::<Ix2>()?;
        let plane = if s.order.position(Axis::X) < s.order.position(Axis::Y) {
            plane.t().to_owned()
        } else {
            plane.to_owned()
        };
        Ok(Frame::U16(plane))
    }

    fn ome_xml(&self) -> Result<String, Error> {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <OME xmlns=\"http://www.openmicroscopy.org/Schemas/OME/2016-06\">\n",
        );
        for (i, s) in self.series.iter().enumerate() {
            let [px, py, pz] = s.resolution;
            write!(
                xml,
                "  <Image ID=\"Image:{i}\" Name=\"{}\">\n    \
                 <Pixels ID=\"Pixels:{i}\" DimensionOrder=\"{}\" Type=\"uint16\" \
                 SizeC=\"{}\" SizeT=\"{}\" SizeX=\"{}\" SizeY=\"{}\" SizeZ=\"{}\" \
                 PhysicalSizeX=\"{px}\" PhysicalSizeY=\"{py}\" PhysicalSizeZ=\"{pz}\"/>\n  \
                 </Image>\n",
                escape(s.name.as_str()),
                s.order.reversed(),
                s.size_of(Axis::C),
                s.size_of(Axis::T),
                s.size_of(Axis::X),
                s.size_of(Axis::Y),
                s.size_of(Axis::Z),
            )
            .map_err(|e| Error::Format(e.to_string()))?;
        }
        xml.push_str("</OME>\n");
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, array};

    fn source() -> MemorySource {
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4, 5]), |ix| {
            (ix[0] * 1000 + ix[1] * 100 + ix[2] * 10 + ix[3]) as u16
        });
        let permuted = data.clone().permuted_axes(vec![3, 1, 2, 0]);
        let pre = MemorySeries::new("Pre lesion & co/Pos001_S001", "TZYX", data);
        let ranged = MemorySeries::new("0h to 1h/Pos002_S001", "XZYT", permuted);
        MemorySource::new(vec![pre.unwrap(), ranged.unwrap()])
    }

    #[test]
    fn read_planes() -> Result<(), Error> {
        let source = source();
        let frame = source.read_plane(0, 0, 2, 1)?;
        assert_eq!(frame.shape(), &[4, 5]);
        let arr: ndarray::Array2<u16> = frame.try_into()?;
        assert_eq!(arr[[3, 4]], 1234);
        let arr: ndarray::Array2<u16> = source.read_plane(1, 0, 2, 1)?.try_into()?;
        assert_eq!(arr[[3, 4]], 1234);
        assert_eq!(arr.row(0), array![1200, 1201, 1202, 1203, 1204]);
        Ok(())
    }

    #[test]
    fn read_out_of_bounds() {
        let source = source();
        assert!(matches!(
            source.read_plane(0, 1, 0, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            source.read_plane(0, 0, 3, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            source.read_plane(2, 0, 0, 0),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn xml_escapes_names() {
        let xml = source().ome_xml().unwrap();
        assert!(xml.contains("Name=\"Pre lesion &amp; co/Pos001_S001\""));
        assert!(xml.contains("DimensionOrder=\"TYZX\""));
    }
}
