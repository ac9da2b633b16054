use crate::axes::AxisOrder;
use crate::error::Error;
use crate::reader::ImageSource;
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default axis order of [SeriesMetadata::shape].
pub const METADATA_ORDER: &str = "TZYXC";

/// Name, shape and physical voxel size of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub name: String,
    /// one size per axis of the order the metadata was parsed with
    pub shape: Vec<usize>,
    /// one size per spatial axis, in the order these axes appear
    pub resolution: Vec<f64>,
}

struct PendingImage {
    name: String,
    pixels: Option<(Vec<usize>, Vec<f64>)>,
}

impl PendingImage {
    fn finish(self) -> Result<SeriesMetadata, Error> {
        let (shape, resolution) = self.pixels.ok_or_else(|| {
            Error::Format(format!("image {} has no Pixels element", self.name))
        })?;
        Ok(SeriesMetadata {
            name: self.name,
            shape,
            resolution,
        })
    }
}

fn attributes(element: &BytesStart) -> Result<IndexMap<String, String>, Error> {
    let mut map = IndexMap::new();
    for attr in element.attributes() {
        let attr = attr?;
        let name = attr.key.local_name();
        let key = String::from_utf8_lossy(name.as_ref()).into_owned();
        map.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(map)
}

fn required<T: FromStr>(attrs: &IndexMap<String, String>, key: &str) -> Result<T, Error> {
    let value = attrs
        .get(key)
        .ok_or_else(|| Error::Format(format!("missing attribute {key}")))?;
    value
        .trim()
        .parse()
        .map_err(|_| Error::Format(format!("cannot parse {key}=\"{value}\"")))
}

fn pixels(element: &BytesStart, order: &AxisOrder) -> Result<(Vec<usize>, Vec<f64>), Error> {
    let attrs = attributes(element)?;
    let shape = order
        .axes()
        .iter()
        .map(|axis| required(&attrs, &format!("Size{axis}")))
        .collect::<Result<Vec<usize>, _>>()?;
    let resolution = order
        .spatial()
        .map(|axis| required(&attrs, &format!("PhysicalSize{axis}")))
        .collect::<Result<Vec<f64>, _>>()?;
    Ok((shape, resolution))
}

/// Parse the name, shape (in `order`) and resolution of every series in an OME-XML document.
///
/// Every direct child of the root whose tag ends with `Image` is one series, in document order.
/// Its first descendant with a tag ending in `Pixels` carries the sizes.
pub fn parse_metadata(xml: &str, order: &AxisOrder) -> Result<Vec<SeriesMetadata>, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut depth = 0usize;
    let mut current: Option<PendingImage> = None;
    let mut series = Vec::new();
    loop {
        let (element, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    if let Some(image) = current.take() {
                        series.push(image.finish()?);
                    }
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let local = element.local_name();
        if depth == 1 && local.as_ref().ends_with(b"Image") {
            let attrs = attributes(&element)?;
            let name = attrs
                .get("Name")
                .ok_or_else(|| Error::Format("image without Name attribute".to_string()))?;
            let image = PendingImage {
                name: name.clone(),
                pixels: None,
            };
            if is_empty {
                series.push(image.finish()?);
            } else {
                current = Some(image);
            }
        } else if depth >= 2 && local.as_ref().ends_with(b"Pixels") {
            if let Some(image) = current.as_mut() {
                if image.pixels.is_none() {
                    image.pixels = Some(pixels(&element, order)?);
                }
            }
        }
        if !is_empty {
            depth += 1;
        }
    }
    if let Some(image) = current {
        return Err(Error::Format(format!("unterminated image {}", image.name)));
    }
    Ok(series)
}

/// [parse_metadata] on the OME-XML of a source.
pub fn metadata<S>(source: &S, order: &AxisOrder) -> Result<Vec<SeriesMetadata>, Error>
where
    S: ImageSource + ?Sized,
{
    parse_metadata(&source.ome_xml()?, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySeries, MemorySource};
    use ndarray::{ArrayD, IxDyn};

    const KIDNEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
  <Instrument ID="Instrument:0"><Objective ID="Objective:0:0"/></Instrument>
  <Image ID="Image:0" Name="Series016">
    <AcquisitionDate>2013-03-26T16:04:12</AcquisitionDate>
    <Pixels DimensionOrder="XYCZT" ID="Pixels:0" PhysicalSizeX="1.5137" PhysicalSizeY="1.5137"
            PhysicalSizeZ="0.9999" SizeC="4" SizeT="1" SizeX="512" SizeY="512" SizeZ="25"
            Type="uint8">
      <Channel ID="Channel:0:0" SamplesPerPixel="1"/>
    </Pixels>
  </Image>
  <Image ID="Image:1" Name="Series019">
    <Pixels DimensionOrder="XYCZT" ID="Pixels:1" PhysicalSizeX="0.2539" PhysicalSizeY="0.2539"
            PhysicalSizeZ="0.1395" SizeC="4" SizeT="1" SizeX="512" SizeY="512" SizeZ="46"
            Type="uint8"/>
  </Image>
</OME>"#;

    fn order(s: &str) -> AxisOrder {
        s.parse().unwrap()
    }

    #[test]
    fn parse_kidney() -> Result<(), Error> {
        let series = parse_metadata(KIDNEY, &order(METADATA_ORDER))?;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "Series016");
        assert_eq!(series[1].name, "Series019");
        assert_eq!(series[0].shape, vec![1, 25, 512, 512, 4]);
        assert_eq!(series[1].shape, vec![1, 46, 512, 512, 4]);
        assert_eq!(series[0].resolution, vec![0.9999, 1.5137, 1.5137]);
        assert_eq!(series[1].resolution, vec![0.1395, 0.2539, 0.2539]);
        Ok(())
    }

    #[test]
    fn other_order() -> Result<(), Error> {
        let series = parse_metadata(KIDNEY, &order("XCZ"))?;
        assert_eq!(series[0].shape, vec![512, 4, 25]);
        assert_eq!(series[0].resolution, vec![1.5137, 0.9999]);
        Ok(())
    }

    #[test]
    fn prefixed_tags() -> Result<(), Error> {
        let xml = r#"<ome:OME xmlns:ome="ns"><ome:Image Name="a &amp; b"><ome:Pixels SizeT="2"
            SizeZ="1" SizeY="4" SizeX="3" SizeC="1" PhysicalSizeX="1" PhysicalSizeY="1"
            PhysicalSizeZ="2"/></ome:Image></ome:OME>"#;
        let series = parse_metadata(xml, &order(METADATA_ORDER))?;
        assert_eq!(series[0].name, "a & b");
        assert_eq!(series[0].shape, vec![2, 1, 4, 3, 1]);
        Ok(())
    }

    #[test]
    fn missing_pieces() {
        let no_name = r#"<OME><Image><Pixels SizeT="1"/></Image></OME>"#;
        assert!(matches!(
            parse_metadata(no_name, &order("T")),
            Err(Error::Format(_))
        ));
        let no_pixels = r#"<OME><Image Name="x"><Channel/></Image></OME>"#;
        assert!(matches!(
            parse_metadata(no_pixels, &order("T")),
            Err(Error::Format(_))
        ));
        let no_size = r#"<OME><Image Name="x"><Pixels SizeT="1"/></Image></OME>"#;
        assert!(matches!(
            parse_metadata(no_size, &order("TZ")),
            Err(Error::Format(_))
        ));
        let bad_size = r#"<OME><Image Name="x"><Pixels SizeT="many"/></Image></OME>"#;
        assert!(matches!(
            parse_metadata(bad_size, &order("T")),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn malformed() {
        let xml = r#"<OME><Image Name="x"><Pixels SizeT="1"></Image></OME>"#;
        assert!(parse_metadata(xml, &order("T")).is_err());
    }

    #[test]
    fn from_memory_source() -> Result<(), Error> {
        let data = ArrayD::<u16>::zeros(IxDyn(&[3, 2, 1, 8, 6]));
        let pre = MemorySeries::new("Pre/Pos001_S001", "TZCYX", data)?;
        let source = MemorySource::new(vec![pre.with_resolution([0.5, 0.5, 2.0])]);
        let series = metadata(&source, &order(METADATA_ORDER))?;
        assert_eq!(series[0].shape, vec![3, 2, 8, 6, 1]);
        assert_eq!(series[0].resolution, vec![2.0, 0.5, 0.5]);

        let unsized_source: &dyn ImageSource = &source;
        let series = metadata(unsized_source, &order(METADATA_ORDER))?;
        assert_eq!(series[0].name, "Pre/Pos001_S001");
        Ok(())
    }
}
