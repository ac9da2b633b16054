use crate::axes::{Axis, AxisOrder};
use crate::error::Error;
use crate::reader::{Frame, ImageSource, PixelType, bytes_to_frame};
use crate::session::Session;
use j4rs::{
    Instance, InvocationArg, Jvm, JvmBuilder, MavenArtifact, MavenArtifactRepo, MavenSettings,
};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

const OME_RELEASES: &str =
    "openmicroscopy::https://artifacts.openmicroscopy.org/artifactory/ome.releases";
const BIOFORMATS_PACKAGE: &str = "ome:bioformats_package:8.3.0";
const FORMATS_GPL: &str = "ome:formats-gpl:8.3.0";

macro_rules! method_return {
    ($R:ty$(|c)?) => { Result<$R, Error> };
    () => { Result<(), Error> };
}

macro_rules! method_arg {
    ($n:tt: $t:ty|p) => {
        InvocationArg::try_from($n)?.into_primitive()?
    };
    ($n:tt: $t:ty) => {
        InvocationArg::try_from($n)?
    };
}

macro_rules! method {
    ($name:ident, $method:expr $(,[$($n:tt: $t:ty$(|$p:tt)?),*])? $(=> $tt:ty$(|$c:tt)?)?) => {
        pub(crate) fn $name(&self, $($($n: $t),*)?) -> method_return!($($tt)?) {
            let args: Vec<InvocationArg> = vec![$($( method_arg!($n:$t$(|$p)?) ),*)?];
            let _jvm = &self.jvm;
            let _result = _jvm.invoke(&self.instance, $method, &args)?;

            macro_rules! method_result {
                ($R:ty|c) => {
                    Ok(_jvm.to_rust(_result)?)
                };
                ($R:ty) => {
                    Ok(_result)
                };
                () => {
                    Ok(())
                };
            }

            method_result!($($tt$(|$c)?)?)
        }
    };
}

pub(crate) struct ImageReader {
    jvm: Rc<Jvm>,
    instance: Instance,
}

impl Drop for ImageReader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("could not close image reader: {e}");
        }
    }
}

impl ImageReader {
    pub(crate) fn new(jvm: Rc<Jvm>) -> Result<Self, Error> {
        let instance = jvm.create_instance("loci.formats.ImageReader", InvocationArg::empty())?;
        Ok(ImageReader { jvm, instance })
    }

    pub(crate) fn set_metadata_store(&self, store: Instance) -> Result<(), Error> {
        self.jvm.invoke(
            &self.instance,
            "setMetadataStore",
            &[InvocationArg::from(store)],
        )?;
        Ok(())
    }

    /// bytes of a plane, as stored in the file
    pub(crate) fn open_bytes(&self, index: i32) -> Result<Vec<u8>, Error> {
        Ok(self
            .open_bi8(index)?
            .into_iter()
            .map(|b| b as u8)
            .collect())
    }

    pub(crate) fn ome_xml(&self) -> Result<String, Error> {
        let mds = self.get_metadata_store()?;
        Ok(self
            .jvm
            .chain(&mds)?
            .cast("loci.formats.ome.OMEPyramidStore")?
            .invoke("dumpXML", &[])?
            .to_rust()?)
    }

    method!(get_metadata_store, "getMetadataStore" => Instance);
    method!(set_id, "setId", [id: &str]);
    method!(set_series, "setSeries", [series: i32|p]);
    method!(get_series_count, "getSeriesCount" => i32|c);
    method!(open_bi8, "openBytes", [index: i32|p] => Vec<i8>|c);
    method!(get_size_x, "getSizeX" => i32|c);
    method!(get_size_y, "getSizeY" => i32|c);
    method!(get_size_c, "getSizeC" => i32|c);
    method!(get_size_t, "getSizeT" => i32|c);
    method!(get_size_z, "getSizeZ" => i32|c);
    method!(get_dimension_order, "getDimensionOrder" => String|c);
    method!(get_pixel_type, "getPixelType" => i32|c);
    method!(is_little_endian, "isLittleEndian" => bool|c);
    method!(is_interleaved, "isInterleaved" => bool|c);
    method!(get_index, "getIndex", [z: i32|p, c: i32|p, t: i32|p] => i32|c);
    method!(get_rgb_channel_count, "getRGBChannelCount" => i32|c);
    method!(close, "close");
}

pub(crate) struct MetadataTools {
    jvm: Rc<Jvm>,
    instance: Instance,
}

impl MetadataTools {
    pub(crate) fn new(jvm: Rc<Jvm>) -> Result<Self, Error> {
        let instance = jvm.create_instance("loci.formats.MetadataTools", InvocationArg::empty())?;
        Ok(MetadataTools { jvm, instance })
    }

    method!(create_ome_xml_metadata, "createOMEXMLMetadata" => Instance);
}

/// Pick one channel out of the bytes of an RGB plane holding `count` channels, either
/// interleaved (rgbrgb...) or planar (rr..gg..bb..).
fn rgb_channel(
    bytes: &[u8],
    pixel_bytes: usize,
    channel: usize,
    count: usize,
    interleaved: bool,
) -> Vec<u8> {
    if interleaved {
        bytes
            .chunks(pixel_bytes)
            .skip(channel)
            .step_by(count)
            .flatten()
            .copied()
            .collect()
    } else {
        let plane = bytes.len() / count;
        bytes[channel * plane..(channel + 1) * plane].to_vec()
    }
}

/// A microscope file read by bioformats, any format it supports.
pub struct BioFormatsSource<'s> {
    session: &'s Session,
    reader: ImageReader,
    current: Cell<Option<usize>>,
}

impl<'s> BioFormatsSource<'s> {
    pub fn open<P: AsRef<Path>>(session: &'s Session, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let id = path
            .to_str()
            .ok_or_else(|| Error::Configuration(format!("invalid file name: {}", path.display())))?
            .to_string();
        let jvm = session.jvm()?;
        let reader = ImageReader::new(jvm.clone())?;
        reader.set_metadata_store(MetadataTools::new(jvm)?.create_ome_xml_metadata()?)?;
        reader.set_id(&id)?;
        info!(path = %path.display(), "opened image file");
        Ok(BioFormatsSource {
            session,
            reader,
            current: Cell::new(None),
        })
    }

    fn select(&self, series: usize) -> Result<&ImageReader, Error> {
        self.check_series(series)?;
        if self.current.get() != Some(series) {
            self.reader.set_series(series as i32)?;
            self.current.set(Some(series));
            debug!(series, "selected series");
        }
        Ok(&self.reader)
    }
}

impl ImageSource for BioFormatsSource<'_> {
    fn series_count(&self) -> Result<usize, Error> {
        self.session.start()?;
        Ok(self.reader.get_series_count()? as usize)
    }

    /// bioformats lists the fastest varying axis first, like XYCZT
    fn axis_order(&self, series: usize) -> Result<AxisOrder, Error> {
        self.select(series)?.get_dimension_order()?.parse()
    }

    fn sizes(&self, series: usize) -> Result<Vec<usize>, Error> {
        let order = self.axis_order(series)?;
        let reader = self.select(series)?;
        order
            .axes()
            .iter()
            .map(|axis| -> Result<usize, Error> {
                let size = match axis {
                    Axis::C => reader.get_size_c()?,
                    Axis::Z => reader.get_size_z()?,
                    Axis::T => reader.get_size_t()?,
                    Axis::Y => reader.get_size_y()?,
                    Axis::X => reader.get_size_x()?,
                };
                Ok(size as usize)
            })
            .collect()
    }

    fn pixel_type(&self, series: usize) -> Result<PixelType, Error> {
        PixelType::try_from(self.select(series)?.get_pixel_type()?)
    }

    fn read_plane(&self, series: usize, c: usize, z: usize, t: usize) -> Result<Frame, Error> {
        let reader = self.select(series)?;
        let (size_c, size_z, size_t) = (
            reader.get_size_c()? as usize,
            reader.get_size_z()? as usize,
            reader.get_size_t()? as usize,
        );
        if c >= size_c || z >= size_z || t >= size_t {
            return Err(Error::Validation(format!(
                "plane (c: {c}, z: {z}, t: {t}) out of bounds for series {series} of size \
                 (c: {size_c}, z: {size_z}, t: {size_t})"
            )));
        }
        let pixel_type = PixelType::try_from(reader.get_pixel_type()?)?;
        let rgb = reader.get_rgb_channel_count()?.max(1) as usize;
        let index = reader.get_index(z as i32, (c / rgb) as i32, t as i32)?;
        let mut bytes = reader.open_bytes(index)?;
        if rgb > 1 {
            bytes = rgb_channel(
                &bytes,
                pixel_type.bytes(),
                c % rgb,
                rgb,
                reader.is_interleaved()?,
            );
        }
        bytes_to_frame(
            &bytes,
            pixel_type,
            reader.is_little_endian()?,
            reader.get_size_y()? as usize,
            reader.get_size_x()? as usize,
        )
    }

    fn ome_xml(&self) -> Result<String, Error> {
        self.session.start()?;
        self.reader.ome_xml()
    }
}

/// Download the bioformats jar (and optionally the GPL licensed readers) into the jassets folder.
pub fn download_bioformats(gpl_formats: bool) -> Result<(), Error> {
    let jvm = JvmBuilder::new()
        .skip_setting_native_lib()
        .with_maven_settings(MavenSettings::new(vec![MavenArtifactRepo::from(
            OME_RELEASES,
        )]))
        .build()?;
    jvm.deploy_artifact(&MavenArtifact::from(BIOFORMATS_PACKAGE))?;
    info!("deployed {BIOFORMATS_PACKAGE}");
    if gpl_formats {
        jvm.deploy_artifact(&MavenArtifact::from(FORMATS_GPL))?;
        info!("deployed {FORMATS_GPL}");
    }
    Ok(())
}
