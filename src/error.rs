use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[cfg(feature = "bioformats")]
    #[error(transparent)]
    J4rs(#[from] j4rs::errors::J4RsError),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("could not parse name string: {0}")]
    Parse(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("the image reading session has been shut down and cannot be restarted")]
    SessionUnavailable,
    #[error("invalid axis: {0}")]
    InvalidAxis(String),
    #[error("dimensionality mismatch: {0} != {1}")]
    DimensionalityMismatch(usize, usize),
    #[error("cannot cast {0} to {1}")]
    Cast(String, String),
    #[error("unknown pixel type {0}")]
    UnknownPixelType(String),
    #[error("empty trace")]
    EmptyTrace,
    #[error("minimum and maximum of the trace coincide at index {0}, slope is undefined")]
    DegenerateTrace(usize),
    #[error("trace of length {0} is shorter than two margins of {1}")]
    MarginTooWide(usize, usize),
}
