use crate::axes::AxisOrder;
use crate::error::Error;
use crate::reader::{Frame, ImageSource, PixelType};
use lazy_static::lazy_static;
use regex::Regex;
use std::cell::RefCell;
use tracing::{debug, info};

#[cfg(feature = "bioformats")]
use j4rs::{InvocationArg, JavaOpt, Jvm, JvmBuilder};
#[cfg(feature = "bioformats")]
use std::rc::Rc;

lazy_static! {
    static ref HEAP_SIZE: Regex =
        Regex::new(r"^[1-9][0-9]*[kKmMgG]?$").expect("heap size pattern is valid");
}

pub const DEFAULT_MAX_HEAP_SIZE: &str = "8G";

#[cfg(feature = "bioformats")]
type Runtime = Rc<Jvm>;

#[cfg(not(feature = "bioformats"))]
type Runtime = ();

enum State {
    Idle,
    Running(Runtime),
    ShutDown,
}

/// Handle on the image reading backend (the JVM running bioformats).
///
/// The backend starts on first use. Once shut down it can never be started again, and every
/// request made through the session fails with [Error::SessionUnavailable].
pub struct Session {
    max_heap_size: String,
    state: RefCell<State>,
}

impl Session {
    /// `max_heap_size` as understood by java -Xmx: '256M', '64k', '2G'. Expect to need a lot.
    pub fn new(max_heap_size: &str) -> Result<Self, Error> {
        if !HEAP_SIZE.is_match(max_heap_size) {
            return Err(Error::Configuration(format!(
                "invalid maximum heap size: {max_heap_size}"
            )));
        }
        Ok(Session {
            max_heap_size: max_heap_size.to_string(),
            state: RefCell::new(State::Idle),
        })
    }

    pub fn max_heap_size(&self) -> &str {
        &self.max_heap_size
    }

    /// Start the backend if it is not running yet.
    pub fn start(&self) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        match *state {
            State::Running(_) => Ok(()),
            State::ShutDown => Err(Error::SessionUnavailable),
            State::Idle => {
                *state = State::Running(boot(&self.max_heap_size)?);
                info!(max_heap_size = %self.max_heap_size, "image reading session started");
                Ok(())
            }
        }
    }

    /// Stop the backend for good.
    pub fn shutdown(&self) {
        let previous = self.state.replace(State::ShutDown);
        if let State::Running(_) = previous {
            info!("image reading session shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.borrow(), State::Running(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(*self.state.borrow(), State::ShutDown)
    }

    #[cfg(feature = "bioformats")]
    pub(crate) fn jvm(&self) -> Result<Rc<Jvm>, Error> {
        self.start()?;
        match &*self.state.borrow() {
            State::Running(jvm) => Ok(jvm.clone()),
            _ => Err(Error::SessionUnavailable),
        }
    }

    /// Route every request to `source` through this session.
    pub fn attach<S: ImageSource>(&self, source: S) -> Attached<'_, S> {
        Attached {
            session: self,
            source,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session {
            max_heap_size: DEFAULT_MAX_HEAP_SIZE.to_string(),
            state: RefCell::new(State::Idle),
        }
    }
}

#[cfg(feature = "bioformats")]
fn boot(max_heap_size: &str) -> Result<Runtime, Error> {
    let jvm = JvmBuilder::new()
        .java_opt(JavaOpt::new(&format!("-Xmx{max_heap_size}")))
        .build()?;
    jvm.invoke_static(
        "loci.common.DebugTools",
        "setRootLevel",
        &[InvocationArg::try_from("ERROR")?],
    )?;
    Ok(Rc::new(jvm))
}

#[cfg(not(feature = "bioformats"))]
fn boot(max_heap_size: &str) -> Result<Runtime, Error> {
    debug!(max_heap_size, "no jvm backend compiled in");
    Ok(())
}

/// An image source that is only available while its session runs.
pub struct Attached<'s, S> {
    session: &'s Session,
    source: S,
}

impl<S: ImageSource> ImageSource for Attached<'_, S> {
    fn series_count(&self) -> Result<usize, Error> {
        self.session.start()?;
        self.source.series_count()
    }

    fn axis_order(&self, series: usize) -> Result<AxisOrder, Error> {
        self.session.start()?;
        self.source.axis_order(series)
    }

    fn sizes(&self, series: usize) -> Result<Vec<usize>, Error> {
        self.session.start()?;
        self.source.sizes(series)
    }

    fn pixel_type(&self, series: usize) -> Result<PixelType, Error> {
        self.session.start()?;
        self.source.pixel_type(series)
    }

    fn read_plane(&self, series: usize, c: usize, z: usize, t: usize) -> Result<Frame, Error> {
        self.session.start()?;
        debug!(series, c, z, t, "read plane");
        self.source.read_plane(series, c, z, t)
    }

    fn ome_xml(&self) -> Result<String, Error> {
        self.session.start()?;
        self.source.ome_xml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_sizes() {
        for size in ["256M", "64k", "2G", "1024"] {
            assert!(Session::new(size).is_ok(), "{size}");
        }
        for size in ["", "2GB", "-1G", "0G", "eight"] {
            assert!(
                matches!(Session::new(size), Err(Error::Configuration(_))),
                "{size}"
            );
        }
        assert_eq!(Session::default().max_heap_size(), "8G");
    }

    #[test]
    fn shutdown_is_final() {
        let session = Session::default();
        assert!(!session.is_running());
        session.shutdown();
        assert!(session.is_shut_down());
        assert!(matches!(session.start(), Err(Error::SessionUnavailable)));
        assert!(session.is_shut_down());
    }

    #[cfg(not(feature = "bioformats"))]
    #[test]
    fn lazy_start_and_shutdown() {
        use crate::memory::{MemorySeries, MemorySource};
        use ndarray::{ArrayD, IxDyn};

        let data = ArrayD::<u16>::zeros(IxDyn(&[1, 1, 1, 4, 4]));
        let source = MemorySource::new(vec![
            MemorySeries::new("Pre/Pos001_S001", "TZCYX", data).unwrap(),
        ]);
        let session = Session::default();
        let attached = session.attach(&source);
        assert!(!session.is_running());
        assert_eq!(attached.series_count().unwrap(), 1);
        assert!(session.is_running());
        session.start().unwrap();
        assert!(attached.read_plane(0, 0, 0, 0).is_ok());

        session.shutdown();
        assert!(matches!(
            attached.read_plane(0, 0, 0, 0),
            Err(Error::SessionUnavailable)
        ));
        assert!(matches!(attached.ome_xml(), Err(Error::SessionUnavailable)));
        assert!(matches!(
            attached.series_count(),
            Err(Error::SessionUnavailable)
        ));
    }
}
