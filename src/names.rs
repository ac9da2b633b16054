use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of the embryo in a series name, `Pos013` is position 13.
pub type Position = u32;

/// Timepoint of images taken before the injury.
pub const PRE_INJURY: f64 = -1.0;

/// Default timepoint of mark and find reference images.
pub const MARK: f64 = -2.0;

/// Default interval between timepoints, in hours.
pub const DEFAULT_INTERVAL: f64 = 0.5;

/// Most timepoints a single series name may expand to.
pub const MAX_TIMEPOINTS: usize = 100_000;

lazy_static! {
    static ref PRE: Regex = Regex::new(r"^Pre.*/Pos(\d+)_").expect("valid pattern");
    static ref MARK_AND_FIND: Regex = Regex::new(r"^Mark.*/Pos(\d+)_").expect("valid pattern");
    static ref RANGE: Regex =
        Regex::new(r"^(\d+(?:\.\d*)?)h? to (\d+(?:\.\d*)?)h.*/Pos(\d+)_").expect("valid pattern");
}

/// How mark and find reference images are timestamped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MarkSentinel {
    Fixed(f64),
    Nan,
}

impl MarkSentinel {
    pub fn value(&self) -> f64 {
        match self {
            MarkSentinel::Fixed(v) => *v,
            MarkSentinel::Nan => f64::NAN,
        }
    }
}

impl Default for MarkSentinel {
    fn default() -> Self {
        MarkSentinel::Fixed(MARK)
    }
}

/// Parses series names like `22.5h to 41h pSCI/Pos013_S001` into a position and its timepoints.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameParser {
    interval: f64,
    mark: MarkSentinel,
}

impl Default for NameParser {
    fn default() -> Self {
        NameParser {
            interval: DEFAULT_INTERVAL,
            mark: MarkSentinel::default(),
        }
    }
}

impl NameParser {
    /// `interval`: hours between consecutive images of a ranged series
    pub fn new(interval: f64, mark: MarkSentinel) -> Result<Self, Error> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(Error::Configuration(format!(
                "time interval has to be positive, not {interval}"
            )));
        }
        Ok(NameParser { interval, mark })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// The position and the timepoints (in hours) of a series.
    pub fn parse(&self, name: &str) -> Result<(Position, Vec<f64>), Error> {
        if let Some(caps) = PRE.captures(name) {
            return Ok((position(name, &caps[1])?, vec![PRE_INJURY]));
        }
        if let Some(caps) = MARK_AND_FIND.captures(name) {
            return Ok((position(name, &caps[1])?, vec![self.mark.value()]));
        }
        if let Some(caps) = RANGE.captures(name) {
            let start = hours(name, &caps[1])?;
            let end = hours(name, &caps[2])?;
            let times = time_range(start, end, self.interval)?;
            if times.is_empty() {
                return Err(Error::Parse(format!("{name} (ends before it starts)")));
            }
            return Ok((position(name, &caps[3])?, times));
        }
        Err(Error::Parse(name.to_string()))
    }
}

fn position(name: &str, digits: &str) -> Result<Position, Error> {
    digits
        .parse()
        .map_err(|_| Error::Parse(format!("{name} (position {digits} out of range)")))
}

fn hours(name: &str, number: &str) -> Result<f64, Error> {
    number.parse().map_err(|_| Error::Parse(name.to_string()))
}

/// `start + k * interval` for k = 0, 1, ... up to and including `end` (with half an interval
/// tolerance), at most [MAX_TIMEPOINTS] values.
pub fn time_range(start: f64, end: f64, interval: f64) -> Result<Vec<f64>, Error> {
    let stop = end + interval / 2.0;
    let steps = (stop - start) / interval;
    if steps >= MAX_TIMEPOINTS as f64 {
        return Err(Error::Configuration(format!(
            "{start}h to {end}h every {interval}h gives more than {MAX_TIMEPOINTS} timepoints"
        )));
    }
    Ok((0..)
        .map(|k| start + k as f64 * interval)
        .take_while(|t| *t <= stop)
        .collect())
}

/// [NameParser::parse] with the default mark sentinel.
pub fn parse_series_name(name: &str, interval: f64) -> Result<(Position, Vec<f64>), Error> {
    let parser = NameParser::new(interval, MarkSentinel::default())?;
    parser.parse(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(from: f64, to: f64, step: f64) -> Vec<f64> {
        let n = ((to - from) / step).round() as usize;
        (0..=n).map(|k| from + k as f64 * step).collect()
    }

    #[test]
    fn pre_injury() {
        let (pos, times) = parse_series_name("Pre lesion 2x/Pos008_S001", 0.5).unwrap();
        assert_eq!(pos, 8);
        assert_eq!(times, vec![-1.0]);
    }

    #[test]
    fn mark_and_find() {
        let parser = NameParser::default();
        assert_eq!(
            parser.parse("Mark_and_Find_001/Pos019_S001").unwrap(),
            (19, vec![-2.0])
        );
        let parser = NameParser::new(0.5, MarkSentinel::Nan).unwrap();
        let (pos, times) = parser.parse("Mark_and_Find_001/Pos019_S001").unwrap();
        assert_eq!(pos, 19);
        assert!(times[0].is_nan());
    }

    #[test]
    fn ranges() -> Result<(), Error> {
        let (pos, times) = parse_series_name("22.5h to 41h pSCI/Pos013_S001", 0.5)?;
        assert_eq!(pos, 13);
        assert_eq!(times.len(), 38);
        assert_eq!(times, hours(22.5, 41.0, 0.5));

        let (pos, times) = parse_series_name("63 to 72.5hpSCI/Pos004_S001", 1.0)?;
        assert_eq!(pos, 4);
        assert_eq!(times, hours(63.0, 73.0, 1.0));
        Ok(())
    }

    #[test]
    fn position_after_last_directory() {
        let (pos, _) = parse_series_name("0h to 1h/Pos1/Pos002_S003", 0.5).unwrap();
        assert_eq!(pos, 2);
    }

    #[test]
    fn unparsable() {
        for name in [
            "Totally wrong string",
            "Pre lesion Pos008_S001",
            "41h to 22.5h pSCI/Pos013_S001",
        ] {
            assert!(
                matches!(parse_series_name(name, 0.5), Err(Error::Parse(_))),
                "{name}"
            );
        }
        let error = parse_series_name("Totally wrong string", 0.5).unwrap_err();
        assert_eq!(
            error.to_string(),
            "could not parse name string: Totally wrong string"
        );
    }

    #[test]
    fn too_many_timepoints() {
        let parser = NameParser::new(1e-9, MarkSentinel::default()).unwrap();
        assert!(matches!(
            parser.parse("0h to 1000h/Pos001_S001"),
            Err(Error::Configuration(_))
        ));
        assert!(time_range(0.0, 1.0, 1e-5).is_err());
        assert_eq!(time_range(0.0, 1.0, 1e-4).unwrap().len(), 10_001);
    }

    #[test]
    fn bad_interval() {
        for interval in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                NameParser::new(interval, MarkSentinel::default()),
                Err(Error::Configuration(_))
            ));
        }
    }
}
