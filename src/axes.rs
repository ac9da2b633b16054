use crate::error::Error;
use itertools::Itertools;
use ndarray::{ArrayBase, IxDyn, RawData};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Enum for CZTYX axes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    C,
    Z,
    T,
    Y,
    X,
}

impl Axis {
    /// X, Y and Z, the axes that carry a physical resolution
    pub fn is_spatial(&self) -> bool {
        matches!(self, Axis::Z | Axis::Y | Axis::X)
    }

    pub fn tag(&self) -> char {
        match self {
            Axis::C => 'C',
            Axis::Z => 'Z',
            Axis::T => 'T',
            Axis::Y => 'Y',
            Axis::X => 'X',
        }
    }
}

impl TryFrom<char> for Axis {
    type Error = Error;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'C' => Ok(Axis::C),
            'Z' => Ok(Axis::Z),
            'T' => Ok(Axis::T),
            'Y' => Ok(Axis::Y),
            'X' => Ok(Axis::X),
            _ => Err(Error::InvalidAxis(value.to_string())),
        }
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::try_from(c),
            _ => Err(Error::InvalidAxis(s.to_string())),
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Order of the axes of an array, slowest varying first. No axis occurs twice.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisOrder(Vec<Axis>);

impl AxisOrder {
    pub fn new(axes: Vec<Axis>) -> Result<Self, Error> {
        if let Some(axis) = axes.iter().duplicates().next() {
            return Err(Error::Configuration(format!(
                "axis {} occurs more than once in {}",
                axis,
                axes.iter().join("")
            )));
        }
        Ok(AxisOrder(axes))
    }

    pub fn axes(&self) -> &[Axis] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.0.contains(&axis)
    }

    /// the index of an axis in this order
    pub fn position(&self, axis: Axis) -> Option<usize> {
        self.0.iter().position(|a| *a == axis)
    }

    /// the same axes, fastest varying first
    pub fn reversed(&self) -> Self {
        AxisOrder(self.0.iter().rev().copied().collect())
    }

    /// the X, Y and Z axes in the order they appear
    pub fn spatial(&self) -> impl Iterator<Item = Axis> + '_ {
        self.0.iter().copied().filter(Axis::is_spatial)
    }

    /// indices into self for each axis of desired, see [permutation]
    pub fn permutation(&self, desired: &AxisOrder) -> Result<Vec<usize>, Error> {
        permutation(self, desired)
    }
}

impl FromStr for AxisOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AxisOrder::new(s.chars().map(Axis::try_from).collect::<Result<_, _>>()?)
    }
}

impl TryFrom<String> for AxisOrder {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AxisOrder> for String {
    fn from(value: AxisOrder) -> Self {
        value.to_string()
    }
}

impl Display for AxisOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(""))
    }
}

/// For each axis in `desired`, its index in `actual`: `result[i] = actual.index(desired[i])`.
///
/// Both orders have to cover exactly the same axes.
pub fn permutation(actual: &AxisOrder, desired: &AxisOrder) -> Result<Vec<usize>, Error> {
    if actual.len() != desired.len() {
        return Err(Error::Configuration(format!(
            "axis orders {actual} and {desired} have different lengths"
        )));
    }
    desired
        .axes()
        .iter()
        .map(|axis| {
            actual.position(*axis).ok_or_else(|| {
                Error::Configuration(format!("axis {axis} of {desired} is not in {actual}"))
            })
        })
        .collect()
}

/// Reorder the axes of an array from `actual` order into `desired` order.
pub fn reorder<S>(
    array: ArrayBase<S, IxDyn>,
    actual: &AxisOrder,
    desired: &AxisOrder,
) -> Result<ArrayBase<S, IxDyn>, Error>
where
    S: RawData,
{
    if array.ndim() != actual.len() {
        return Err(Error::DimensionalityMismatch(array.ndim(), actual.len()));
    }
    let perm = permutation(actual, desired)?;
    Ok(array.permuted_axes(perm))
}

/// Which indices to keep along one of the C, Z or T axes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisSelector {
    #[default]
    All,
    Single(usize),
    Subset(Vec<usize>),
}

impl AxisSelector {
    /// the native indices selected on an axis of length `size`, in reading order
    pub fn indices(&self, size: usize) -> Result<Vec<usize>, Error> {
        let indices = match self {
            AxisSelector::All => return Ok((0..size).collect()),
            AxisSelector::Single(i) => vec![*i],
            AxisSelector::Subset(s) => s.iter().copied().unique().collect(),
        };
        if let Some(i) = indices.iter().find(|&&i| i >= size) {
            return Err(Error::Validation(format!(
                "index {i} out of bounds for axis of length {size}"
            )));
        }
        Ok(indices)
    }
}

impl From<usize> for AxisSelector {
    fn from(value: usize) -> Self {
        AxisSelector::Single(value)
    }
}

impl From<Vec<usize>> for AxisSelector {
    fn from(value: Vec<usize>) -> Self {
        AxisSelector::Subset(value)
    }
}

/// Selectors for the C, Z and T axes, Y and X are always read whole.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub c: AxisSelector,
    pub z: AxisSelector,
    pub t: AxisSelector,
}

impl Selection {
    /// all planes of a single channel
    pub fn channel(c: usize) -> Self {
        Selection {
            c: AxisSelector::Single(c),
            ..Default::default()
        }
    }

    pub fn get(&self, axis: Axis) -> Option<&AxisSelector> {
        match axis {
            Axis::C => Some(&self.c),
            Axis::Z => Some(&self.z),
            Axis::T => Some(&self.t),
            Axis::Y | Axis::X => None,
        }
    }
}

/// A plane to read: its native c, z, t indices and where it goes in the selected output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneIndex {
    pub c: usize,
    pub z: usize,
    pub t: usize,
    /// position along the selected C, Z and T axes
    pub offset: [usize; 3],
}

impl PlaneIndex {
    pub fn offset_of(&self, axis: Axis) -> Option<usize> {
        match axis {
            Axis::C => Some(self.offset[0]),
            Axis::Z => Some(self.offset[1]),
            Axis::T => Some(self.offset[2]),
            Axis::Y | Axis::X => None,
        }
    }
}

/// The planes to read and the shape after selection, for an array of `shape` in `order`.
///
/// Planes are nested like the C, Z and T axes in `order`, the first of them varying slowest.
/// Selected axes shrink to the number of selected indices. An axis missing from `order` is
/// treated as having length 1.
pub fn select_indices(
    shape: &[usize],
    order: &AxisOrder,
    selection: &Selection,
) -> Result<(Vec<PlaneIndex>, Vec<usize>), Error> {
    if shape.len() != order.len() {
        return Err(Error::DimensionalityMismatch(shape.len(), order.len()));
    }
    let mut new_shape = shape.to_vec();
    let mut nesting: Vec<(Axis, Vec<usize>)> = Vec::new();
    for axis in [Axis::C, Axis::Z, Axis::T] {
        if !order.contains(axis) {
            nesting.push((axis, vec![0]));
        }
    }
    for (i, axis) in order.axes().iter().enumerate() {
        if let Some(selector) = selection.get(*axis) {
            let indices = selector.indices(shape[i])?;
            new_shape[i] = indices.len();
            nesting.push((*axis, indices));
        }
    }

    let planes = nesting
        .iter()
        .map(|(_, indices)| indices.iter().copied().enumerate())
        .multi_cartesian_product()
        .map(|combination| {
            let mut plane = PlaneIndex {
                c: 0,
                z: 0,
                t: 0,
                offset: [0; 3],
            };
            for ((axis, _), (offset, index)) in nesting.iter().zip(combination) {
                match axis {
                    Axis::C => (plane.c, plane.offset[0]) = (index, offset),
                    Axis::Z => (plane.z, plane.offset[1]) = (index, offset),
                    Axis::T => (plane.t, plane.offset[2]) = (index, offset),
                    Axis::Y | Axis::X => {}
                }
            }
            plane
        })
        .collect();
    Ok((planes, new_shape))
}
