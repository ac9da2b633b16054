use crate::error::Error;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, IxDyn};
use num::{ToPrimitive, Zero};
use std::ops::Add;

/// Intensity profile along X.
pub type Trace = Array1<f64>;

/// Sum an image along Y, one value per column.
pub fn trace_profile<A, S>(image: &ArrayBase<S, Ix2>) -> Trace
where
    A: Clone + Zero + Add<Output = A> + ToPrimitive,
    S: Data<Elem = A>,
{
    image
        .sum_axis(Axis(0))
        .mapv(|x| x.to_f64().unwrap_or(f64::NAN))
}

/// Sum out the z axis of a (T, Z, Y, X) or (Z, Y, X) stack, one image per timepoint.
pub fn project_z<A, S>(stack: &ArrayBase<S, IxDyn>) -> Result<Vec<Array2<A>>, Error>
where
    A: Clone + Zero + Add<Output = A>,
    S: Data<Elem = A>,
{
    match stack.ndim() {
        4 => stack
            .sum_axis(Axis(1))
            .outer_iter()
            .map(|image| Ok(image.to_owned().into_dimensionality::<Ix2>()?))
            .collect(),
        3 => Ok(vec![stack.sum_axis(Axis(0)).into_dimensionality::<Ix2>()?]),
        n => Err(Error::DimensionalityMismatch(n, 4)),
    }
}

/// [trace_profile] of every image.
pub fn traces<A, S>(images: &[ArrayBase<S, Ix2>]) -> Vec<Trace>
where
    A: Clone + Zero + Add<Output = A> + ToPrimitive,
    S: Data<Elem = A>,
{
    images.iter().map(trace_profile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, array};

    #[test]
    fn profile_sums_rows() {
        let image = array![[1u16, 2, 3], [4, 5, 6]];
        assert_eq!(trace_profile(&image), array![5.0, 7.0, 9.0]);
    }

    #[test]
    fn projection_does_not_overflow() {
        let stack = ArrayD::from_elem(IxDyn(&[2, 3, 2, 2]), 40000i64);
        let images = project_z(&stack).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1], Array2::from_elem((2, 2), 120000i64));
        assert_eq!(traces(&images)[0], array![240000.0, 240000.0]);
    }

    #[test]
    fn single_timepoint() {
        let stack = ArrayD::from_shape_fn(IxDyn(&[2, 2, 3]), |ix| (ix[0] + ix[2]) as f64);
        let images = project_z(&stack).unwrap();
        assert_eq!(images, vec![array![[1.0, 3.0, 5.0], [1.0, 3.0, 5.0]]]);
    }

    #[test]
    fn wrong_rank() {
        let stack = ArrayD::<f64>::zeros(IxDyn(&[2, 2]));
        assert!(matches!(
            project_z(&stack),
            Err(Error::DimensionalityMismatch(2, 4))
        ));
    }
}
