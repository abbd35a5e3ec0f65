//! Ragged array-of-arrays codec.
//!
//! A list of arrays sharing a dtype and all non-leading dimensions is stored
//! as one concatenated buffer plus an inclusive cumulative-length index:
//! `index[i] = len(a[0]) + .. + len(a[i])`.

use crate::error::{Error, Result};
use crate::value::NdArray;

/// Flatten `parts` into `(index, data)`.
pub fn dump(parts: &[NdArray]) -> Result<(Vec<i64>, NdArray)> {
    let first = parts
        .first()
        .ok_or_else(|| Error::ShapeMismatch("a multiarray needs at least one element".into()))?;
    if first.ndim() == 0 {
        return Err(Error::ShapeMismatch("multiarray elements must have a leading axis".into()));
    }
    let dtype = first.dtype();
    let tail = &first.shape()[1..];
    for (i, part) in parts.iter().enumerate() {
        if part.dtype() != dtype {
            return Err(Error::ShapeMismatch(format!(
                "element {i} has dtype {}, expected {dtype}",
                part.dtype()
            )));
        }
        if part.ndim() == 0 || &part.shape()[1..] != tail {
            return Err(Error::ShapeMismatch(format!(
                "element {i} has shape {:?}, trailing dimensions must be {tail:?}",
                part.shape()
            )));
        }
    }

    let mut index = Vec::with_capacity(parts.len());
    let mut total = 0i64;
    for part in parts {
        total += part.len() as i64;
        index.push(total);
    }
    Ok((index, NdArray::concatenate(parts)?))
}

/// Split `data` back at the boundaries recorded in `index`.  The last element
/// always runs to the end of the buffer.
pub fn load(index: &[i64], data: &NdArray) -> Result<Vec<NdArray>> {
    let rows = data.len();
    let mut out = Vec::with_capacity(index.len());
    let mut start = 0usize;
    for (i, &bound) in index.iter().enumerate() {
        let end = if i + 1 == index.len() { rows } else { usize::try_from(bound).unwrap_or(usize::MAX) };
        if end < start || end > rows {
            return Err(Error::corrupt(format!("multiarray index {bound} out of order or beyond {rows} rows")));
        }
        out.push(data.slice_axis0(start..end));
        start = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_inclusive_cumulative() {
        let parts = vec![
            NdArray::from_vec(vec![1i32, 2]),
            NdArray::from_vec(vec![3i32]),
            NdArray::from_vec(vec![4i32, 5, 6]),
        ];
        let (index, data) = dump(&parts).unwrap();
        assert_eq!(index, vec![2, 3, 6]);
        assert_eq!(data.size(), 6);
        assert_eq!(load(&index, &data).unwrap(), parts);
    }

    #[test]
    fn trailing_dimensions_must_agree() {
        let a = NdArray::from_shape_vec(&[1, 2], vec![1.0f64, 2.0]).unwrap();
        let b = NdArray::from_shape_vec(&[1, 3], vec![1.0f64, 2.0, 3.0]).unwrap();
        assert!(matches!(dump(&[a, b]), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn mixed_dtypes_are_rejected() {
        let parts = [NdArray::from_vec(vec![1i32]), NdArray::from_vec(vec![1.0f64])];
        assert!(matches!(dump(&parts), Err(Error::ShapeMismatch(_))));
    }
}
