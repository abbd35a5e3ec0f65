//! Structural comparison of two values.

use std::collections::BTreeSet;

use crate::value::{NdArray, SparseFormat, Value};

/// Finer-grained class than [`Value::kind`]: sparse formats, frame kinds and
/// scalar dtypes are distinct types for comparison purposes.
fn type_name(v: &Value) -> String {
    match v {
        Value::Scalar(s) => format!("np_{}", s.dtype()),
        Value::Sparse(m) => match m.format() {
            SparseFormat::Csc => "csc_matrix".into(),
            SparseFormat::Csr => "csr_matrix".into(),
        },
        Value::Frame(f) => format!("{:?}", f.kind()),
        other => other.kind().into(),
    }
}

fn arrays_equal(a: &NdArray, b: &NdArray) -> bool {
    if a.dtype() == b.dtype() {
        a == b
    } else {
        a.shape() == b.shape() && a.to_f64_vec() == b.to_f64_vec()
    }
}

/// Every difference between `a` and `b`, one line each, each prefixed with
/// the location it was found at.  Empty when the values match.
pub fn object_diff(a: &Value, b: &Value) -> Vec<String> {
    let mut out = Vec::new();
    diff_into(a, b, "", &mut out);
    out
}

fn diff_into(a: &Value, b: &Value, pre: &str, out: &mut Vec<String>) {
    let (ta, tb) = (type_name(a), type_name(b));
    if ta != tb {
        out.push(format!("{pre} type mismatch ({ta}, {tb})"));
        return;
    }
    match (a, b) {
        (Value::Dict(x), Value::Dict(y)) => {
            let missing: BTreeSet<&String> = y.keys().filter(|k| !x.contains_key(*k)).collect();
            if !missing.is_empty() {
                out.push(format!("{pre} x1 missing keys {missing:?}"));
            }
            for (key, xv) in x {
                match y.get(key) {
                    None => out.push(format!("{pre} x2 missing key {key}")),
                    Some(yv) => diff_into(xv, yv, &format!("{pre}d1[{key:?}]"), out),
                }
            }
        }
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            if x.len() != y.len() {
                out.push(format!("{pre} length mismatch ({}, {})", x.len(), y.len()));
            } else {
                for (i, (xv, yv)) in x.iter().zip(y).enumerate() {
                    diff_into(xv, yv, &format!("{pre}[{i}]"), out);
                }
            }
        }
        (Value::Null, Value::Null) => {}
        (Value::Array(x), Value::Array(y)) => {
            if !arrays_equal(x, y) {
                out.push(format!("{pre} array mismatch"));
            }
        }
        (Value::MultiArray(x), Value::MultiArray(y)) => {
            if x.len() != y.len() {
                out.push(format!("{pre} length mismatch ({}, {})", x.len(), y.len()));
            } else {
                for (i, (xa, ya)) in x.iter().zip(y).enumerate() {
                    if !arrays_equal(xa, ya) {
                        out.push(format!("{pre}[{i}] array mismatch"));
                    }
                }
            }
        }
        (Value::Sparse(x), Value::Sparse(y)) => {
            if x.shape() != y.shape() {
                out.push(format!(
                    "{pre} sparse matrix a and b shape mismatch ({:?} vs {:?})",
                    x.shape(),
                    y.shape()
                ));
            } else {
                let n = x.count_differences(y);
                if n > 0 {
                    out.push(format!("{pre} sparse matrix a and b differ on {n} elements"));
                }
            }
        }
        (Value::Frame(x), Value::Frame(y)) => {
            if x.shape() != y.shape() {
                out.push(format!(
                    "{pre} pandas values a and b shape mismatch ({:?} vs {:?})",
                    x.shape(),
                    y.shape()
                ));
            } else {
                let n = x.values().iter().zip(y.values().iter()).filter(|(p, q)| *p - *q != 0.0).count();
                if n > 0 {
                    out.push(format!("{pre} pandas values a and b differ on {n} elements"));
                }
            }
        }
        (Value::Bool(x), Value::Bool(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Int(x), Value::Int(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Float(x), Value::Float(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Text(x), Value::Text(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Scalar(x), Value::Scalar(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Datetime(x), Value::Datetime(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (Value::Timezone(x), Value::Timezone(y)) if x != y => out.push(format!("{pre} value mismatch ({x}, {y})")),
        (x, y) => {
            if x != y {
                out.push(format!("{pre} value mismatch"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SparseMatrix;

    #[test]
    fn equal_values_have_no_diff() {
        let v: Value = [("a", Value::List(vec![Value::Int(1), Value::Null]))].into_iter().collect();
        assert!(object_diff(&v, &v.clone()).is_empty());
    }

    #[test]
    fn reports_keys_lengths_and_values() {
        let a: Value = [("a", Value::Int(1)), ("b", Value::List(vec![Value::Int(1)]))].into_iter().collect();
        let b: Value = [("a", Value::Int(2)), ("c", Value::Null)].into_iter().collect();
        let lines = object_diff(&a, &b);
        assert_eq!(
            lines,
            vec![
                " x1 missing keys {\"c\"}".to_owned(),
                "d1[\"a\"] value mismatch (1, 2)".to_owned(),
                " x2 missing key b".to_owned(),
            ]
        );
    }

    #[test]
    fn int_and_float_are_different_types() {
        assert_eq!(object_diff(&Value::Int(1), &Value::Float(1.0)), vec![" type mismatch (int, float)"]);
    }

    #[test]
    fn sparse_difference_counts_nonzeros() {
        let m = |v: f64| {
            SparseMatrix::new(SparseFormat::Csr, (2, 2), NdArray::from_vec(vec![1.0, v]), vec![0, 1], vec![0, 1, 2])
                .unwrap()
        };
        let lines = object_diff(&Value::Sparse(m(1.0)), &Value::Sparse(m(3.0)));
        assert_eq!(lines, vec![" sparse matrix a and b differ on 1 elements"]);
    }
}
