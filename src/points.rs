use std::fmt::Display;

use itertools::Itertools;
use rayon::prelude::*;

use crate::error::{Error, Result};

// below this amount of rows the transposition is not worth a thread pool
const PARALLEL_ROWS: usize = 10_000;

/// Single cell of point data.
pub trait Scalar: Display + Sync {}

impl Scalar for f64 {}
impl Scalar for f32 {}
impl Scalar for i64 {}
impl Scalar for i32 {}
impl Scalar for u64 {}
impl Scalar for u32 {}
impl Scalar for usize {}

/// Data that can be handed to gnuplot: one row per line, columns separated by spaces.
pub trait ToPoints {
    fn to_points(&self) -> Result<String>;
}

/// Point text that is already formatted.
impl ToPoints for str {
    fn to_points(&self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl ToPoints for String {
    fn to_points(&self) -> Result<String> {
        Ok(self.clone())
    }
}

/// A flat sequence is a single column.
impl<T: Scalar> ToPoints for [T] {
    fn to_points(&self) -> Result<String> {
        Ok(self.iter().join("\n"))
    }
}

/// A sequence of columns, transposed into rows.
impl<T: Scalar> ToPoints for [Vec<T>] {
    fn to_points(&self) -> Result<String> {
        let rows = match self.first() {
            Some(first) => first.len(),
            None => return Ok(String::new()),
        };

        if let Some((i, column)) = self.iter().find_position(|c| c.len() != rows) {
            return Err(Error::Conversion(format!(
                "column {} has {} values, expected {}",
                i,
                column.len(),
                rows
            )));
        }

        let row = |r: usize| self.iter().map(|column| &column[r]).join(" ");

        let lines: Vec<String> = if rows >= PARALLEL_ROWS {
            (0..rows).into_par_iter().map(row).collect()
        } else {
            (0..rows).map(row).collect()
        };

        Ok(lines.join("\n"))
    }
}

/// Labeled rows: the label is quoted and becomes the first column.
impl<L: AsRef<str> + Sync, T: Scalar> ToPoints for [(L, Vec<T>)] {
    fn to_points(&self) -> Result<String> {
        self.iter()
            .map(|(label, values)| {
                let label = label.as_ref();
                if label.contains('"') {
                    return Err(Error::Conversion(format!(
                        "label {:?} cannot contain a double quote",
                        label
                    )));
                }
                Ok(std::iter::once(format!("\"{}\"", label))
                    .chain(values.iter().map(ToString::to_string))
                    .join(" "))
            })
            .collect::<Result<Vec<_>>>()
            .map(|rows| rows.join("\n"))
    }
}

impl<T: ToPoints + ?Sized> ToPoints for &T {
    fn to_points(&self) -> Result<String> {
        (**self).to_points()
    }
}

impl<T> ToPoints for Vec<T>
where
    [T]: ToPoints,
{
    fn to_points(&self) -> Result<String> {
        self.as_slice().to_points()
    }
}

impl<T, const N: usize> ToPoints for [T; N]
where
    [T]: ToPoints,
{
    fn to_points(&self) -> Result<String> {
        self.as_slice().to_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_transposed() {
        let data = vec![vec![0, 1, 2, 3], vec![0, 1, 4, 9]];
        assert_eq!(data.to_points().unwrap(), "0 0\n1 1\n2 4\n3 9");
    }

    #[test]
    fn flat_sequence_is_one_column() {
        assert_eq!(vec![1.5, 2.0, 3.25].to_points().unwrap(), "1.5\n2\n3.25");
    }

    #[test]
    fn ragged_columns_fail() {
        let data = vec![vec![0, 1, 2], vec![0, 1]];
        assert!(matches!(data.to_points(), Err(Error::Conversion(_))));
    }

    #[test]
    fn large_columns_are_transposed_in_order() {
        let x: Vec<usize> = (0..PARALLEL_ROWS * 2).collect();
        let y: Vec<usize> = x.iter().map(|v| v * 2).collect();
        let text = vec![x, y].to_points().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), PARALLEL_ROWS * 2);
        assert_eq!(lines[12345], "12345 24690");
    }

    #[test]
    fn labeled_rows_quote_the_label() {
        let data = vec![("Build", vec![312, 630]), ("Test", vec![525, 1050])];
        assert_eq!(data.to_points().unwrap(), "\"Build\" 312 630\n\"Test\" 525 1050");
    }
}
