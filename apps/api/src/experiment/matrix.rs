//! Matrix expansion — the tone × length × format grid an experiment runs.

use serde::{Deserialize, Serialize};

use crate::blueprint::vocab::{Format, Length, Tone};

/// Full cartesian product of `sets`, nested iteration with the last set
/// varying fastest. Any empty set, or no sets at all, yields `[]`.
pub fn cartesian_product<T: Clone>(sets: &[Vec<T>]) -> Vec<Vec<T>> {
    if sets.is_empty() || sets.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let total: usize = sets.iter().map(Vec::len).product();
    let mut rows: Vec<Vec<T>> = Vec::with_capacity(total);
    rows.push(Vec::with_capacity(sets.len()));

    for set in sets {
        rows = rows
            .into_iter()
            .flat_map(|prefix| {
                set.iter().map(move |item| {
                    let mut row = prefix.clone();
                    row.push(item.clone());
                    row
                })
            })
            .collect();
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub index: usize,
    pub tone: Tone,
    pub length: Length,
    pub format: Format,
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Tone(Tone),
    Length(Length),
    Format(Format),
}

/// Expands tones × lengths × formats into indexed cells, tone slowest and
/// format fastest.
pub fn expand_matrix(tones: &[Tone], lengths: &[Length], formats: &[Format]) -> Vec<MatrixCell> {
    let sets = vec![
        tones.iter().copied().map(Axis::Tone).collect::<Vec<_>>(),
        lengths.iter().copied().map(Axis::Length).collect(),
        formats.iter().copied().map(Axis::Format).collect(),
    ];

    cartesian_product(&sets)
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match row.as_slice() {
            [Axis::Tone(tone), Axis::Length(length), Axis::Format(format)] => Some(MatrixCell {
                index,
                tone: *tone,
                length: *length,
                format: *format,
            }),
            _ => None,
        })
        .collect()
}

/// Order-preserving dedup for caller-supplied axis values.
pub fn dedup_axis<T: PartialEq + Copy>(values: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(v) {
            out.push(*v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_by_two_row_major() {
        let product = cartesian_product(&[vec!["a", "b"], vec!["1", "2"]]);
        assert_eq!(
            product,
            vec![vec!["a", "1"], vec!["a", "2"], vec!["b", "1"], vec!["b", "2"]]
        );
    }

    #[test]
    fn test_any_empty_set_yields_empty() {
        assert!(cartesian_product(&[vec![1, 2], Vec::<i32>::new()]).is_empty());
        assert!(cartesian_product::<i32>(&[]).is_empty());
    }

    #[test]
    fn test_count_is_product_of_sizes() {
        let product = cartesian_product(&[vec![1, 2, 3], vec![4, 5], vec![6, 7, 8, 9]]);
        assert_eq!(product.len(), 24);
        assert!(product.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_single_set() {
        assert_eq!(cartesian_product(&[vec![1, 2]]), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_expand_matrix_order_and_indices() {
        let cells = expand_matrix(
            &[Tone::Casual, Tone::Formal],
            &[Length::Brief],
            &[Format::Paragraph, Format::Table],
        );
        assert_eq!(cells.len(), 4);
        assert_eq!(
            (cells[1].tone, cells[1].format),
            (Tone::Casual, Format::Table)
        );
        assert_eq!(cells[2].tone, Tone::Formal);
        assert!(cells.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_expand_matrix_empty_axis() {
        assert!(expand_matrix(&[Tone::Casual], &[], &[Format::Json]).is_empty());
    }

    #[test]
    fn test_dedup_axis_keeps_first_occurrence() {
        let tones = dedup_axis(&[Tone::Formal, Tone::Casual, Tone::Formal]);
        assert_eq!(tones, vec![Tone::Formal, Tone::Casual]);
    }
}
