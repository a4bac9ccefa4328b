//! Sort-order checks for values read back from map tables.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	Ascending,
	Descending,
}

/// How cell text is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
	/// Plain string ordering.
	#[default]
	Lexicographic,
	/// Values converted to numbers first.
	Numeric,
}

/// Returns true when `values` is non-strictly monotonic in `direction`.
///
/// Scans adjacent pairs and stops at the first violation. Equal neighbours
/// never violate the order. Under [`SortKind::Numeric`] a value that is not a
/// number poisons every comparison it takes part in, so the check fails.
pub fn is_sorted<S: AsRef<str>>(values: &[S], direction: SortDirection, kind: SortKind) -> bool {
	values.windows(2).all(|pair| {
		let (prev, next) = (pair[0].as_ref(), pair[1].as_ref());
		let ordering = match kind {
			SortKind::Lexicographic => Some(prev.cmp(next)),
			SortKind::Numeric => to_number(prev).partial_cmp(&to_number(next)),
		};
		match (ordering, direction) {
			(None, _) => false,
			(Some(ord), SortDirection::Ascending) => ord != Ordering::Greater,
			(Some(ord), SortDirection::Descending) => ord != Ordering::Less,
		}
	})
}

/// Converts cell text to a number: blank is zero, anything unparseable is NaN.
fn to_number(text: &str) -> f64 {
	let trimmed = text.trim();
	if trimmed.is_empty() {
		return 0.0;
	}
	trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
	use super::SortDirection::{Ascending, Descending};
	use super::SortKind::{Lexicographic, Numeric};
	use super::*;

	#[test]
	fn short_sequences_are_sorted() {
		let empty: [&str; 0] = [];
		for direction in [Ascending, Descending] {
			for kind in [Lexicographic, Numeric] {
				assert!(is_sorted(&empty, direction, kind));
				assert!(is_sorted(&["a"], direction, kind));
			}
		}
	}

	#[test]
	fn ties_do_not_break_order() {
		assert!(is_sorted(&["a", "b", "b", "c"], Ascending, Lexicographic));
		assert!(!is_sorted(&["c", "b"], Ascending, Lexicographic));
		assert!(is_sorted(&["c", "b", "b"], Descending, Lexicographic));
	}

	#[test]
	fn numeric_differs_from_lexicographic() {
		assert!(is_sorted(&["10", "9"], Descending, Numeric));
		assert!(!is_sorted(&["10", "9"], Descending, Lexicographic));
		assert!(is_sorted(&["9", "10", "100"], Ascending, Numeric));
	}

	#[test]
	fn numeric_handles_blanks_and_garbage() {
		assert!(is_sorted(&["", "1", " 2 "], Ascending, Numeric));
		assert!(!is_sorted(&["1", "n/a", "3"], Ascending, Numeric));
		assert!(!is_sorted(&["1", "n/a", "3"], Descending, Numeric));
		assert!(is_sorted(&["-1.5", "0", "2e3"], Ascending, Numeric));
	}

	#[test]
	fn accepts_owned_strings() {
		let cells: Vec<String> = vec!["101".into(), "57".into(), "3".into()];
		assert!(is_sorted(&cells, Descending, Numeric));
	}
}
