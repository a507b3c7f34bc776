// Option lists for the frontend's filter dropdowns.
//
// Each auxiliary range is a single column of raw values. We drop blanks,
// dedupe (first occurrence wins) and sort.

use std::collections::HashSet;

/// How an auxiliary range should be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPreference {
    /// Numeric ascending when every value is a finite number, otherwise
    /// lexicographic. Used for pin counts and terminal sizes.
    NumericFirst,
    /// Always lexicographic. Used for manufacturer names.
    Lexicographic,
}

fn as_finite_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Builds a deduplicated, sorted option list from raw column values.
pub fn extract_options<I, S>(values: I, preference: SortPreference) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut options: Vec<String> = values
        .into_iter()
        .map(|value| value.as_ref().trim().to_string())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.clone()))
        .collect();

    let numbers: Option<Vec<f64>> = match preference {
        SortPreference::NumericFirst => options.iter().map(|v| as_finite_number(v)).collect(),
        SortPreference::Lexicographic => None,
    };

    match numbers {
        Some(numbers) => {
            let mut keyed: Vec<(f64, String)> = numbers.into_iter().zip(options).collect();
            // Stable sort; equal numbers ("4" and "4.0") keep first-seen order.
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            keyed.into_iter().map(|(_, value)| value).collect()
        }
        None => {
            options.sort();
            options
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_column_is_deduped_and_sorted() {
        let options = extract_options(["4", "2", "4", "", "8"], SortPreference::NumericFirst);
        assert_eq!(options, vec!["2", "4", "8"]);
    }

    #[test]
    fn numbers_sort_by_value_not_text() {
        let options = extract_options(["10", "2", "1.5"], SortPreference::NumericFirst);
        assert_eq!(options, vec!["1.5", "2", "10"]);
    }

    #[test]
    fn mixed_column_falls_back_to_lexicographic() {
        let options = extract_options(["12", "2", "N/A", "2"], SortPreference::NumericFirst);
        assert_eq!(options, vec!["12", "2", "N/A"]);
    }

    #[test]
    fn manufacturers_never_sort_numerically() {
        let options = extract_options(
            vec!["TE", "Aptiv", "10", "9", " Aptiv "],
            SortPreference::Lexicographic,
        );
        assert_eq!(options, vec!["10", "9", "Aptiv", "TE"]);
    }

    #[test]
    fn empty_column_yields_no_options() {
        let options = extract_options(Vec::<String>::new(), SortPreference::NumericFirst);
        assert!(options.is_empty());
    }
}
