//! Aggregator Service
//!
//! Pure domain logic for joining resolved coordinates back to their inputs.
//! This service has NO external dependencies - it's pure Rust.

use crate::domain::entities::{Coordinate, GeoInput, GeoResult};

/// Assembles the final, input-ordered result list of a batch.
///
/// Workers complete in arbitrary order; the aggregator restores the
/// caller's ordering by the original input position so downstream
/// consumers can rely on index alignment among the resolved items.
/// `value` is copied through untouched.
pub struct Aggregator;

impl Aggregator {
    /// Join each resolved coordinate to its input.
    ///
    /// # Arguments
    /// * `resolved` - `(input position, input, coordinate)` in any order
    ///
    /// # Returns
    /// One `GeoResult` per resolved item, sorted by input position.
    /// Positions are expected to be unique; duplicates keep their relative order.
    ///
    /// # Example
    /// ```
    /// use postcode_geocoder::domain::entities::{Coordinate, GeoInput};
    /// use postcode_geocoder::domain::services::Aggregator;
    ///
    /// let a = GeoInput::new("SW1A 1AA", 1000.0);
    /// let b = GeoInput::new("M1 1AE", 50.0);
    /// let results = Aggregator::assemble(vec![
    ///     (1, &b, Coordinate::new(53.48, -2.24)),
    ///     (0, &a, Coordinate::new(51.5014, -0.1419)),
    /// ]);
    /// assert_eq!(results[0].postcode, "SW1A 1AA");
    /// assert_eq!(results[1].value, 50.0);
    /// ```
    pub fn assemble<'a, I>(resolved: I) -> Vec<GeoResult>
    where
        I: IntoIterator<Item = (usize, &'a GeoInput, Coordinate)>,
    {
        let mut indexed: Vec<(usize, GeoResult)> = resolved
            .into_iter()
            .map(|(index, input, coordinate)| (index, GeoResult::from_input(input, coordinate)))
            .collect();

        indexed.sort_by_key(|(index, _)| *index);

        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_empty() {
        let resolved: Vec<(usize, &GeoInput, Coordinate)> = Vec::new();
        let results = Aggregator::assemble(resolved);
        assert!(results.is_empty());
    }

    #[test]
    fn test_assemble_restores_input_order() {
        let inputs: Vec<GeoInput> = (0..5)
            .map(|i| GeoInput::new(format!("M{} 1AE", i + 1), i as f64))
            .collect();

        let resolved = vec![
            (3, &inputs[3], Coordinate::new(3.0, 3.0)),
            (0, &inputs[0], Coordinate::new(0.0, 0.0)),
            (4, &inputs[4], Coordinate::new(4.0, 4.0)),
            (1, &inputs[1], Coordinate::new(1.0, 1.0)),
        ];

        let results = Aggregator::assemble(resolved);

        let values: Vec<f64> = results.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 3.0, 4.0]);
        assert_eq!(results[2].postcode, "M4 1AE");
        assert_eq!(results[2].latitude, 3.0);
    }

    #[test]
    fn test_assemble_does_not_touch_value() {
        let input = GeoInput::new("SW1A 1AA", 1234.5678);
        let results = Aggregator::assemble(vec![(0, &input, Coordinate::new(51.5, -0.1))]);
        assert_eq!(results[0].value, 1234.5678);
    }

    #[test]
    fn test_assemble_same_postcode_twice() {
        let a = GeoInput::new("SW1A 1AA", 1.0);
        let b = GeoInput::new("sw1a1aa", 2.0);
        let coord = Coordinate::new(51.5014, -0.1419);

        let results = Aggregator::assemble(vec![(1, &b, coord), (0, &a, coord)]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].postcode, "SW1A 1AA");
        assert_eq!(results[1].postcode, "sw1a1aa");
        assert_eq!(results[0].coordinate(), results[1].coordinate());
    }
}
