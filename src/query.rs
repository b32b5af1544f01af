//! Pure query functions over an already fetched collection.
//!
//! Nothing here touches the network or the store; callers pass in whatever
//! the sync layer returned.

use serde_json::Value;
use std::collections::HashSet;

use crate::cache::Record;

/// Filter value meaning "do not filter on this field".
pub const ALL: &str = "all";

/// Keep records whose `field` equals `value`. [`ALL`] returns the input as is.
///
/// String fields compare on their contents; other values compare on their
/// JSON text, so `"true"` matches a boolean and `"3"` matches an integer.
pub fn filter_by_field<R: Record>(records: Vec<R>, field: &str, value: &str) -> Vec<R> {
  if value == ALL {
    return records;
  }

  records
    .into_iter()
    .filter(|record| {
      record
        .field(field)
        .map(|v| value_matches(&v, value))
        .unwrap_or(false)
    })
    .collect()
}

/// Apply the cuisine filter, then the neighborhood filter. [`ALL`] in either
/// position skips that filter.
pub fn filter_by_cuisine_and_neighborhood<R: Record>(
  records: Vec<R>,
  cuisine: &str,
  neighborhood: &str,
) -> Vec<R> {
  let records = filter_by_field(records, "cuisine_type", cuisine);
  filter_by_field(records, "neighborhood", neighborhood)
}

/// Values of `field` across `records`, first occurrence first, duplicates
/// dropped. Records without the field are skipped.
pub fn distinct_values<R: Record>(records: &[R], field: &str) -> Vec<String> {
  let mut seen = HashSet::new();
  records
    .iter()
    .filter_map(|record| record.field(field).and_then(|v| value_text(&v)))
    .filter(|text| seen.insert(text.clone()))
    .collect()
}

fn value_text(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    other => Some(other.to_string()),
  }
}

fn value_matches(value: &Value, expected: &str) -> bool {
  value_text(value).is_some_and(|text| text == expected)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Restaurant;
  use serde_json::json;

  fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
    serde_json::from_value(json!({
      "id": id,
      "name": format!("R{id}"),
      "cuisine_type": cuisine,
      "neighborhood": neighborhood,
      "is_favorite": id % 2 == 0
    }))
    .unwrap()
  }

  fn test_restaurants() -> Vec<Restaurant> {
    vec![
      restaurant(1, "Asian", "Manhattan"),
      restaurant(2, "Pizza", "Brooklyn"),
      restaurant(3, "Asian", "Queens"),
      restaurant(4, "Mexican", "Manhattan"),
    ]
  }

  fn ids(records: &[Restaurant]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
  }

  #[test]
  fn test_all_is_identity() {
    let input = test_restaurants();
    assert_eq!(filter_by_field(input.clone(), "cuisine_type", ALL), input);
  }

  #[test]
  fn test_filter_by_field() {
    let asian = filter_by_field(test_restaurants(), "cuisine_type", "Asian");
    assert_eq!(ids(&asian), vec![1, 3]);

    let none = filter_by_field(test_restaurants(), "cuisine_type", "Thai");
    assert!(none.is_empty());
  }

  #[test]
  fn test_filter_non_string_fields() {
    let favorites = filter_by_field(test_restaurants(), "is_favorite", "true");
    assert_eq!(ids(&favorites), vec![2, 4]);

    let third = filter_by_field(test_restaurants(), "id", "3");
    assert_eq!(ids(&third), vec![3]);
  }

  #[test]
  fn test_filter_missing_field_matches_nothing() {
    let out = filter_by_field(test_restaurants(), "no_such_field", "x");
    assert!(out.is_empty());
  }

  #[test]
  fn test_cuisine_and_neighborhood_both_all() {
    let input = test_restaurants();
    assert_eq!(
      filter_by_cuisine_and_neighborhood(input.clone(), ALL, ALL),
      input
    );
  }

  #[test]
  fn test_cuisine_and_neighborhood_single_predicate() {
    let by_cuisine = filter_by_cuisine_and_neighborhood(test_restaurants(), "Asian", ALL);
    assert_eq!(ids(&by_cuisine), vec![1, 3]);

    let by_hood = filter_by_cuisine_and_neighborhood(test_restaurants(), ALL, "Manhattan");
    assert_eq!(ids(&by_hood), vec![1, 4]);
  }

  #[test]
  fn test_cuisine_and_neighborhood_both() {
    let out = filter_by_cuisine_and_neighborhood(test_restaurants(), "Asian", "Manhattan");
    assert_eq!(ids(&out), vec![1]);
  }

  #[test]
  fn test_distinct_values_first_occurrence_order() {
    let input = vec![
      restaurant(1, "Italian", "A"),
      restaurant(2, "Thai", "B"),
      restaurant(3, "Italian", "C"),
    ];
    assert_eq!(distinct_values(&input, "cuisine_type"), vec!["Italian", "Thai"]);
  }

  #[test]
  fn test_distinct_values_not_sorted() {
    let hoods = distinct_values(&test_restaurants(), "neighborhood");
    assert_eq!(hoods, vec!["Manhattan", "Brooklyn", "Queens"]);
  }

  #[test]
  fn test_distinct_values_skips_missing() {
    assert!(distinct_values(&test_restaurants(), "photograph").is_empty());
    assert!(distinct_values::<Restaurant>(&[], "cuisine_type").is_empty());
  }

  #[test]
  fn test_absent_neighborhood_is_not_a_value() {
    let partial: Restaurant = serde_json::from_value(json!({ "id": 2 })).unwrap();
    let input = vec![restaurant(1, "Asian", "Queens"), partial];

    assert_eq!(distinct_values(&input, "neighborhood"), vec!["Queens"]);
    assert!(filter_by_field(input, "neighborhood", "").is_empty());
  }
}
