//! CouchDB key collation: the total order map/reduce view rows sort by.
//!
//! `null < false < true < numbers < strings (code point order) <
//! arrays (lexicographic) < objects (lexicographic on sorted pairs)`,
//! ranking by variant first and comparing within a variant second.

use std::cmp::Ordering;

use serde_json::{Map, Value};

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Compares numbers as IEEE 754 doubles, so an `Int32`-shaped key and a
/// `Double`-shaped key with the same value always compare equal.
fn cmp_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    let (af, bf) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    match (af.is_nan(), bf.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => af.partial_cmp(&bf).unwrap_or(Ordering::Equal),
    }
}

fn cmp_sequences<'a>(
    a: impl Iterator<Item = &'a Value>,
    a_len: usize,
    b: impl Iterator<Item = &'a Value>,
    b_len: usize,
) -> Ordering {
    let mut a = a;
    let mut b = b;
    loop {
        match (a.next(), b.next()) {
            (Some(x), Some(y)) => {
                let c = compare_values(x, y);
                if c != Ordering::Equal {
                    return c;
                }
            }
            _ => return a_len.cmp(&b_len),
        }
    }
}

fn cmp_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let mut ak: Vec<&String> = a.keys().collect();
    let mut bk: Vec<&String> = b.keys().collect();
    ak.sort();
    bk.sort();

    for (k1, k2) in ak.iter().zip(bk.iter()) {
        let kc = k1.cmp(k2);
        if kc != Ordering::Equal {
            return kc;
        }
        let vc = compare_values(&a[*k1], &b[*k2]);
        if vc != Ordering::Equal {
            return vc;
        }
    }
    ak.len().cmp(&bk.len())
}

/// The CouchDB collation order over arbitrary JSON values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }

    match (a, b) {
        (Value::Null, Value::Null) | (Value::Bool(_), Value::Bool(_)) => Ordering::Equal,
        (Value::Number(x), Value::Number(y)) => cmp_numbers(x, y),
        // UTF-8 byte-wise comparison preserves Unicode code point order.
        (Value::String(x), Value::String(y)) => x.as_str().cmp(y.as_str()),
        (Value::Array(x), Value::Array(y)) => cmp_sequences(x.iter(), x.len(), y.iter(), y.len()),
        (Value::Object(x), Value::Object(y)) => cmp_objects(x, y),
        _ => unreachable!("rank() guarantees matching variants here"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_ordering_matches_couchdb_rules() {
        let ladder = vec![
            json!(null),
            json!(false),
            json!(true),
            json!(1),
            json!("a"),
            json!([1]),
            json!({"a": 1}),
        ];
        for w in ladder.windows(2) {
            assert_eq!(compare_values(&w[0], &w[1]), Ordering::Less, "{:?} < {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn numbers_compare_as_doubles_across_int_and_float() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!(2147483648_i64), &json!(2147483648.0)), Ordering::Equal);
    }

    #[test]
    fn strings_compare_by_code_point() {
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
        assert_eq!(compare_values(&json!("abc"), &json!("ab")), Ordering::Greater);
    }

    #[test]
    fn arrays_compare_lexicographically() {
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare_values(&json!([1]), &json!([1, 2])), Ordering::Less);
    }

    #[test]
    fn objects_compare_on_sorted_key_value_pairs() {
        assert_eq!(
            compare_values(&json!({"a": 1}), &json!({"a": 2})),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&json!({"a": 1, "b": 2}), &json!({"a": 1})),
            Ordering::Greater
        );
    }
}
