use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::is_nfc;

use crate::error::CanonError;
use crate::error::Result;
use crate::hash::hash_value;
use crate::pointer;
use crate::schema::ArrayKind;
use crate::schema::ObjectSchema;
use crate::schema::Schema;
use crate::value::Value;

/// The maximum safe integer magnitude CSNF allows: `2^53 - 1`.
pub const MAX_SAFE_INT: i64 = 9_007_199_254_740_991;

/// `transform(value, schema?) -> value'`. Any violation is a rejection
/// (a `CanonError`), not a silent fix, except for two deliberately
/// conservative rules: integer-valued floats are coerced, and nulls are
/// stripped when no schema says otherwise.
pub fn transform(input: &serde_json::Value, schema: Option<&Schema>) -> Result<Value> {
    transform_at("", input, schema)
}

fn transform_at(path: &str, input: &serde_json::Value, schema: Option<&Schema>) -> Result<Value> {
    match input {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => transform_number(path, n),
        serde_json::Value::String(s) => transform_string(path, s, schema),
        serde_json::Value::Array(arr) => transform_array(path, arr, schema),
        serde_json::Value::Object(obj) => transform_object(path, obj, schema),
    }
}

fn transform_number(path: &str, n: &serde_json::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return check_range(path, i).map(Value::Int);
    }
    if let Some(u) = n.as_u64() {
        if u <= MAX_SAFE_INT as u64 {
            return Ok(Value::Int(u as i64));
        }
        return Err(CanonError::IntOutOfRange(path.to_string()));
    }
    // Only reachable for non-integral representations (f64 without an
    // exact i64/u64 form serde_json would have already produced above).
    let f = n
        .as_f64()
        .ok_or_else(|| CanonError::FloatNotAllowed(path.to_string()))?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(63) {
        return check_range(path, f as i64).map(Value::Int);
    }
    Err(CanonError::FloatNotAllowed(path.to_string()))
}

fn check_range(path: &str, i: i64) -> Result<i64> {
    if i.abs() > MAX_SAFE_INT {
        return Err(CanonError::IntOutOfRange(path.to_string()));
    }
    Ok(i)
}

fn transform_string(path: &str, s: &str, schema: Option<&Schema>) -> Result<Value> {
    let nfc = normalize_nfc(s);
    match schema {
        Some(Schema::Decimal { scale }) => Ok(Value::String(normalize_decimal(path, &nfc, *scale)?)),
        Some(Schema::Timestamp) => Ok(Value::String(normalize_timestamp(path, &nfc)?)),
        _ => Ok(Value::String(nfc)),
    }
}

fn normalize_nfc(s: &str) -> String {
    if is_nfc(s) {
        s.to_string()
    } else {
        s.nfc().collect()
    }
}

fn normalize_decimal(path: &str, s: &str, scale: Option<u32>) -> Result<String> {
    if !is_canonical_decimal_grammar(s) {
        return Err(CanonError::InvalidDecimal(path.to_string()));
    }
    let Some(scale) = scale else {
        return Ok(s.to_string());
    };
    let (sign, digits) = if let Some(rest) = s.strip_prefix('-') {
        ("-", rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        ("", rest)
    } else {
        ("", s)
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let scale = scale as usize;
    let padded_frac = if frac_part.len() >= scale {
        frac_part[..scale].to_string()
    } else {
        format!("{frac_part}{}", "0".repeat(scale - frac_part.len()))
    };
    if scale == 0 {
        Ok(format!("{sign}{int_part}"))
    } else {
        Ok(format!("{sign}{int_part}.{padded_frac}"))
    }
}

fn is_canonical_decimal_grammar(s: &str) -> bool {
    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if int_part.len() > 1 && int_part.starts_with('0') {
        return false;
    }
    match frac_part {
        Some(f) => !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    }
}

fn normalize_timestamp(path: &str, s: &str) -> Result<String> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|_| CanonError::InvalidTimestamp(path.to_string()))?;
    let utc: DateTime<Utc> = dt.with_timezone(&Utc);
    Ok(utc.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn transform_array(path: &str, arr: &[serde_json::Value], schema: Option<&Schema>) -> Result<Value> {
    let (element_schema, kind) = match schema {
        Some(Schema::Array(a)) => (Some(a.element.as_ref()), Some(&a.kind)),
        _ => (None, None),
    };

    let mut elements = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        let child_path = format!("{path}/{i}");
        elements.push(transform_at(&child_path, item, element_schema)?);
    }

    match kind {
        None | Some(ArrayKind::Ordered) => Ok(Value::Array(elements)),
        Some(ArrayKind::Set {
            sort_key_pointer,
            unique,
        }) => {
            let mut keyed: Vec<(Vec<u8>, String, Value)> = elements
                .into_iter()
                .map(|el| {
                    let sort_key = pointer::resolve(&el, sort_key_pointer)
                        .map(crate::jcs::to_jcs_bytes)
                        .unwrap_or_default();
                    let tie_hash = hash_value(&el);
                    (sort_key, tie_hash, el)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            if *unique {
                keyed.dedup_by(|a, b| a.1 == b.1);
            }
            Ok(Value::Array(keyed.into_iter().map(|(_, _, v)| v).collect()))
        }
    }
}

fn transform_object(
    path: &str,
    obj: &serde_json::Map<String, serde_json::Value>,
    schema: Option<&Schema>,
) -> Result<Value> {
    if let Some(Schema::Money) = schema {
        return transform_money(path, obj);
    }
    let object_schema: Option<&ObjectSchema> = match schema {
        Some(Schema::Object(o)) => Some(o),
        _ => None,
    };

    let mut out = BTreeMap::new();
    for (k, v) in obj {
        let field = object_schema.and_then(|o| o.field(k));
        let nullable = field.map(|f| f.nullable).unwrap_or(false);
        if v.is_null() {
            if nullable {
                out.insert(k.clone(), Value::Null);
            }
            // Conservative: drop the null field entirely otherwise.
            continue;
        }
        let child_path = pointer::join(path, k);
        let child_schema = field.map(|f| &f.schema);
        out.insert(k.clone(), transform_at(&child_path, v, child_schema)?);
    }
    Ok(Value::Object(out))
}

fn transform_money(path: &str, obj: &serde_json::Map<String, serde_json::Value>) -> Result<Value> {
    let mut out = BTreeMap::new();
    let amount = obj
        .get("amount_minor")
        .ok_or_else(|| CanonError::SchemaMismatch(path.to_string(), "missing amount_minor".into()))?;
    let amount = transform_at(&pointer::join(path, "amount_minor"), amount, None)?;
    if !matches!(amount, Value::Int(_)) {
        return Err(CanonError::SchemaMismatch(
            path.to_string(),
            "amount_minor must be an integer".into(),
        ));
    }
    out.insert("amount_minor".to_string(), amount);

    let currency = obj
        .get("currency")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CanonError::SchemaMismatch(path.to_string(), "missing currency".into()))?;
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(CanonError::InvalidCurrency(pointer::join(path, "currency")));
    }
    out.insert("currency".to_string(), Value::String(currency.to_string()));

    if let Some(period) = obj.get("period") {
        if !period.is_null() {
            out.insert(
                "period".to_string(),
                transform_at(&pointer::join(path, "period"), period, None)?,
            );
        }
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn integer_valued_float_coerces_noninteger_rejected() {
        let v = transform(&json!(42.0), None).expect("42.0 coerces");
        assert_eq!(v, Value::Int(42));

        let err = transform(&json!(3.14), None).unwrap_err();
        assert!(matches!(err, CanonError::FloatNotAllowed(_)));
    }

    /// S1 — the literal scenario from spec §8: `CSNF(42.0)` -> `42`;
    /// `CSNF(3.14)` -> error `CSNF_FLOAT_NOT_ALLOWED`.
    #[test]
    fn s1_integer_coercion_scenario() {
        assert_eq!(transform(&json!(42.0), None).expect("42.0 coerces"), Value::Int(42));
        assert!(matches!(
            transform(&json!(3.14), None).unwrap_err(),
            CanonError::FloatNotAllowed(_)
        ));
    }

    /// S2 — the literal scenario from spec §8: `CSNF("café")`
    /// -> `"café"` (precomposed).
    #[test]
    fn s2_nfc_scenario() {
        let v = transform(&json!("caf\u{0065}\u{0301}"), None).expect("valid string");
        assert_eq!(v, Value::String("café".to_string()));
    }

    #[test]
    fn nfc_normalization() {
        let decomposed = "cafe\u{0301}";
        let v = transform(&json!(decomposed), None).expect("valid string");
        assert_eq!(v, Value::String("café".to_string()));
    }

    #[test]
    fn rejects_out_of_range_integers() {
        let too_big = json!(MAX_SAFE_INT as i128 + 1);
        let err = transform(&too_big, None).unwrap_err();
        assert!(matches!(err, CanonError::IntOutOfRange(_)));
    }

    #[test]
    fn null_stripping_without_schema() {
        let v = transform(&json!({"a": 1, "b": null}), None).expect("ok");
        let obj = v.as_object().expect("object");
        assert_eq!(obj.len(), 1);
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn null_retained_when_nullable() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "b".to_string(),
            crate::schema::FieldSchema {
                nullable: true,
                schema: Schema::Any,
            },
        );
        let schema = Schema::Object(ObjectSchema { fields });
        let v = transform(&json!({"a": 1, "b": null}), Some(&schema)).expect("ok");
        let obj = v.as_object().expect("object");
        assert_eq!(obj.get("b"), Some(&Value::Null));
    }

    #[test]
    fn csnf_idempotence() {
        let cases = [
            json!({"z": 1, "a": [1, 2, 3], "m": {"x": true, "y": null}}),
            json!("caf\u{0065}\u{0301}"),
            json!(42.0),
            json!([3, 1, 2]),
        ];
        for case in cases {
            let once = transform(&case, None).expect("first pass");
            let roundtrip = once.to_json();
            let twice = transform(&roundtrip, None).expect("second pass");
            assert_eq!(once, twice);
            assert_eq!(hash_value(&once), hash_value(&twice));
        }
    }

    #[test]
    fn set_array_sorts_and_dedups() {
        let schema = Schema::Array(crate::schema::ArraySchema {
            kind: ArrayKind::Set {
                sort_key_pointer: "/k".to_string(),
                unique: true,
            },
            element: Box::new(Schema::Any),
        });
        let input = json!([{"k": 2, "v": "b"}, {"k": 1, "v": "a"}, {"k": 1, "v": "a"}]);
        let v = transform(&input, Some(&schema)).expect("ok");
        let arr = v.as_array().expect("array");
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0].as_object().unwrap().get("k"), Some(&Value::Int(1)));
        assert_eq!(arr[1].as_object().unwrap().get("k"), Some(&Value::Int(2)));
    }

    #[test]
    fn timestamp_normalizes_to_utc_millis() {
        let schema = Schema::Timestamp;
        let v = transform(&json!("2024-06-15T10:00:00+02:00"), Some(&schema)).expect("ok");
        assert_eq!(v, Value::String("2024-06-15T08:00:00.000Z".to_string()));
    }

    #[test]
    fn money_validates_structure() {
        let schema = Schema::Money;
        let v = transform(
            &json!({"amount_minor": 500, "currency": "USD"}),
            Some(&schema),
        )
        .expect("ok");
        let obj = v.as_object().expect("object");
        assert_eq!(obj.get("amount_minor"), Some(&Value::Int(500)));

        let bad = transform(&json!({"amount_minor": 500, "currency": "usd"}), Some(&schema));
        assert!(matches!(bad, Err(CanonError::InvalidCurrency(_))));
    }
}
