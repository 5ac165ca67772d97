//! Canonical JSON text used as fingerprint input
//!
//! Mappings are written with their keys sorted at every level; sequences keep
//! their order. The text layout follows the classic `json.dumps(sort_keys=True)`
//! form (`", "` / `": "` separators, ASCII-only output, `repr`-style floats) so
//! that caches written by earlier tooling fingerprint identically.

use serde_json::{Map, Number, Value};

use crate::{Error, Result};

/// Write `value` in canonical form.
///
/// # Errors
///
/// Returns [`Error::Serialization`] for numbers that have no canonical
/// spelling (non-finite floats).
pub fn to_canonical_string(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n)?,
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map)?,
    }
    Ok(())
}

fn write_object(out: &mut String, map: &Map<String, Value>) -> Result<()> {
    // Byte order of UTF-8 keys equals code point order.
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(out, key);
        out.push_str(": ");
        write_value(out, value)?;
    }
    out.push('}');
    Ok(())
}

fn write_number(out: &mut String, n: &Number) -> Result<()> {
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| Error::Serialization(format!("unrepresentable number {n}")))?;
        write_float(out, f)?;
    }
    Ok(())
}

/// Shortest round-trip digits; positional for decimal exponents in
/// `[-4, 16)`, otherwise `d.ddde±XX`.
fn write_float(out: &mut String, f: f64) -> Result<()> {
    if !f.is_finite() {
        return Err(Error::Serialization(format!("non-finite float {f}")));
    }
    if f == 0.0 {
        out.push_str(if f.is_sign_negative() { "-0.0" } else { "0.0" });
        return Ok(());
    }

    let sci = format!("{f:e}");
    let (mantissa, exponent) = sci
        .split_once('e')
        .ok_or_else(|| Error::Serialization(format!("unexpected float form {sci}")))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| Error::Serialization(format!("unexpected float form {sci}")))?;

    if (-4..16).contains(&exponent) {
        let positional = f.to_string();
        out.push_str(&positional);
        if !positional.contains('.') {
            out.push_str(".0");
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs()));
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(value: &Value) -> String {
        to_canonical_string(value).unwrap()
    }

    #[test]
    fn test_keys_sorted_recursively() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": [3, {"y": 1, "x": 2}]});
        assert_eq!(
            canon(&value),
            r#"{"a": [3, {"x": 2, "y": 1}], "b": {"a": 2, "z": 1}}"#
        );
    }

    #[test]
    fn test_sequence_order_preserved() {
        assert_eq!(canon(&json!([3, 1, 2])), "[3, 1, 2]");
        assert_eq!(canon(&json!([])), "[]");
        assert_eq!(canon(&json!({})), "{}");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canon(&json!(null)), "null");
        assert_eq!(canon(&json!(true)), "true");
        assert_eq!(canon(&json!(false)), "false");
        assert_eq!(canon(&json!(-42)), "-42");
        assert_eq!(canon(&json!(u64::MAX)), "18446744073709551615");
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(canon(&json!(5.0)), "5.0");
        assert_eq!(canon(&json!(0.5)), "0.5");
        assert_eq!(canon(&json!(0.0001)), "0.0001");
        assert_eq!(canon(&json!(0.00001)), "1e-05");
        assert_eq!(canon(&json!(1.5e-7)), "1.5e-07");
        assert_eq!(canon(&json!(1e15)), "1000000000000000.0");
        assert_eq!(canon(&json!(1e16)), "1e+16");
        assert_eq!(canon(&json!(-0.0)), "-0.0");
        assert_eq!(canon(&json!(1.0 / 255.0)), "0.00392156862745098");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(canon(&json!("a\"b\\c")), r#""a\"b\\c""#);
        assert_eq!(canon(&json!("line\nnext\ttab")), r#""line\nnext\ttab""#);
        assert_eq!(canon(&json!("\u{1}")), r#""\u0001""#);
        assert_eq!(canon(&json!("\u{7f}")), r#""\u007f""#);
    }

    #[test]
    fn test_non_ascii_escaped() {
        assert_eq!(canon(&json!("café")), r#""caf\u00e9""#);
        // Astral plane characters become surrogate pairs
        assert_eq!(canon(&json!("\u{1F600}")), r#""\ud83d\ude00""#);
    }
}
