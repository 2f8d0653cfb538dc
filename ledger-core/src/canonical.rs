//! Canonical encoding for cryptographic hashing
//!
//! Produces the pre-image for every ledger hash:
//! - Object keys sorted by byte order at every nesting level
//! - No whitespace between tokens
//! - Output is pure ASCII: anything outside `0x20..=0x7E` is written as a
//!   lowercase `\uXXXX` escape, with surrogate pairs above the BMP
//! - Integers printed as plain digits; floats as their shortest round-trip
//!   digits, in exponent form (`1.5e-07`, `1e+16`) below `1e-4` or from
//!   `1e16` up, otherwise positional with at least one fractional digit
//!
//! These are the bytes Python's `json.dumps(obj, sort_keys=True,
//! separators=(",", ":"))` produces, so third parties can re-verify the chain
//! with stock tooling.
//!
//! Key order is enforced here rather than inherited from the map type, so the
//! output does not change if `serde_json` is built with `preserve_order`.

use crate::{Error, Result};
use serde::ser;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Ledger payload: string keys to JSON-representable values
pub type Payload = Map<String, Value>;

/// Canonical serializer
#[derive(Debug, Default)]
pub struct CanonicalSerializer {
    buffer: Vec<u8>,
}

impl CanonicalSerializer {
    /// Create new serializer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append one value
    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.extend_from_slice(b"null"),
            Value::Bool(true) => self.buffer.extend_from_slice(b"true"),
            Value::Bool(false) => self.buffer.extend_from_slice(b"false"),
            Value::Number(n) => self.write_number(n),
            Value::String(s) => self.write_string(s),
            Value::Array(items) => {
                self.buffer.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.buffer.push(b',');
                    }
                    self.write_value(item);
                }
                self.buffer.push(b']');
            }
            Value::Object(map) => self.write_object(map),
        }
    }

    /// Append an object with sorted keys
    pub fn write_object(&mut self, map: &Map<String, Value>) {
        let mut fields: Vec<(&String, &Value)> = map.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        self.buffer.push(b'{');
        for (i, (key, value)) in fields.into_iter().enumerate() {
            if i > 0 {
                self.buffer.push(b',');
            }
            self.write_string(key);
            self.buffer.push(b':');
            self.write_value(value);
        }
        self.buffer.push(b'}');
    }

    fn write_number(&mut self, n: &Number) {
        let text = match n.as_f64() {
            Some(f) if n.is_f64() => format_float(f).unwrap_or_else(|| n.to_string()),
            _ => n.to_string(),
        };
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn write_string(&mut self, s: &str) {
        self.buffer.push(b'"');
        for ch in s.chars() {
            match ch {
                '"' => self.buffer.extend_from_slice(b"\\\""),
                '\\' => self.buffer.extend_from_slice(b"\\\\"),
                '\n' => self.buffer.extend_from_slice(b"\\n"),
                '\r' => self.buffer.extend_from_slice(b"\\r"),
                '\t' => self.buffer.extend_from_slice(b"\\t"),
                '\u{08}' => self.buffer.extend_from_slice(b"\\b"),
                '\u{0C}' => self.buffer.extend_from_slice(b"\\f"),
                ' '..='~' => self.buffer.push(ch as u8),
                c => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        self.buffer
                            .extend_from_slice(format!("\\u{:04x}", unit).as_bytes());
                    }
                }
            }
        }
        self.buffer.push(b'"');
    }

    /// Finalize and return bytes
    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }
}

/// Lay out a finite float from its shortest round-trip digits
fn format_float(f: f64) -> Option<String> {
    let sci = format!("{:e}", f);
    let (mantissa, exp) = sci.split_once('e')?;
    let exp: i32 = exp.parse().ok()?;
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::from(sign);
    if !(-4..16).contains(&exp) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let exp_sign = if exp < 0 { '-' } else { '+' };
        out.push_str(&format!("e{}{:02}", exp_sign, exp.unsigned_abs()));
    } else if exp < 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat(exp.unsigned_abs() as usize - 1));
        out.push_str(&digits);
    } else {
        let int_len = exp as usize + 1;
        if digits.len() > int_len {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        } else {
            out.push_str(&digits);
            out.push_str(&"0".repeat(int_len - digits.len()));
            out.push_str(".0");
        }
    }
    Some(out)
}

/// Canonical bytes of a payload
pub fn canonical_encode(payload: &Payload) -> Vec<u8> {
    let mut ser = CanonicalSerializer::new();
    ser.write_object(payload);
    ser.finalize()
}

/// Convert any serializable record into a payload
///
/// Fails with [`Error::Encoding`] when the value is not a string-keyed map
/// (e.g. a map with tuple keys, or a bare scalar), or when it holds a NaN or
/// infinite float anywhere inside it.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Payload> {
    value.serialize(&mut FiniteCheck)?;
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Encoding(format!(
            "Payload must be a mapping, got {}",
            kind_of(&other)
        ))),
    }
}

/// Canonical bytes of any serializable record
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(canonical_encode(&to_payload(value)?))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Walks a value without producing output, failing on NaN and ±∞
///
/// `serde_json::to_value` turns those into `null`, so they are caught here
/// before conversion.
struct FiniteCheck;

impl FiniteCheck {
    fn float(v: f64) -> Result<()> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(Error::Encoding(format!(
                "non-finite float {} has no canonical encoding",
                v
            )))
        }
    }
}

impl<'a> ser::Serializer for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Result<()> {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Result<()> {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Result<()> {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Result<()> {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Result<()> {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> Result<()> {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Result<()> {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Result<()> {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Result<()> {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Result<()> {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> Result<()> {
        Ok(())
    }
    fn serialize_f32(self, v: f32) -> Result<()> {
        FiniteCheck::float(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> Result<()> {
        FiniteCheck::float(v)
    }
    fn serialize_char(self, _: char) -> Result<()> {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Result<()> {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<()> {
        Ok(())
    }
    fn serialize_none(self) -> Result<()> {
        Ok(())
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<()> {
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self> {
        Ok(self)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self> {
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self> {
        Ok(self)
    }
}

impl<'a> ser::SerializeSeq for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeMap for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        key.serialize(&mut **self)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn payload(value: Value) -> Payload {
        to_payload(&value).unwrap()
    }

    #[test]
    fn test_literal_encoding() {
        let p = payload(json!({"amount": 100, "asset": "V1", "nested": {"z": 1, "a": 2}}));
        assert_eq!(
            canonical_encode(&p),
            br#"{"amount":100,"asset":"V1","nested":{"a":2,"z":1}}"#.to_vec()
        );
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut a = Payload::new();
        a.insert("z".into(), json!(1));
        a.insert("a".into(), json!({"y": [1, 2], "b": null}));

        let mut b = Payload::new();
        b.insert("a".into(), json!({"b": null, "y": [1, 2]}));
        b.insert("z".into(), json!(1));

        assert_eq!(canonical_encode(&a), canonical_encode(&b));
    }

    #[test]
    fn test_nested_in_arrays_sorted() {
        let p = payload(json!({"list": [{"b": 1, "a": 2}, {"d": true, "c": false}]}));
        assert_eq!(
            canonical_encode(&p),
            br#"{"list":[{"a":2,"b":1},{"c":false,"d":true}]}"#.to_vec()
        );
    }

    #[test]
    fn test_string_escapes_are_ascii() {
        let p = payload(json!({
            "s": "quote\" back\\ nl\n tab\t bell\u{07} del\u{7f} é ✓ 😀",
            "g": 1.5e-7,
        }));
        assert_eq!(
            String::from_utf8(canonical_encode(&p)).unwrap(),
            r#"{"g":1.5e-07,"s":"quote\" back\\ nl\n tab\t bell\u0007 del\u007f \u00e9 \u2713 \ud83d\ude00"}"#
        );
    }

    #[test]
    fn test_float_layout() {
        let cases: [(f64, &str); 12] = [
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (100.0, "100.0"),
            (0.3, "0.3"),
            (-123.456, "-123.456"),
            (1e-4, "0.0001"),
            (1e-5, "1e-05"),
            (1e15, "1000000000000000.0"),
            (1e16, "1e+16"),
            (1.2345678901234568e17, "1.2345678901234568e+17"),
            (2.5e-300, "2.5e-300"),
            (f64::MAX, "1.7976931348623157e+308"),
        ];
        for (value, expected) in cases {
            let p = payload(json!({ "v": value }));
            assert_eq!(
                canonical_encode(&p),
                format!("{{\"v\":{}}}", expected).into_bytes(),
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        #[derive(Serialize)]
        struct Reading {
            value: f64,
        }

        #[derive(Serialize)]
        struct Batch {
            site: &'static str,
            readings: Vec<Option<f32>>,
        }

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = to_payload(&Reading { value }).unwrap_err();
            assert!(matches!(err, Error::Encoding(ref msg) if msg.contains("non-finite")));
        }

        let nested = Batch {
            site: "depot",
            readings: vec![Some(1.0), None, Some(f32::NAN)],
        };
        assert!(matches!(encode(&nested), Err(Error::Encoding(_))));
        assert!(to_payload(&Reading { value: 1.5 }).is_ok());
    }

    #[test]
    fn test_numbers_stable() {
        let p = payload(json!({"neg": -5, "big": 9_007_199_254_740_993u64, "rate": 0.3}));
        assert_eq!(
            canonical_encode(&p),
            br#"{"big":9007199254740993,"neg":-5,"rate":0.3}"#.to_vec()
        );
    }

    #[test]
    fn test_struct_and_map_types_agree() {
        #[derive(Serialize)]
        struct Claim {
            rule_id: &'static str,
            amount: u64,
        }

        let mut hashed: HashMap<&str, Value> = HashMap::new();
        hashed.insert("rule_id", json!("US_45W"));
        hashed.insert("amount", json!(750_000));

        let from_struct = encode(&Claim { rule_id: "US_45W", amount: 750_000 }).unwrap();
        let from_map = encode(&hashed).unwrap();
        assert_eq!(from_struct, from_map);
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = to_payload(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(to_payload(&42u32).is_err());
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        map.insert((1, 2), 3);
        assert!(matches!(to_payload(&map), Err(Error::Encoding(_))));
    }
}
