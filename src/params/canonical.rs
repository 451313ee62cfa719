//! Canonical byte encoding of parameter sets.
//!
//! Every value carries a one-byte type tag, and every variable-length item is
//! prefixed with its length, so neither type confusion (`"12"` vs `12`) nor
//! field concatenation (`{"ab": "c"}` vs `{"a": "bc"}`) can produce the same
//! bytes. Keys are emitted in sorted order at every nesting level.
//!
//! ```text
//! set    = 'M' count:u64 (key_len:u64 key value)*
//! string = 'S' len:u64 utf8
//! int    = 'I' i64
//! float  = 'F' bits:u64
//! bool   = 'B' 0x00|0x01
//! list   = 'L' count:u64 value*
//! ```
//!
//! All integers are big-endian.

use super::{Params, Value};

const TAG_PARAMS: u8 = b'M';
const TAG_STRING: u8 = b'S';
const TAG_INT: u8 = b'I';
const TAG_FLOAT: u8 = b'F';
const TAG_BOOL: u8 = b'B';
const TAG_LIST: u8 = b'L';

pub(super) fn encode_params(params: &Params, out: &mut Vec<u8>) {
    out.push(TAG_PARAMS);
    write_len(params.len(), out);
    // BTreeMap iteration is already sorted by key bytes
    for (key, value) in params.iter() {
        write_len(key.len(), out);
        out.extend_from_slice(key.as_bytes());
        encode_value(value, out);
    }
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::String(s) => {
            out.push(TAG_STRING);
            write_len(s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Float(x) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&normalize_float(*x).to_bits().to_be_bytes());
        }
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Value::Params(p) => encode_params(p, out),
        Value::List(items) => {
            out.push(TAG_LIST);
            write_len(items.len(), out);
            for item in items {
                encode_value(item, out);
            }
        }
    }
}

/// `-0.0 == 0.0` and all NaNs are one value for caching purposes.
fn normalize_float(x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x == 0.0 {
        0.0
    } else {
        x
    }
}

#[inline]
fn write_len(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&(len as u64).to_be_bytes());
}
