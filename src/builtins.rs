use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ClouError, Result};
use crate::value::Value;

/// Descriptor for a native callable.  The evaluator dispatches on the
/// variant; `print` and `require` need interpreter state and are handled
/// there, the rest are implemented in this module.
///
/// String and number virtual methods carry their receiver, since member
/// access produces a fresh callable each time.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Print,
    Len,
    Clock,
    Require,
    StringMethod {
        receiver: String,
        method: StringMethod,
    },
    NumberToFixed {
        receiver: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Includes,
    Split,
    Slice,
}

impl Native {
    pub fn name(&self) -> &'static str {
        match self {
            Native::Print => "print",
            Native::Len => "len",
            Native::Clock => "clock",
            Native::Require => "require",
            Native::StringMethod { method, .. } => match method {
                StringMethod::Includes => "includes",
                StringMethod::Split => "split",
                StringMethod::Slice => "slice",
            },
            Native::NumberToFixed { .. } => "toFixed",
        }
    }
}

/// `len(x)`: character count of a string, element count of an array,
/// entry count of an object.
pub fn len(args: &[Value], line: usize) -> Result<Value> {
    if args.len() != 1 {
        return Err(ClouError::runtime(line, "len() takes exactly one argument"));
    }

    match &args[0] {
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),

        Value::Array(elements) => Ok(Value::Number(elements.borrow().len() as f64)),

        Value::Object(object) => Ok(Value::Number(object.borrow().len() as f64)),

        other => Err(ClouError::runtime(
            line,
            format!("len() expects a string, array, or object, got {}", other.type_name()),
        )),
    }
}

/// `clock()`: seconds since the epoch.
pub fn clock(line: usize) -> Result<Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ClouError::runtime(line, format!("Clock error: {}", e)))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

pub fn string_method(
    receiver: &str,
    method: StringMethod,
    args: &[Value],
    line: usize,
) -> Result<Value> {
    match method {
        StringMethod::Includes => {
            let needle = expect_string(args, 0, "includes()", line)?;

            Ok(Value::Bool(receiver.contains(&needle)))
        }

        StringMethod::Split => {
            let separator = expect_string(args, 0, "split()", line)?;

            let parts: Vec<Value> = if separator.is_empty() {
                receiver
                    .chars()
                    .map(|c| Value::String(c.to_string()))
                    .collect()
            } else {
                receiver
                    .split(separator.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect()
            };

            Ok(Value::Array(Rc::new(RefCell::new(parts))))
        }

        StringMethod::Slice => {
            let chars: Vec<char> = receiver.chars().collect();
            let length = chars.len() as f64;

            let start = expect_number(args, 0, "slice()", line)?;
            let end = match args.get(1) {
                Some(Value::Number(n)) => *n,
                Some(Value::Null) | None => length,
                Some(other) => {
                    return Err(ClouError::runtime(
                        line,
                        format!("slice() expects a number, got {}", other.type_name()),
                    ))
                }
            };

            let start = clamp_index(start, length);
            let end = clamp_index(end, length);

            if start >= end {
                return Ok(Value::String(String::new()));
            }

            Ok(Value::String(chars[start..end].iter().collect()))
        }
    }
}

/// `n.toFixed(digits)`: decimal rendering with a fixed fraction width.
pub fn to_fixed(receiver: f64, args: &[Value], line: usize) -> Result<Value> {
    let digits = expect_number(args, 0, "toFixed()", line)?;

    if digits < 0.0 || digits.fract() != 0.0 || digits > 100.0 {
        return Err(ClouError::runtime(
            line,
            "toFixed() expects an integer between 0 and 100",
        ));
    }

    Ok(Value::String(format!(
        "{:.*}",
        digits as usize,
        receiver
    )))
}

// Negative indices count from the end, as in the usual slice contract.
fn clamp_index(index: f64, length: f64) -> usize {
    let resolved = if index < 0.0 { length + index } else { index };

    resolved.max(0.0).min(length) as usize
}

fn expect_string(args: &[Value], at: usize, who: &str, line: usize) -> Result<String> {
    match args.get(at) {
        Some(Value::String(s)) => Ok(s.clone()),

        Some(other) => Err(ClouError::runtime(
            line,
            format!("{} expects a string, got {}", who, other.type_name()),
        )),

        None => Err(ClouError::runtime(
            line,
            format!("{} expects a string argument", who),
        )),
    }
}

fn expect_number(args: &[Value], at: usize, who: &str, line: usize) -> Result<f64> {
    match args.get(at) {
        Some(Value::Number(n)) => Ok(*n),

        Some(other) => Err(ClouError::runtime(
            line,
            format!("{} expects a number, got {}", who, other.type_name()),
        )),

        None => Err(ClouError::runtime(
            line,
            format!("{} expects a number argument", who),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_of_string_counts_characters() {
        let out = len(&[Value::String("héllo".to_string())], 1).unwrap();
        assert_eq!(out, Value::Number(5.0));
    }

    #[test]
    fn len_rejects_numbers() {
        let err = len(&[Value::Number(4.0)], 1).unwrap_err();
        assert!(err.to_string().contains("len() expects"));
    }

    #[test]
    fn includes_finds_substring() {
        let out = string_method(
            "hello world",
            StringMethod::Includes,
            &[Value::String("world".to_string())],
            1,
        )
        .unwrap();

        assert_eq!(out, Value::Bool(true));
    }

    #[test]
    fn split_on_separator() {
        let out = string_method(
            "a,b,c",
            StringMethod::Split,
            &[Value::String(",".to_string())],
            1,
        )
        .unwrap();

        match out {
            Value::Array(parts) => {
                let parts = parts.borrow();
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], Value::String("a".to_string()));
                assert_eq!(parts[2], Value::String("c".to_string()));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn split_on_empty_separator_yields_characters() {
        let out = string_method(
            "abc",
            StringMethod::Split,
            &[Value::String(String::new())],
            1,
        )
        .unwrap();

        match out {
            Value::Array(parts) => assert_eq!(parts.borrow().len(), 3),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn slice_with_end_and_without() {
        let with_end = string_method(
            "abcdef",
            StringMethod::Slice,
            &[Value::Number(1.0), Value::Number(3.0)],
            1,
        )
        .unwrap();
        assert_eq!(with_end, Value::String("bc".to_string()));

        let to_end = string_method("abcdef", StringMethod::Slice, &[Value::Number(4.0)], 1).unwrap();
        assert_eq!(to_end, Value::String("ef".to_string()));
    }

    #[test]
    fn slice_supports_negative_indices() {
        let out = string_method("abcdef", StringMethod::Slice, &[Value::Number(-2.0)], 1).unwrap();
        assert_eq!(out, Value::String("ef".to_string()));
    }

    #[test]
    fn to_fixed_renders_fraction_width() {
        let out = to_fixed(3.14159, &[Value::Number(2.0)], 1).unwrap();
        assert_eq!(out, Value::String("3.14".to_string()));
    }

    #[test]
    fn to_fixed_rejects_fractional_digits() {
        let err = to_fixed(1.0, &[Value::Number(1.5)], 1).unwrap_err();
        assert!(err.to_string().contains("toFixed() expects an integer"));
    }
}
