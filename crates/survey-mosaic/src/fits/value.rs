//! Header value parsing and fixed-format serialization.

use std::fmt;

/// Width of the value field (card bytes 10..80).
pub const VALUE_FIELD_LEN: usize = 70;

/// Longest string payload that still fits between the quotes of one card.
pub const MAX_STRING_LEN: usize = 68;

/// A typed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
}

impl Value {
    /// Numeric view of the value; integers are promoted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

// ── Parsing ──

/// Parse the value field of a card (everything after `= `).
///
/// Returns the value, if one could be recognized, and the trailing comment.
/// Legacy writers often omit the space after the `/` separator, so ` /` alone
/// starts a comment.
pub fn parse_value(field: &str) -> (Option<Value>, Option<String>) {
    let trimmed = field.trim_start();
    if trimmed.starts_with('\'') {
        let (text, rest) = parse_quoted(trimmed);
        return (Some(Value::String(text)), comment_after(rest));
    }

    let (value_text, comment) = match field.find('/') {
        Some(idx) => (&field[..idx], comment_text(&field[idx + 1..])),
        None => (field, None),
    };
    (parse_scalar(value_text.trim()), comment)
}

/// Read a quoted string, returning its content and the remainder after the
/// closing quote. A doubled quote is a literal `'`; an unterminated string is
/// accepted as-is.
fn parse_quoted(text: &str) -> (String, &str) {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if let Some(&(_, '\'')) = chars.peek() {
                out.push('\'');
                chars.next();
                continue;
            }
            return (out.trim_end().to_string(), &text[i + 1..]);
        }
        out.push(c);
    }
    (out.trim_end().to_string(), "")
}

fn comment_after(rest: &str) -> Option<String> {
    rest.find('/').and_then(|idx| comment_text(&rest[idx + 1..]))
}

fn comment_text(text: &str) -> Option<String> {
    let text = text.strip_prefix(' ').unwrap_or(text).trim_end();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_scalar(text: &str) -> Option<Value> {
    match text {
        "" => None,
        "T" => Some(Value::Logical(true)),
        "F" => Some(Value::Logical(false)),
        _ => {
            let looks_float = text.contains(['.', 'E', 'e', 'D', 'd']);
            if !looks_float {
                if let Ok(n) = text.parse::<i64>() {
                    return Some(Value::Integer(n));
                }
            }
            text.replace(['D', 'd'], "E").parse::<f64>().ok().map(Value::Float)
        }
    }
}

// ── Formatting ──

/// Serialize a value into the 70-byte value field.
///
/// Numbers and logicals are right-justified to column 30 of the card; strings
/// start with a quote in column 11 and are padded to at least 8 characters.
pub fn format_value(value: &Value) -> [u8; VALUE_FIELD_LEN] {
    let mut buf = [b' '; VALUE_FIELD_LEN];
    match value {
        Value::Logical(b) => buf[19] = if *b { b'T' } else { b'F' },
        Value::Integer(n) => right_justify(n.to_string().as_bytes(), &mut buf[..20]),
        Value::Float(x) => right_justify(format_float(*x).as_bytes(), &mut buf[..20]),
        Value::String(s) => write_quoted(s, &mut buf),
    }
    buf
}

fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    dest[start..].copy_from_slice(&src[..len]);
}

/// Shortest round-trip representation that still reads back as a float and
/// fits in 20 columns.
pub fn format_float(x: f64) -> String {
    let mut s = format!("{x:?}").replace('e', "E");
    if !s.contains(['.', 'E']) && x.is_finite() {
        s.push_str(".0");
    }
    let mut precision = 15usize;
    while s.len() > 20 && precision > 0 {
        s = format!("{x:.precision$E}");
        precision -= 1;
    }
    s
}

fn write_quoted(s: &str, buf: &mut [u8; VALUE_FIELD_LEN]) {
    buf[0] = b'\'';
    let mut pos = 1;
    for b in s.bytes() {
        let needed = if b == b'\'' { 2 } else { 1 };
        if pos + needed > VALUE_FIELD_LEN - 1 {
            break;
        }
        buf[pos] = b;
        if b == b'\'' {
            buf[pos + 1] = b'\'';
        }
        pos += needed;
    }
    pos = pos.max(9);
    buf[pos] = b'\'';
}
