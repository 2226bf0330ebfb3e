//! FITS header cards, the ordered [`Header`] mapping, serialization and repair.

use log::warn;

use super::block::{pad_to_block, BLOCK_SIZE, CARD_SIZE, HEADER_PAD_BYTE};
use super::value::{format_value, parse_value, Value, MAX_STRING_LEN};
use crate::error::{Error, Result};

/// Keywords whose bytes 8..80 are free text rather than `= value`.
const COMMENTARY_KEYWORDS: [&str; 3] = ["COMMENT", "HISTORY", ""];

/// Keywords regenerated from the array when writing; never copied from metadata.
const STRUCTURAL_KEYWORDS: [&str; 7] = [
    "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "BSCALE", "BZERO", "BLANK",
];

// ── Types ──

/// One header record: keyword, optional value, optional comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: impl Into<Value>, comment: &str) -> Self {
        Card {
            keyword: keyword.to_string(),
            value: Some(value.into()),
            comment: (!comment.is_empty()).then(|| comment.to_string()),
        }
    }

    /// Returns `true` for COMMENT, HISTORY and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        COMMENTARY_KEYWORDS.contains(&self.keyword.as_str())
    }
}

/// Ordered keyword → (value, comment) mapping.
///
/// Keywords are case-insensitive and stored upper-case. Setting an existing
/// keyword replaces its card in place, so insertion order is preserved.
/// Commentary cards may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(|c| c.keyword.as_str())
    }

    fn position(&self, keyword: &str) -> Option<usize> {
        let keyword = keyword.to_ascii_uppercase();
        self.cards
            .iter()
            .position(|c| !c.is_commentary() && c.keyword == keyword)
    }

    pub fn card(&self, keyword: &str) -> Option<&Card> {
        self.position(keyword).map(|i| &self.cards[i])
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.card(keyword).and_then(|c| c.value.as_ref())
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(Value::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.position(keyword).is_some()
    }

    /// Set `keyword` to `value` with `comment`, replacing any existing card.
    pub fn set(&mut self, keyword: &str, value: impl Into<Value>, comment: &str) {
        let mut card = Card::new(keyword, value, comment);
        card.keyword = card.keyword.to_ascii_uppercase();
        self.push_card(card);
    }

    /// Set the value only, keeping the comment already attached to `keyword`.
    pub fn set_value(&mut self, keyword: &str, value: impl Into<Value>) {
        match self.position(keyword) {
            Some(i) => self.cards[i].value = Some(value.into()),
            None => self.set(keyword, value, ""),
        }
    }

    /// Append a card; a non-commentary keyword that already exists is replaced.
    pub fn push_card(&mut self, card: Card) {
        if !card.is_commentary() {
            if let Some(i) = self.position(&card.keyword) {
                self.cards[i] = card;
                return;
            }
        }
        self.cards.push(card);
    }

    /// Apply every card of `patch` on top of `self`.
    pub fn merge(&mut self, patch: Header) {
        for card in patch.cards {
            self.push_card(card);
        }
    }
}

// ── Parsing ──

fn parse_card(bytes: &[u8]) -> Result<Card> {
    let text = std::str::from_utf8(bytes)
        .ok()
        .filter(|t| t.is_ascii())
        .ok_or(Error::InvalidHeader("non-ASCII header card"))?;

    // Legacy writers emit lower-case keywords; accept them.
    let keyword = text[..8].trim_end().to_ascii_uppercase();
    let rest = &text[8..];

    if COMMENTARY_KEYWORDS.contains(&keyword.as_str()) || !rest.starts_with('=') {
        let body = rest.trim_end();
        return Ok(Card {
            keyword,
            value: None,
            comment: (!body.is_empty()).then(|| body.to_string()),
        });
    }

    let (value, comment) = parse_value(&rest[1..]);
    Ok(Card {
        keyword,
        value,
        comment,
    })
}

/// Parse header blocks up to and including the END card.
///
/// Returns the header (without END) and the number of bytes it occupied,
/// always a multiple of [`BLOCK_SIZE`].
pub fn parse_header(data: &[u8]) -> Result<(Header, usize)> {
    let mut header = Header::new();
    for (i, chunk) in data.chunks_exact(CARD_SIZE).enumerate() {
        if chunk[..8] == *b"END     " {
            let used = (i + 1) * CARD_SIZE;
            return Ok((header, used.div_ceil(BLOCK_SIZE) * BLOCK_SIZE));
        }
        let card = parse_card(chunk)?;
        if card.keyword.is_empty() && card.comment.is_none() {
            continue;
        }
        header.cards.push(card);
    }
    Err(Error::UnexpectedEof)
}

// ── Writing ──

fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    let kw = card.keyword.as_bytes();
    buf[..kw.len().min(8)].copy_from_slice(&kw[..kw.len().min(8)]);

    if card.is_commentary() {
        if let Some(text) = &card.comment {
            let len = text.len().min(CARD_SIZE - 8);
            buf[8..8 + len].copy_from_slice(&text.as_bytes()[..len]);
        }
        return buf;
    }

    buf[8] = b'=';
    let mut field = match &card.value {
        Some(v) => format_value(v),
        None => [b' '; 70],
    };
    if let Some(comment) = &card.comment {
        insert_comment(&mut field, comment);
    }
    buf[10..].copy_from_slice(&field);
    buf
}

/// Write ` / comment` after the value: after the closing quote for strings,
/// after column 30 for everything else.
fn insert_comment(field: &mut [u8; 70], comment: &str) {
    let value_end = if field[0] == b'\'' {
        let mut i = 1;
        while i < field.len() {
            if field[i] == b'\'' {
                if field.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                break;
            }
            i += 1;
        }
        (i + 1).max(20)
    } else {
        20
    };

    let start = value_end + 1;
    if start + 3 >= field.len() {
        return;
    }
    field[start] = b'/';
    let text = comment.as_bytes();
    let len = text.len().min(field.len() - start - 2);
    field[start + 2..start + 2 + len].copy_from_slice(&text[..len]);
}

/// Serialize cards into complete header blocks terminated by END.
pub fn serialize_header<'a>(cards: impl IntoIterator<Item = &'a Card>) -> Vec<u8> {
    let mut buf = Vec::new();
    for card in cards {
        buf.extend_from_slice(&format_card(card));
    }
    let mut end = [b' '; CARD_SIZE];
    end[..3].copy_from_slice(b"END");
    buf.extend_from_slice(&end);
    pad_to_block(&mut buf, HEADER_PAD_BYTE);
    buf
}

// ── Verification ──

/// How header problems are handled when a file is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verify {
    /// Repair what can be repaired and log each repair as a warning.
    #[default]
    Fix,
    /// Reject the first problem.
    Exception,
}

pub fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

fn sanitize_keyword(keyword: &str) -> String {
    let upper: String = keyword
        .trim()
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            c @ ('A'..='Z' | '0'..='9' | '-' | '_') => c,
            _ => '_',
        })
        .collect();
    upper.chars().take(8).collect()
}

/// Check `header` for problems that would make the written file non-standard.
///
/// In [`Verify::Fix`] mode returns a repaired copy along with a description of
/// every repair. In [`Verify::Exception`] mode any problem is an error.
pub fn verify_header(header: &Header, mode: Verify) -> Result<(Header, Vec<String>)> {
    let mut fixed = Header::new();
    let mut repairs = Vec::new();
    let mut note = |msg: String| -> Result<()> {
        match mode {
            Verify::Fix => {
                repairs.push(msg);
                Ok(())
            }
            Verify::Exception => Err(Error::InvalidHeader("header failed verification")),
        }
    };

    for card in header.iter() {
        let mut card = card.clone();

        if !card.is_commentary() {
            let keyword = sanitize_keyword(&card.keyword);
            if keyword.is_empty() {
                return Err(Error::InvalidKeyword(card.keyword));
            }
            if keyword != card.keyword {
                note(format!("keyword {:?} rewritten as {keyword}", card.keyword))?;
                card.keyword = keyword;
            }
            if is_structural(&card.keyword) {
                note(format!("structural keyword {} dropped", card.keyword))?;
                continue;
            }
        }

        match &mut card.value {
            Some(Value::Float(x)) if !x.is_finite() => {
                note(format!("{} has non-finite value {x}; card dropped", card.keyword))?;
                continue;
            }
            Some(Value::String(s)) => {
                let clean = sanitize_text(s);
                if clean != *s {
                    note(format!("{} string has non-printable characters", card.keyword))?;
                }
                if clean.len() > MAX_STRING_LEN {
                    note(format!("{} string truncated to {MAX_STRING_LEN} characters", card.keyword))?;
                }
                *s = clean.chars().take(MAX_STRING_LEN).collect();
            }
            _ => {}
        }

        if let Some(comment) = &card.comment {
            let clean = sanitize_text(comment);
            if clean != *comment {
                note(format!("{} comment has non-printable characters", card.keyword))?;
                card.comment = Some(clean);
            }
        }

        fixed.push_card(card);
    }

    for msg in &repairs {
        warn!("header repaired: {msg}");
    }
    Ok((fixed, repairs))
}
