//! Minimal FITS container support: header cards and the pixel rectangle.
//!
//! Only what the dark library needs is implemented: single-HDU files,
//! 80-character keyword cards in 2880-byte blocks, and the primary image
//! data unit. Unknown keywords are preserved verbatim so a header can be
//! read, amended and written back without losing acquisition metadata.

pub mod pixels;

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{DarkLibError, Result};

/// FITS block size; headers and data units are padded to multiples of this.
pub const BLOCK_SIZE: usize = 2880;

/// One header record is exactly 80 bytes.
pub const CARD_SIZE: usize = 80;

/// A typed FITS keyword value.
#[derive(Clone, Debug, PartialEq)]
pub enum FitsValue {
    Str(String),
    Int(i64),
    Real(f64),
    Logical(bool),
}

impl FitsValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FitsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; real values are truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FitsValue::Int(i) => Some(*i),
            FitsValue::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FitsValue::Real(r) => Some(*r),
            FitsValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            FitsValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
enum Card {
    Value { keyword: String, value: FitsValue },
    History(String),
    Comment(String),
}

/// An ordered FITS header.
///
/// Keyword lookup is linear; headers are dozens of cards, not thousands.
#[derive(Clone, Debug, Default)]
pub struct FitsHeader {
    cards: Vec<Card>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the header of the file at `path` (data unit is not touched).
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Parse header blocks from `reader` until the END card.
    ///
    /// Consumes exactly the padded header, leaving the reader positioned at
    /// the start of the data unit.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut cards = Vec::new();
        let mut block = [0u8; BLOCK_SIZE];
        let mut first = true;
        loop {
            reader.read_exact(&mut block).map_err(|e| {
                DarkLibError::InvalidFits(format!("truncated header: {e}"))
            })?;
            if first {
                if &block[..6] != b"SIMPLE" {
                    return Err(DarkLibError::InvalidFits(
                        "missing SIMPLE keyword".into(),
                    ));
                }
                first = false;
            }
            for record in block.chunks_exact(CARD_SIZE) {
                let text = String::from_utf8_lossy(record);
                let keyword = text[..8].trim_end();
                if keyword == "END" {
                    return Ok(Self { cards });
                }
                match keyword {
                    "" => continue,
                    "HISTORY" => cards.push(Card::History(text[8..].trim().to_string())),
                    "COMMENT" => cards.push(Card::Comment(text[8..].trim().to_string())),
                    _ => {
                        if text.len() > 10 && &text[8..10] == "= " {
                            cards.push(Card::Value {
                                keyword: keyword.to_string(),
                                value: parse_value(&text[10..]),
                            });
                        }
                        // Keyword without a value indicator: ignored.
                    }
                }
            }
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&FitsValue> {
        self.cards.iter().find_map(|c| match c {
            Card::Value { keyword: k, value } if k.eq_ignore_ascii_case(keyword) => Some(value),
            _ => None,
        })
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(|v| v.as_str())
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(|v| v.as_int())
    }

    pub fn get_real(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(|v| v.as_real())
    }

    pub fn get_logical(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(|v| v.as_logical())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Set a keyword, replacing the first existing card with that keyword.
    pub fn set(&mut self, keyword: &str, value: FitsValue) {
        let keyword = keyword.to_ascii_uppercase();
        for card in &mut self.cards {
            if let Card::Value { keyword: k, value: v } = card {
                if *k == keyword {
                    *v = value;
                    return;
                }
            }
        }
        self.cards.push(Card::Value { keyword, value });
    }

    pub fn set_str(&mut self, keyword: &str, value: &str) {
        self.set(keyword, FitsValue::Str(value.to_string()));
    }

    pub fn set_int(&mut self, keyword: &str, value: i64) {
        self.set(keyword, FitsValue::Int(value));
    }

    pub fn set_real(&mut self, keyword: &str, value: f64) {
        self.set(keyword, FitsValue::Real(value));
    }

    pub fn set_logical(&mut self, keyword: &str, value: bool) {
        self.set(keyword, FitsValue::Logical(value));
    }

    /// Append a HISTORY card.
    pub fn push_history(&mut self, text: &str) {
        self.cards.push(Card::History(text.to_string()));
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().filter_map(|c| match c {
            Card::History(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Encode the header as FITS bytes: all cards, END, space padding to a
    /// block boundary.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_SIZE);
        for card in &self.cards {
            out.extend_from_slice(&encode_card(card));
        }
        let mut end = [b' '; CARD_SIZE];
        end[..3].copy_from_slice(b"END");
        out.extend_from_slice(&end);
        let pad = (BLOCK_SIZE - out.len() % BLOCK_SIZE) % BLOCK_SIZE;
        out.resize(out.len() + pad, b' ');
        out
    }
}

/// Replace the header of the FITS file at `path`, keeping its data unit.
///
/// The whole file is rewritten because the new header may occupy a
/// different number of blocks than the old one. Callers operate on
/// not-yet-published temporaries, so a plain overwrite is safe here.
pub fn rewrite_header(path: &Path, header: &FitsHeader) -> Result<()> {
    let bytes = fs::read(path)?;
    let data_start = header_byte_len(&bytes)?;
    let mut out = header.encode();
    out.extend_from_slice(&bytes[data_start..]);
    fs::write(path, out)?;
    Ok(())
}

/// Byte length of the (padded) header region of raw FITS bytes.
fn header_byte_len(bytes: &[u8]) -> Result<usize> {
    let mut offset = 0;
    while offset + CARD_SIZE <= bytes.len() {
        let keyword = &bytes[offset..offset + 8];
        if keyword.starts_with(b"END") && keyword[3..].iter().all(|&b| b == b' ') {
            let end = offset + CARD_SIZE;
            return Ok(end.div_ceil(BLOCK_SIZE) * BLOCK_SIZE);
        }
        offset += CARD_SIZE;
    }
    Err(DarkLibError::InvalidFits("header has no END card".into()))
}

fn parse_value(text: &str) -> FitsValue {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted string; '' escapes a quote. Trailing blanks inside the
        // quotes are not significant.
        let mut s = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    s.push('\'');
                } else {
                    break;
                }
            } else {
                s.push(c);
            }
        }
        return FitsValue::Str(s.trim_end().to_string());
    }
    // Strip an inline comment.
    let value = match text.find('/') {
        Some(idx) => text[..idx].trim(),
        None => text,
    };
    match value {
        "T" => return FitsValue::Logical(true),
        "F" => return FitsValue::Logical(false),
        _ => {}
    }
    if let Ok(i) = value.parse::<i64>() {
        return FitsValue::Int(i);
    }
    if let Ok(r) = value.replace(['D', 'd'], "E").parse::<f64>() {
        return FitsValue::Real(r);
    }
    FitsValue::Str(value.to_string())
}

fn encode_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut record = [b' '; CARD_SIZE];
    match card {
        Card::History(text) => {
            record[..7].copy_from_slice(b"HISTORY");
            write_text(&mut record, 8, text);
        }
        Card::Comment(text) => {
            record[..7].copy_from_slice(b"COMMENT");
            write_text(&mut record, 8, text);
        }
        Card::Value { keyword, value } => {
            let k = keyword.as_bytes();
            let len = k.len().min(8);
            record[..len].copy_from_slice(&k[..len]);
            record[8] = b'=';
            let rendered = match value {
                FitsValue::Str(s) => format!("'{}'", s.replace('\'', "''")),
                FitsValue::Int(i) => i.to_string(),
                FitsValue::Real(r) => format!("{r}"),
                FitsValue::Logical(true) => "T".to_string(),
                FitsValue::Logical(false) => "F".to_string(),
            };
            // Strings are left-justified from column 11, fixed-format
            // numbers and logicals right-justified to column 30.
            let start = if matches!(value, FitsValue::Str(_)) {
                10
            } else {
                30usize.saturating_sub(rendered.len())
            };
            write_text(&mut record, start, &rendered);
        }
    }
    record
}

fn write_text(record: &mut [u8; CARD_SIZE], start: usize, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(CARD_SIZE - start);
    record[start..start + len].copy_from_slice(&bytes[..len]);
}
