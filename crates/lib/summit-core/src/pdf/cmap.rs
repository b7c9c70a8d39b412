//! Parser for `/ToUnicode` character maps.
//!
//! Only the parts needed for text extraction are understood: the code space
//! width, `bfchar` pairs, and `bfrange` entries in both the incrementing and
//! array forms. Everything else in the CMap program is skipped.

use std::collections::HashMap;

/// Upper bound on codes expanded from a single `bfrange` entry.
const MAX_RANGE_SPAN: u32 = 0x1_0000;
/// Upper bound on entries held by one map, across all ranges.
const MAX_MAP_ENTRIES: usize = 1 << 18;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

/// Code-to-text mapping read from a `/ToUnicode` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToUnicodeMap {
    code_len: usize,
    map: HashMap<u32, String>,
}

impl ToUnicodeMap {
    /// Parses CMap program text. Unknown constructs are ignored.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut code_len = 0;
        let mut map = HashMap::new();
        let mut index = 0;

        while index < tokens.len() {
            let Token::Word(word) = &tokens[index] else {
                index += 1;
                continue;
            };
            index += 1;
            match word.as_str() {
                "begincodespacerange" => {
                    while let Some(Token::Hex(low)) = tokens.get(index) {
                        if code_len == 0 {
                            code_len = low.len();
                        }
                        index += 2;
                    }
                }
                "beginbfchar" => {
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(index), tokens.get(index + 1))
                    {
                        if code_len == 0 {
                            code_len = src.len();
                        }
                        insert_capped(&mut map, code_value(src), utf16_text(dst));
                        index += 2;
                    }
                }
                "beginbfrange" => {
                    while let (Some(Token::Hex(low)), Some(Token::Hex(high))) =
                        (tokens.get(index), tokens.get(index + 1))
                    {
                        if code_len == 0 {
                            code_len = low.len();
                        }
                        let low_value = code_value(low);
                        let high_value = code_value(high);
                        index += 2;
                        match tokens.get(index) {
                            Some(Token::Hex(dst)) => {
                                insert_incrementing(&mut map, low_value, high_value, dst);
                                index += 1;
                            }
                            Some(Token::ArrayStart) => {
                                index += 1;
                                let mut code = low_value;
                                while let Some(Token::Hex(dst)) = tokens.get(index) {
                                    if code <= high_value {
                                        insert_capped(&mut map, code, utf16_text(dst));
                                    }
                                    code = code.saturating_add(1);
                                    index += 1;
                                }
                                if matches!(tokens.get(index), Some(Token::ArrayEnd)) {
                                    index += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => {}
            }
        }

        Self {
            code_len: code_len.clamp(1, 4),
            map,
        }
    }

    #[must_use]
    pub const fn code_len(&self) -> usize {
        self.code_len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }
}

fn insert_capped(map: &mut HashMap<u32, String>, code: u32, text: String) -> bool {
    if map.len() >= MAX_MAP_ENTRIES && !map.contains_key(&code) {
        return false;
    }
    map.insert(code, text);
    true
}

#[allow(clippy::cast_possible_truncation)]
fn insert_incrementing(map: &mut HashMap<u32, String>, low: u32, high: u32, dst: &[u8]) {
    if high < low || high - low >= MAX_RANGE_SPAN {
        return;
    }
    let mut units = utf16_units(dst);
    let Some(last) = units.pop() else {
        return;
    };
    for offset in 0..=(high - low) {
        let mut shifted = units.clone();
        shifted.push(last.wrapping_add(offset as u16));
        if !insert_capped(map, low + offset, String::from_utf16_lossy(&shifted)) {
            return;
        }
    }
}

/// Splits a byte string into codes of `code_len` bytes, big-endian.
#[must_use]
pub fn split_codes(bytes: &[u8], code_len: usize) -> Vec<u32> {
    bytes.chunks(code_len.max(1)).map(code_value).collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0_u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [high, low] => u16::from_be_bytes([*high, *low]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < data.len() {
        let byte = data[index];
        match byte {
            b'%' => {
                while index < data.len() && data[index] != b'\n' && data[index] != b'\r' {
                    index += 1;
                }
            }
            b'<' if data.get(index + 1) == Some(&b'<') => index += 2,
            b'>' if data.get(index + 1) == Some(&b'>') => index += 2,
            b'<' => {
                let start = index + 1;
                let end = data[start..]
                    .iter()
                    .position(|candidate| *candidate == b'>')
                    .map_or(data.len(), |offset| start + offset);
                tokens.push(Token::Hex(decode_hex(&data[start..end])));
                index = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                index += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                index += 1;
            }
            b'(' => index = skip_literal(data, index),
            _ if byte.is_ascii_whitespace() => index += 1,
            _ => {
                let start = index;
                while index < data.len() && !is_delimiter(data[index]) {
                    index += 1;
                }
                if index == start {
                    index += 1;
                } else {
                    let word = String::from_utf8_lossy(&data[start..index]).into_owned();
                    tokens.push(Token::Word(word));
                }
            }
        }
    }
    tokens
}

fn skip_literal(data: &[u8], mut index: usize) -> usize {
    let mut depth = 0_usize;
    while index < data.len() {
        match data[index] {
            b'\\' => index += 1,
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index + 1;
                }
            }
            _ => {}
        }
        index += 1;
    }
    index
}

const fn is_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace()
        || matches!(byte, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'%' | b'{' | b'}')
}

fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|digit| char::from(*digit).to_digit(16))
        .filter_map(|value| u8::try_from(value).ok())
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [high, low] => (*high << 4) | *low,
            [high] => *high << 4,
            _ => 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0024> <0041>
endbfchar
2 beginbfrange
<0044> <0046> <0061>
<0050> <0051> [<00660069> <00DF>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn parses_code_space_and_pairs() {
        let cmap = ToUnicodeMap::parse(SAMPLE);
        assert_eq!(cmap.code_len(), 2);
        assert_eq!(cmap.lookup(0x0003), Some(" "));
        assert_eq!(cmap.lookup(0x0024), Some("A"));
    }

    #[test]
    fn expands_incrementing_and_array_ranges() {
        let cmap = ToUnicodeMap::parse(SAMPLE);
        assert_eq!(cmap.lookup(0x0044), Some("a"));
        assert_eq!(cmap.lookup(0x0046), Some("c"));
        assert_eq!(cmap.lookup(0x0047), None);
        assert_eq!(cmap.lookup(0x0050), Some("fi"));
        assert_eq!(cmap.lookup(0x0051), Some("\u{DF}"));
    }

    #[test]
    fn single_byte_maps_default_to_one_byte_codes() {
        let cmap = ToUnicodeMap::parse(b"1 beginbfchar <41> <005A> endbfchar");
        assert_eq!(cmap.code_len(), 1);
        assert_eq!(split_codes(b"AA", cmap.code_len()), vec![0x41, 0x41]);
        assert_eq!(cmap.lookup(0x41), Some("Z"));
    }

    #[test]
    fn garbage_yields_empty_map() {
        let cmap = ToUnicodeMap::parse(b"(unterminated <zz");
        assert!(cmap.is_empty());
        assert_eq!(cmap.code_len(), 1);
    }

    #[test]
    fn total_entries_are_capped() {
        let mut program = String::from("1 begincodespacerange <000000> <FFFFFF> endcodespacerange\n");
        program.push_str("8 beginbfrange\n");
        for block in 1..=8 {
            program.push_str(&format!("<{block:02X}0000> <{block:02X}FFFF> <0041>\n"));
        }
        program.push_str("endbfrange\n1 beginbfchar <FF0001> <0042> endbfchar");

        let cmap = ToUnicodeMap::parse(program.as_bytes());

        assert_eq!(cmap.map.len(), MAX_MAP_ENTRIES);
        assert_eq!(cmap.code_len(), 3);
        assert_eq!(cmap.lookup(0x01_0000), Some("A"));
        assert_eq!(cmap.lookup(0xFF_0001), None);
    }
}
