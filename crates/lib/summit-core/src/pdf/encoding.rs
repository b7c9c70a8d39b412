//! WinAnsi (CP-1252 flavoured) text encoding used by simple fonts.

/// Code points for bytes `0x80..=0x9F`; `'\0'` marks unassigned codes.
const WIN_ANSI_HIGH: [char; 32] = [
    '\u{20AC}', '\0', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\0', '\u{017D}', '\0',
    '\0', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\0', '\u{017E}', '\u{0178}',
];

#[must_use]
pub fn decode_win_ansi_byte(byte: u8) -> Option<char> {
    match byte {
        0x80..=0x9F => {
            let ch = WIN_ANSI_HIGH[usize::from(byte - 0x80)];
            (ch != '\0').then_some(ch)
        }
        0x00..=0x1F if !matches!(byte, b'\t' | b'\n' | b'\r') => None,
        _ => Some(char::from(byte)),
    }
}

#[must_use]
pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes.iter().copied().filter_map(decode_win_ansi_byte).collect()
}

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_win_ansi_char(ch: char) -> u8 {
    match u32::from(ch) {
        0x20..=0x7E | 0xA0..=0xFF => ch as u8,
        0x09 | 0x0A | 0x0D => b' ',
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|candidate| *candidate == ch && ch != '\0')
            .map_or(b'?', |index| 0x80 + index as u8),
    }
}

/// Encodes text for a WinAnsi font; unmappable characters become `?`.
#[must_use]
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(encode_win_ansi_char).collect()
}
