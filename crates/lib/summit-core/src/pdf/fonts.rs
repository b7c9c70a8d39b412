//! Font decoding data needed to turn shown strings into text and widths.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::{ToUnicodeMap, split_codes};
use super::encoding::decode_win_ansi_byte;
use super::{number, resolve, resolve_dict, stream_data};

const SIMPLE_DEFAULT_WIDTH: f32 = 500.0;
const CID_DEFAULT_WIDTH: f32 = 1000.0;

/// Decoding and metric data for one font resource.
#[derive(Debug, Clone)]
pub struct FontInfo {
    code_len: usize,
    composite: bool,
    to_unicode: Option<ToUnicodeMap>,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            code_len: 1,
            composite: false,
            to_unicode: None,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: SIMPLE_DEFAULT_WIDTH,
        }
    }
}

impl FontInfo {
    /// Reads a font dictionary. Missing or broken entries fall back to defaults.
    #[must_use]
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let composite = font
            .get(b"Subtype")
            .ok()
            .and_then(|value| super::name(resolve(doc, value)))
            == Some(b"Type0".as_slice());

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .map(|value| resolve(doc, value))
            .and_then(|value| match value {
                Object::Stream(stream) => stream_data(stream).ok(),
                _ => None,
            })
            .map(|data| ToUnicodeMap::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        let code_len = if composite {
            2
        } else {
            to_unicode.as_ref().map_or(1, ToUnicodeMap::code_len)
        };

        let mut info = Self {
            code_len,
            composite,
            to_unicode,
            ..Self::default()
        };

        if composite {
            info.default_width = CID_DEFAULT_WIDTH;
            if let Some(descendant) = first_descendant(doc, font) {
                info.read_cid_widths(doc, descendant);
            }
        } else {
            info.read_simple_widths(doc, font);
        }
        info
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn read_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|value| number(resolve(doc, value)))
            .map_or(0, |value| value.max(0.0) as u32);
        if let Ok(Object::Array(widths)) = font.get(b"Widths").map(|value| resolve(doc, value)) {
            self.widths = widths
                .iter()
                .map(|width| number(resolve(doc, width)).unwrap_or(0.0))
                .collect();
        }
        let missing = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|value| resolve_dict(doc, value))
            .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
            .and_then(|value| number(resolve(doc, value)));
        if let Some(missing) = missing.filter(|value| *value > 0.0) {
            self.default_width = missing;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn read_cid_widths(&mut self, doc: &Document, descendant: &Dictionary) {
        if let Some(default_width) = descendant
            .get(b"DW")
            .ok()
            .and_then(|value| number(resolve(doc, value)))
        {
            self.default_width = default_width;
        }
        let Ok(Object::Array(entries)) = descendant.get(b"W").map(|value| resolve(doc, value))
        else {
            return;
        };

        let mut index = 0;
        while index < entries.len() {
            let Some(first) = number(resolve(doc, &entries[index])) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match entries.get(index + 1).map(|value| resolve(doc, value)) {
                Some(Object::Array(widths)) => {
                    for (offset, width) in widths.iter().enumerate() {
                        let Some(code) = u32::try_from(offset)
                            .ok()
                            .and_then(|offset| first.checked_add(offset))
                        else {
                            break;
                        };
                        if let Some(width) = number(resolve(doc, width)) {
                            self.cid_widths.insert(code, width);
                        }
                    }
                    index += 2;
                }
                Some(last) => {
                    let (Some(last), Some(width)) = (
                        number(last),
                        entries.get(index + 2).and_then(|value| number(resolve(doc, value))),
                    ) else {
                        break;
                    };
                    let last = last.max(0.0) as u32;
                    if last >= first && last - first < 0x1_0000 {
                        for code in first..=last {
                            self.cid_widths.insert(code, width);
                        }
                    }
                    index += 3;
                }
                None => break,
            }
        }
    }

    #[must_use]
    pub const fn code_len(&self) -> usize {
        self.code_len
    }

    /// Decodes a shown string into text and the character codes it contains.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> (String, Vec<u32>) {
        let codes = split_codes(bytes, self.code_len);
        let mut text = String::new();
        for code in &codes {
            if let Some(mapped) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(*code)) {
                text.push_str(mapped);
            } else if !self.composite {
                if let Some(ch) = u8::try_from(*code).ok().and_then(decode_win_ansi_byte) {
                    text.push(ch);
                }
            }
        }
        (text, codes)
    }

    /// Glyph width in thousandths of text space units.
    #[must_use]
    pub fn width(&self, code: u32) -> f32 {
        if self.composite {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|offset| self.widths.get(offset as usize))
            .copied()
            .filter(|width| *width > 0.0)
            .unwrap_or(self.default_width)
    }

    /// True when `code` is the single-byte space that word spacing applies to.
    #[must_use]
    pub const fn is_word_space(&self, code: u32) -> bool {
        self.code_len == 1 && code == 32
    }
}

fn first_descendant<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    match font.get(b"DescendantFonts").ok().map(|value| resolve(doc, value))? {
        Object::Array(items) => items.first().and_then(|item| resolve_dict(doc, item)),
        other => resolve_dict(doc, other),
    }
}

/// Collects the fonts named in a resource dictionary.
#[must_use]
pub fn fonts_in(doc: &Document, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = resources
        .and_then(|resources| resources.get(b"Font").ok())
        .and_then(|value| resolve_dict(doc, value))
    else {
        return fonts;
    };
    for (key, value) in font_dict.iter() {
        if let Some(font) = resolve_dict(doc, value) {
            fonts.insert(key.clone(), FontInfo::from_dict(doc, font));
        }
    }
    fonts
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    #[test]
    fn simple_font_uses_widths_array() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => Object::Integer(65),
            "Widths" => vec![Object::Integer(667), Object::Integer(667)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert!((info.width(65) - 667.0).abs() < f32::EPSILON);
        assert!((info.width(90) - SIMPLE_DEFAULT_WIDTH).abs() < f32::EPSILON);
        let (text, codes) = info.decode(b"AB");
        assert_eq!(text, "AB");
        assert_eq!(codes, vec![65, 66]);
        assert!(info.is_word_space(32));
    }

    #[test]
    fn composite_font_reads_cid_widths_and_cmap() {
        let mut doc = Document::with_version("1.5");
        let cmap = b"1 begincodespacerange <0000> <FFFF> endcodespacerange
2 beginbfchar <0001> <0048> <0002> <0069> endbfchar"
            .to_vec();
        let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap));
        let descendant = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => Object::Integer(900),
            "W" => vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(722), Object::Integer(222)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(500),
            ],
        };
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "ToUnicode" => cmap_id,
            "DescendantFonts" => vec![Object::Dictionary(descendant)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.code_len(), 2);
        let (text, codes) = info.decode(&[0x00, 0x01, 0x00, 0x02]);
        assert_eq!(text, "Hi");
        assert_eq!(codes, vec![1, 2]);
        assert!((info.width(2) - 222.0).abs() < f32::EPSILON);
        assert!((info.width(11) - 500.0).abs() < f32::EPSILON);
        assert!((info.width(40) - 900.0).abs() < f32::EPSILON);
        assert!(!info.is_word_space(32));
    }

    #[test]
    fn cid_widths_stop_at_the_last_code() {
        let doc = Document::with_version("1.5");
        let descendant = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "W" => vec![
                Object::Integer(i64::from(u32::MAX)),
                Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
            ],
        };
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Dictionary(descendant)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert!((info.width(u32::MAX) - 500.0).abs() < f32::EPSILON);
        assert_eq!(info.cid_widths.len(), 1);
    }
}
