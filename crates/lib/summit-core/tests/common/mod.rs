#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};

pub struct Line {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

pub fn line(x: f32, y: f32, text: &str) -> Line {
    Line {
        x,
        y,
        text: text.to_string(),
    }
}

pub fn long_text(words: usize, seed: &str) -> String {
    (0..words)
        .map(|index| format!("{seed}{index}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    build_pdf_with_image(pages, None)
}

/// Builds a Letter-sized document in Helvetica. When `image` is set, every
/// page also paints an uncompressed RGB gradient of that size.
pub fn build_pdf_with_image(pages: &[Vec<Line>], image: Option<(u32, u32)>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    if let Some((width, height)) = image {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(width)),
                "Height" => Object::Integer(i64::from(height)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            gradient(width, height),
        ));
        resources.set("XObject", dictionary! { "Im1" => image_id });
    }
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        if image.is_some() {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(200),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(200),
                        Object::Integer(72),
                        Object::Integer(72),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                Operation::new("Q", vec![]),
            ]);
        }
        for line in lines {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Real(line.x.into()), Object::Real(line.y.into())]),
                Operation::new(
                    "Tj",
                    vec![Object::String(line.text.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations }
            .encode()
            .expect("content should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).expect("page count fits");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("document should save");
    bytes
}

pub fn page_dictionary(doc: &Document, page: u32) -> &Dictionary {
    let page_id = doc
        .get_pages()
        .get(&page)
        .copied()
        .expect("page should exist");
    doc.get_dictionary(page_id).expect("page should be a dictionary")
}

pub fn box_width(page: &Dictionary, key: &[u8]) -> f32 {
    let values = page
        .get(key)
        .and_then(Object::as_array)
        .expect("box should be an array");
    let number = |object: &Object| object.as_float().expect("box entries should be numbers");
    number(&values[2]) - number(&values[0])
}

#[allow(clippy::cast_possible_truncation)]
fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut samples = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            samples.push((x * 255 / width) as u8);
            samples.push((y * 255 / height) as u8);
            samples.push(((x + y) * 127 / (width + height)) as u8);
        }
    }
    samples
}
