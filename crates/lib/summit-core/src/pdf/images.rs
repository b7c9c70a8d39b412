//! Downsampling and JPEG re-encoding of embedded raster images.

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use summit_model::defaults::{IMAGE_MAX_DIMENSION, JPEG_QUALITY};
use tracing::debug;

use super::{filters, name, number, resolve};

/// Decoded sample buffers above this size are never materialized.
const MAX_IMAGE_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Longest edge, in pixels, kept after downsampling.
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_dimension: IMAGE_MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl ImageOptions {
    #[must_use]
    pub const fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub const fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    const fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }

    const fn color_space(self) -> &'static [u8] {
        match self {
            Self::Gray => b"DeviceGray",
            Self::Rgb => b"DeviceRGB",
        }
    }
}

struct Replacement {
    id: ObjectId,
    width: u32,
    height: u32,
    channels: Channels,
    jpeg: Vec<u8>,
}

/// Re-encodes eligible images in place and returns how many were replaced.
///
/// Eligible images are 8-bit `DeviceRGB` or `DeviceGray` samples stored raw,
/// Flate-compressed without a predictor, or as JPEG. An image is replaced
/// only when the new encoding is smaller than the stored one.
#[must_use]
pub fn recompress_images(doc: &mut Document, options: &ImageOptions) -> usize {
    let replacements: Vec<Replacement> = doc
        .objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) if is_image(doc, stream) => {
                recompress_one(doc, *id, stream, options)
            }
            _ => None,
        })
        .collect();

    let mut replaced = 0;
    for replacement in replacements {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&replacement.id) else {
            continue;
        };
        stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        stream.dict.remove(b"DecodeParms");
        stream.dict.set("Width", Object::Integer(i64::from(replacement.width)));
        stream.dict.set("Height", Object::Integer(i64::from(replacement.height)));
        stream.dict.set(
            "ColorSpace",
            Object::Name(replacement.channels.color_space().to_vec()),
        );
        stream.dict.set("BitsPerComponent", Object::Integer(8));
        stream.set_content(replacement.jpeg);
        stream.allows_compression = false;
        replaced += 1;
    }
    replaced
}

fn is_image(doc: &Document, stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|value| name(resolve(doc, value)))
        == Some(b"Image".as_slice())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn recompress_one(
    doc: &Document,
    id: ObjectId,
    stream: &Stream,
    options: &ImageOptions,
) -> Option<Replacement> {
    let dict = &stream.dict;
    let flag = |key: &[u8]| {
        matches!(
            dict.get(key).map(|value| resolve(doc, value)),
            Ok(Object::Boolean(true))
        )
    };
    if flag(b"ImageMask") || dict.has(b"Decode") {
        return None;
    }

    let integer = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|value| number(resolve(doc, value)))
    };
    let width = integer(b"Width")?;
    let height = integer(b"Height")?;
    if width < 1.0 || height < 1.0 {
        return None;
    }
    let (width, height) = (width as u32, height as u32);

    let channels = match dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|value| name(resolve(doc, value)))?
    {
        b"DeviceRGB" => Channels::Rgb,
        b"DeviceGray" => Channels::Gray,
        _ => return None,
    };

    let expected = usize::try_from(width)
        .ok()
        .and_then(|width| width.checked_mul(usize::try_from(height).ok()?))
        .and_then(|pixels| pixels.checked_mul(channels.count()))
        .filter(|size| *size <= MAX_IMAGE_BYTES);
    let Some(expected) = expected else {
        debug!(?id, width, height, "skipping oversized image");
        return None;
    };

    let chain = filters(doc, stream);
    let is_jpeg = chain.as_slice() == [b"DCTDecode".to_vec()];
    if !is_jpeg && integer(b"BitsPerComponent") != Some(8.0) {
        return None;
    }

    let samples = match chain.as_slice() {
        [] => stream.content.clone(),
        [filter] if filter.as_slice() == b"FlateDecode" => {
            if has_predictor(doc, stream) {
                return None;
            }
            inflate(&stream.content, expected)?
        }
        [filter] if filter.as_slice() == b"DCTDecode" => decode_jpeg(&stream.content, channels)?,
        _ => return None,
    };

    if samples.len() != expected {
        debug!(?id, expected, actual = samples.len(), "skipping image with unexpected sample count");
        return None;
    }

    let (samples, width, height) = downsample(samples, width, height, channels, options.max_dimension)?;
    let jpeg = encode_jpeg(&samples, width, height, channels, options.jpeg_quality)?;
    if jpeg.len() >= stream.content.len() {
        return None;
    }
    debug!(
        ?id,
        width,
        height,
        before = stream.content.len(),
        after = jpeg.len(),
        "recompressed image"
    );
    Some(Replacement {
        id,
        width,
        height,
        channels,
        jpeg,
    })
}

/// Inflates at most one byte past `limit`, enough to detect oversized data.
fn inflate(data: &[u8], limit: usize) -> Option<Vec<u8>> {
    let budget = u64::try_from(limit).ok()?.saturating_add(1);
    let mut samples = Vec::new();
    ZlibDecoder::new(data)
        .take(budget)
        .read_to_end(&mut samples)
        .ok()?;
    Some(samples)
}

fn has_predictor(doc: &Document, stream: &Stream) -> bool {
    let params = match stream.dict.get(b"DecodeParms").map(|value| resolve(doc, value)) {
        Ok(Object::Dictionary(params)) => Some(params),
        Ok(Object::Array(items)) => items.first().and_then(|item| match resolve(doc, item) {
            Object::Dictionary(params) => Some(params),
            _ => None,
        }),
        _ => None,
    };
    params
        .and_then(|params| params.get(b"Predictor").ok())
        .and_then(|value| number(resolve(doc, value)))
        .is_some_and(|predictor| predictor > 1.0)
}

fn decode_jpeg(data: &[u8], channels: Channels) -> Option<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg).ok()?;
    Some(match channels {
        Channels::Rgb => decoded.to_rgb8().into_raw(),
        Channels::Gray => decoded.to_luma8().into_raw(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn downsample(
    samples: Vec<u8>,
    width: u32,
    height: u32,
    channels: Channels,
    max_dimension: u32,
) -> Option<(Vec<u8>, u32, u32)> {
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return Some((samples, width, height));
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);

    let resized = match channels {
        Channels::Rgb => {
            let source = RgbImage::from_raw(width, height, samples)?;
            imageops::resize(&source, new_width, new_height, FilterType::Triangle).into_raw()
        }
        Channels::Gray => {
            let source = GrayImage::from_raw(width, height, samples)?;
            imageops::resize(&source, new_width, new_height, FilterType::Triangle).into_raw()
        }
    };
    Some((resized, new_width, new_height))
}

fn encode_jpeg(
    samples: &[u8],
    width: u32,
    height: u32,
    channels: Channels,
    quality: u8,
) -> Option<Vec<u8>> {
    let color = match channels {
        Channels::Rgb => ColorType::Rgb8,
        Channels::Gray => ColorType::L8,
    };
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
    encoder.encode(samples, width, height, color).ok()?;
    Some(output)
}
