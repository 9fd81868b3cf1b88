use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageOutputFormat, RgbImage};

fn encode(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageOutputFormat::Jpeg(80))
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageOutputFormat::Png)
}

pub fn gif(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageOutputFormat::Gif)
}

fn ascii(tag: Tag, s: &str) -> Field {
    Field { tag, ifd_num: In::PRIMARY, value: Value::Ascii(vec![s.as_bytes().to_vec()]) }
}

fn rationals(tag: Tag, vals: &[(u32, u32)]) -> Field {
    let value = Value::Rational(vals.iter().map(|&(num, denom)| Rational { num, denom }).collect());
    Field { tag, ifd_num: In::PRIMARY, value }
}

/// 16x12 JPEG shot on a "Fujifilm X-T4" at 2023-05-06 07:08:09 in the
/// southern/western hemisphere (-33.5, -70.25).
pub fn jpeg_with_exif() -> Vec<u8> {
    let fields = vec![
        ascii(Tag::Make, "FUJIFILM"),
        ascii(Tag::Model, "X-T4"),
        ascii(Tag::DateTimeOriginal, "2023:05:06 07:08:09"),
        rationals(Tag::FNumber, &[(56, 10)]),
        rationals(Tag::ExposureTime, &[(1, 500)]),
        Field { tag: Tag::PhotographicSensitivity, ifd_num: In::PRIMARY, value: Value::Short(vec![200]) },
        rationals(Tag::FocalLength, &[(23, 1)]),
        ascii(Tag::GPSLatitudeRef, "S"),
        rationals(Tag::GPSLatitude, &[(33, 1), (30, 1), (0, 1)]),
        ascii(Tag::GPSLongitudeRef, "W"),
        rationals(Tag::GPSLongitude, &[(70, 1), (15, 1), (0, 1)]),
    ];
    let mut writer = Writer::new();
    for f in &fields {
        writer.push_field(f);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let jpeg = jpeg(16, 12);
    let seg_len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + seg_len as usize + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Multipart form with the image under `image` plus text fields.
pub fn form(filename: &str, bytes: Vec<u8>, fields: &[(&str, &str)]) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
    let mut form = reqwest::multipart::Form::new().part("image", part);
    for (k, v) in fields {
        form = form.text(k.to_string(), v.to_string());
    }
    form
}
