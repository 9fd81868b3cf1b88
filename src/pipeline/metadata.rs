//! EXIF reading for uploaded photos.
//!
//! Only the handful of fields shown on the detail page are read. Files
//! without EXIF (most PNG and GIF uploads) simply produce empty metadata.

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Rational, Tag, Value};
use std::io::Cursor;
use tracing::debug;

use crate::models::photo::PhotoMetadata;

pub fn extract(bytes: &[u8]) -> PhotoMetadata {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(error = %e, "no readable EXIF");
            return PhotoMetadata::default();
        }
    };
    let (latitude, longitude) = match (gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S'), gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')) {
        (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => (Some(lat), Some(lon)),
        _ => (None, None),
    };
    PhotoMetadata {
        caption: ascii(&exif, Tag::ImageDescription),
        location: None,
        latitude,
        longitude,
        taken_at: date_time(&exif, Tag::DateTimeOriginal).or_else(|| date_time(&exif, Tag::DateTime)),
        device: device(&exif),
        settings: settings(&exif),
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|b| String::from_utf8_lossy(b).trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn rationals(exif: &Exif, tag: Tag) -> Option<&[Rational]> {
    match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(ref v) if !v.is_empty() && v.iter().all(|r| r.denom != 0) => Some(v.as_slice()),
        _ => None,
    }
}

fn date_time(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let raw = match field.value {
        Value::Ascii(ref parts) => parts.first()?,
        _ => return None,
    };
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
}

fn device(exif: &Exif) -> Option<String> {
    let make = ascii(exif, Tag::Make);
    let model = ascii(exif, Tag::Model);
    match (make, model) {
        // Many cameras repeat the make in the model string ("Canon" + "Canon EOS R6").
        (Some(make), Some(model)) if model.to_lowercase().starts_with(&make.to_lowercase()) => Some(model),
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (make, model) => make.or(model),
    }
}

fn settings(exif: &Exif) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(f) = rationals(exif, Tag::FNumber) {
        parts.push(format!("f/{}", trim_float(f[0].to_f64())));
    }
    if let Some(t) = rationals(exif, Tag::ExposureTime) {
        parts.push(exposure(&t[0]));
    }
    if let Some(iso) = exif.get_field(Tag::PhotographicSensitivity, In::PRIMARY).and_then(|f| f.value.get_uint(0)) {
        parts.push(format!("ISO {}", iso));
    }
    if let Some(fl) = rationals(exif, Tag::FocalLength) {
        parts.push(format!("{}mm", trim_float(fl[0].to_f64())));
    }
    if parts.is_empty() { None } else { Some(parts.join(", ")) }
}

fn exposure(r: &Rational) -> String {
    if r.num == 0 {
        return "0s".to_string();
    }
    if r.num < r.denom {
        let inverse = (r.denom as f64 / r.num as f64).round();
        format!("1/{}s", inverse)
    } else {
        format!("{}s", trim_float(r.to_f64()))
    }
}

/// One decimal at most, none for whole numbers: 2.8 -> "2.8", 8.0 -> "8".
fn trim_float(v: f64) -> String {
    let rounded = (v * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

fn gps_coord(exif: &Exif, tag: Tag, ref_tag: Tag, negative: char) -> Option<f64> {
    let dms = rationals(exif, tag)?;
    let mut value = dms[0].to_f64();
    if let Some(m) = dms.get(1) {
        value += m.to_f64() / 60.0;
    }
    if let Some(s) = dms.get(2) {
        value += s.to_f64() / 3600.0;
    }
    if ascii(exif, ref_tag).map_or(false, |r| r.starts_with(negative)) {
        value = -value;
    }
    Some(value)
}
