use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Active,
    Deleted,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Active => "active",
            PhotoStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PhotoStatus::Active),
            "deleted" => Some(PhotoStatus::Deleted),
            _ => None,
        }
    }
}

/// Descriptive fields a caller may set on a photo.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub caption: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub taken_at: Option<NaiveDateTime>,
    pub device: Option<String>,
    pub settings: Option<String>,
}

impl PhotoMetadata {
    /// Fill every empty field from `fallback`. Coordinates move as a pair:
    /// the fallback pair is only used when neither is set, so a half pair
    /// survives to validation.
    pub fn or(self, fallback: PhotoMetadata) -> PhotoMetadata {
        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (None, None) => (fallback.latitude, fallback.longitude),
            given => given,
        };
        PhotoMetadata {
            caption: self.caption.or(fallback.caption),
            location: self.location.or(fallback.location),
            latitude,
            longitude,
            taken_at: self.taken_at.or(fallback.taken_at),
            device: self.device.or(fallback.device),
            settings: self.settings.or(fallback.settings),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Photo {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub trash_path: Option<String>,
    pub status: PhotoStatus,
    pub mime: String,
    pub size_bytes: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    #[serde(flatten)]
    pub metadata: PhotoMetadata,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Photo {
    pub fn is_active(&self) -> bool {
        self.status == PhotoStatus::Active
    }
}

/// Row shape used by the gallery list.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PhotoSummary {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub caption: Option<String>,
    pub location: Option<String>,
    pub taken_at: Option<NaiveDateTime>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Photo> for PhotoSummary {
    fn from(p: &Photo) -> Self {
        PhotoSummary {
            id: p.id.clone(),
            filename: p.filename.clone(),
            url: media_url(&p.path),
            caption: p.metadata.caption.clone(),
            location: p.metadata.location.clone(),
            taken_at: p.metadata.taken_at,
            width: p.width,
            height: p.height,
            uploaded_at: p.uploaded_at,
            deleted_at: p.deleted_at,
        }
    }
}

/// Full record as returned by the detail endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PhotoDetail {
    #[serde(flatten)]
    pub photo: Photo,
    pub url: String,
    pub size_human: String,
}

impl From<Photo> for PhotoDetail {
    fn from(photo: Photo) -> Self {
        let url = media_url(&photo.path);
        let size_human = crate::utils::path::human_size(photo.size_bytes);
        PhotoDetail { photo, url, size_human }
    }
}

/// Count and size of active photos uploaded in one year or month.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArchiveBucket {
    pub period: u32,
    pub count: i64,
    pub size_bytes: i64,
    pub size_human: String,
}

pub fn media_url(path: &str) -> String {
    format!("/media/{}", path)
}

/// Partial metadata update. A missing key leaves the field alone, `null`
/// clears it and a value replaces it.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PhotoPatch {
    #[serde(default, deserialize_with = "present")]
    pub caption: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub taken_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub device: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub settings: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PhotoPatch {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.location.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.taken_at.is_none()
            && self.device.is_none()
            && self.settings.is_none()
    }

    /// Apply onto `current`, validating the result.
    pub fn apply(self, current: &PhotoMetadata) -> Result<PhotoMetadata, String> {
        let mut next = current.clone();
        if let Some(v) = self.caption {
            next.caption = normalize_text(v);
        }
        if let Some(v) = self.location {
            next.location = normalize_text(v);
        }
        if let Some(v) = self.latitude {
            next.latitude = v;
        }
        if let Some(v) = self.longitude {
            next.longitude = v;
        }
        if let Some(v) = self.taken_at {
            next.taken_at = match normalize_text(v) {
                Some(s) => Some(parse_taken_at(&s)?),
                None => None,
            };
        }
        if let Some(v) = self.device {
            next.device = normalize_text(v);
        }
        if let Some(v) = self.settings {
            next.settings = normalize_text(v);
        }
        validate_metadata(&next)?;
        Ok(next)
    }
}

pub const MAX_CAPTION_CHARS: usize = 2000;
pub const MAX_FIELD_CHARS: usize = 255;

/// Trim, and treat blank text as absent.
pub fn normalize_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn validate_metadata(m: &PhotoMetadata) -> Result<(), String> {
    if let Some(c) = &m.caption {
        if c.chars().count() > MAX_CAPTION_CHARS {
            return Err(format!("caption exceeds {} characters", MAX_CAPTION_CHARS));
        }
    }
    for (name, value) in [("location", &m.location), ("device", &m.device), ("settings", &m.settings)] {
        if let Some(v) = value {
            if v.chars().count() > MAX_FIELD_CHARS {
                return Err(format!("{} exceeds {} characters", name, MAX_FIELD_CHARS));
            }
        }
    }
    match (m.latitude, m.longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err("latitude must be between -90 and 90".to_string());
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err("longitude must be between -180 and 180".to_string());
            }
        }
        (None, None) => {}
        _ => return Err("latitude and longitude must be given together".to_string()),
    }
    Ok(())
}

/// Accepts ISO-8601 date-times with or without seconds, the EXIF
/// `YYYY:MM:DD HH:MM:SS` form, and bare dates (midnight).
pub fn parse_taken_at(s: &str) -> Result<NaiveDateTime, String> {
    const FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y:%m:%d %H:%M:%S",
    ];
    let s = s.trim();
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(format!("invalid taken_at: {:?}", s))
}
