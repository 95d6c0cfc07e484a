use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use exif::{Exif, In, Reader, Tag, Value};

use crate::item::GeoPoint;

/// What the planner needs to know about a photo besides its path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhotoMetadata {
    pub capture_time: Option<NaiveDateTime>,
    pub location: Option<GeoPoint>,
}

/// Capture time and GPS position of a file. EXIF first; the capture time
/// falls back to the modification time. Never fails.
pub fn read_metadata(path: &Path) -> PhotoMetadata {
    let exif = read_exif(path);
    let capture_time = exif
        .as_ref()
        .and_then(exif_capture_time)
        .or_else(|| modified_time(path));
    let location = exif.as_ref().and_then(exif_location);
    PhotoMetadata {
        capture_time,
        location,
    }
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    match Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => Some(exif),
        Err(e) => {
            log::debug!("no EXIF in {}: {}", path.display(), e);
            None
        }
    }
}

/// EXIF datetimes carry no timezone; they are local wall-clock time.
pub fn exif_capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| parse_exif_datetime(&field.display_value().to_string()))
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    // display_value renders dates as YYYY-MM-DD
    let cleaned = s.trim().replace('-', ":");
    NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S").ok()
}

pub fn exif_location(exif: &Exif) -> Option<GeoPoint> {
    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some(GeoPoint::new(latitude, longitude))
}

fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(ref parts) = field.value else {
        return None;
    };
    let dms: Vec<f64> = parts.iter().map(|r| r.to_f64()).collect();
    let mut decimal = dms_to_decimal(&dms)?;

    let hemisphere = exif.get_field(ref_tag, In::PRIMARY).and_then(|f| match f.value {
        Value::Ascii(ref strings) => strings.first().and_then(|s| s.first().copied()),
        _ => None,
    });
    if hemisphere.map(|h| h.to_ascii_uppercase()) == Some(negative) {
        decimal = -decimal;
    }
    Some(decimal)
}

/// Degrees, minutes, seconds to decimal degrees. Missing minutes or seconds
/// count as zero.
fn dms_to_decimal(dms: &[f64]) -> Option<f64> {
    let degrees = *dms.first()?;
    let minutes = dms.get(1).copied().unwrap_or(0.0);
    let seconds = dms.get(2).copied().unwrap_or(0.0);
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    decimal.is_finite().then_some(decimal)
}

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}
