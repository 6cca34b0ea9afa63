//! Image metadata: EXIF capture time, GPS, camera and dimensions, plus a
//! perceptual fingerprint.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};

use super::{MediaExtractor, MetadataError};
use crate::scanner::{PerceptualAlgorithm, PerceptualHasher};
use crate::store::MediaMetadata;

/// Extracts attributes of still images.
#[derive(Debug)]
pub struct ImageExtractor {
    perceptual: PerceptualHasher,
}

impl ImageExtractor {
    /// Create an extractor using the given fingerprint algorithm.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        Self {
            perceptual: PerceptualHasher::new(algorithm),
        }
    }
}

impl MediaExtractor for ImageExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata, MetadataError> {
        let file = File::open(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut metadata = MediaMetadata::default();

        match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(exif) => apply_exif(&exif, &mut metadata),
            Err(e) => log::debug!("No EXIF data in {}: {}", path.display(), e),
        }

        // Undecodable content leaves the EXIF fields in place
        match ::image::open(path) {
            Ok(decoded) => {
                if metadata.width.is_none() || metadata.height.is_none() {
                    metadata.width = Some(decoded.width());
                    metadata.height = Some(decoded.height());
                }
                metadata.perceptual_hash = Some(self.perceptual.fingerprint_image(&decoded));
            }
            Err(e) => log::debug!("Cannot decode {}: {}", path.display(), e),
        }

        Ok(metadata)
    }
}

fn apply_exif(exif: &Exif, metadata: &mut MediaMetadata) {
    metadata.taken_at = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .find_map(|tag| ascii_field(exif, tag).and_then(|s| parse_exif_datetime(&s)));

    if let (Some(lat), Some(lon)) = (
        gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S'),
        gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W'),
    ) {
        metadata.latitude = Some(lat);
        metadata.longitude = Some(lon);
    }

    metadata.camera_model = match (ascii_field(exif, Tag::Make), ascii_field(exif, Tag::Model)) {
        (Some(make), Some(model)) => Some(format!("{make} {model}")),
        (None, Some(model)) => Some(model),
        _ => None,
    };

    metadata.width = uint_field(exif, Tag::PixelXDimension);
    metadata.height = uint_field(exif, Tag::PixelYDimension);
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn uint_field(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?
        .value
        .get_uint(0)
        .filter(|v| *v > 0)
}

/// Decimal degrees from a degrees/minutes/seconds rational triple.
fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }
    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let negative = ascii_field(exif, ref_tag)
        .and_then(|r| r.chars().next())
        .is_some_and(|c| c.eq_ignore_ascii_case(&negative_ref));
    Some(if negative { -degrees } else { degrees })
}

/// Parse the EXIF `YYYY:MM:DD HH:MM:SS` form.
fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let dt = exif::DateTime::from_ascii(value.as_bytes()).ok()?;
    NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(
            u32::from(dt.hour),
            u32::from(dt.minute),
            u32::from(dt.second),
        )
}
