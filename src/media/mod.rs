//! Media production: still capture, dual-photo composition, naming.

pub mod compose;
pub mod photo;

pub use compose::{compose_dual_photo, ComposeError};
pub use photo::{capture_frame, PhotoError};

use chrono::{DateTime, Local};

/// JPEG quality for stills and composites.
pub(crate) const JPEG_QUALITY: u8 = 95;

/// Timestamp slug used in artifact filenames: zero-padded local time.
pub fn timestamp_slug(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_slug_is_zero_padded() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 4).unwrap();
        assert_eq!(timestamp_slug(at), "20240307_090504");
    }
}
