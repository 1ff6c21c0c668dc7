//! Dual photo composition
//!
//! Joins two encoded stills side by side: output width is the sum of the
//! input widths, height the max, with a white divider on the seam.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;

use super::JPEG_QUALITY;

/// Divider stroke width in pixels, centered on the seam.
const DIVIDER_WIDTH: u32 = 2;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("failed to decode source image: {0}")]
    Decode(String),

    #[error("failed to encode combined photo: {0}")]
    Encode(String),
}

/// Compose two encoded photos side by side.
///
/// Both inputs are decoded in parallel and composition waits for both;
/// either decode failing aborts the whole operation before any drawing.
pub async fn compose_dual_photo(left: Vec<u8>, right: Vec<u8>) -> Result<Vec<u8>, ComposeError> {
    let decode_left = tokio::task::spawn_blocking(move || decode(&left));
    let decode_right = tokio::task::spawn_blocking(move || decode(&right));

    let (left, right) = tokio::try_join!(decode_left, decode_right)
        .map_err(|err| ComposeError::Decode(err.to_string()))?;
    let (left, right) = (left?, right?);

    tokio::task::spawn_blocking(move || compose(&left, &right))
        .await
        .map_err(|err| ComposeError::Encode(err.to_string()))?
}

fn decode(bytes: &[u8]) -> Result<RgbImage, ComposeError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|err| ComposeError::Decode(err.to_string()))
}

fn compose(left: &RgbImage, right: &RgbImage) -> Result<Vec<u8>, ComposeError> {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());

    let mut canvas = RgbImage::new(width, height);
    image::imageops::replace(&mut canvas, left, 0, 0);
    image::imageops::replace(&mut canvas, right, i64::from(left.width()), 0);
    draw_divider(&mut canvas, left.width());

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&canvas)
        .map_err(|err| ComposeError::Encode(err.to_string()))?;
    Ok(bytes)
}

fn draw_divider(canvas: &mut RgbImage, seam: u32) {
    let start = seam.saturating_sub(DIVIDER_WIDTH / 2);
    let end = (start + DIVIDER_WIDTH).min(canvas.width());
    for x in start..end {
        for y in 0..canvas.height() {
            canvas.put_pixel(x, y, image::Rgb([255, 255, 255]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::camera::solid_frame;
    use crate::media::photo::encode_jpeg;

    fn jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        encode_jpeg(&solid_frame(width, height, rgb)).unwrap()
    }

    #[tokio::test]
    async fn output_is_sum_width_and_max_height() {
        for ((wa, ha), (wb, hb)) in [
            ((64, 48), (64, 48)),
            ((120, 40), (30, 90)),
            ((1, 1), (200, 3)),
        ] {
            let combined = compose_dual_photo(jpeg(wa, ha, [255, 0, 0]), jpeg(wb, hb, [0, 0, 255]))
                .await
                .unwrap();
            let decoded = image::load_from_memory(&combined).unwrap().to_rgb8();
            assert_eq!(decoded.width(), wa + wb);
            assert_eq!(decoded.height(), ha.max(hb));
        }
    }

    #[tokio::test]
    async fn either_decode_failure_aborts() {
        let good = jpeg(32, 32, [10, 10, 10]);
        let garbage = vec![0u8; 16];

        assert!(matches!(
            compose_dual_photo(garbage.clone(), good.clone()).await,
            Err(ComposeError::Decode(_))
        ));
        assert!(matches!(
            compose_dual_photo(good, garbage).await,
            Err(ComposeError::Decode(_))
        ));
    }

    #[test]
    fn divider_covers_the_seam_full_height() {
        let mut canvas = RgbImage::new(10, 6);
        draw_divider(&mut canvas, 4);

        for y in 0..6 {
            assert_eq!(canvas.get_pixel(3, y).0, [255, 255, 255]);
            assert_eq!(canvas.get_pixel(4, y).0, [255, 255, 255]);
            assert_eq!(canvas.get_pixel(2, y).0, [0, 0, 0]);
            assert_eq!(canvas.get_pixel(5, y).0, [0, 0, 0]);
        }
    }

    #[test]
    fn divider_clamps_to_canvas_edges() {
        let mut canvas = RgbImage::new(4, 2);
        draw_divider(&mut canvas, 4);
        assert_eq!(canvas.get_pixel(3, 0).0, [255, 255, 255]);

        let mut canvas = RgbImage::new(4, 2);
        draw_divider(&mut canvas, 0);
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
