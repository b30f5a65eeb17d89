//! Conversion of raw device frames into RGB images for the display surface.

use crate::errors::CameraError;
use crate::platform::RawFrame;
use image::RgbImage;

/// Convert a frame in the device's native format to packed RGB.
///
/// Supported: `RGB3`, `BGR3`, `YUYV`, `GREY`, `MJPG` and `JPEG`.
pub fn to_rgb(frame: &RawFrame) -> Result<RgbImage, CameraError> {
    let (width, height) = (frame.width, frame.height);
    let pixels = width as usize * height as usize;

    let data = match &frame.fourcc {
        b"RGB3" => {
            check_len(frame, pixels * 3)?;
            frame.data[..pixels * 3].to_vec()
        }
        b"BGR3" => {
            check_len(frame, pixels * 3)?;
            frame.data[..pixels * 3]
                .chunks_exact(3)
                .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
                .collect()
        }
        b"GREY" => {
            check_len(frame, pixels)?;
            frame.data[..pixels].iter().flat_map(|&y| [y, y, y]).collect()
        }
        b"YUYV" => {
            // Rows hold whole macropixels, so an odd width carries one
            // padding pixel per row.
            let stride = (width as usize).div_ceil(2) * 4;
            let len = stride * height as usize;
            check_len(frame, len)?;
            yuyv_to_rgb(&frame.data[..len], width as usize, stride)
        }
        b"MJPG" | b"JPEG" => {
            let decoded = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
                .map_err(|e| CameraError::CameraIo(format!("Failed to decode JPEG frame: {}", e)))?;
            return Ok(decoded.to_rgb8());
        }
        _ => return Err(CameraError::UnsupportedFormat(frame.format_name())),
    };

    RgbImage::from_raw(width, height, data).ok_or_else(|| {
        CameraError::CameraIo(format!("Frame buffer does not match {}x{}", width, height))
    })
}

fn check_len(frame: &RawFrame, expected: usize) -> Result<(), CameraError> {
    if frame.data.len() < expected {
        return Err(CameraError::CameraIo(format!(
            "Short {} frame: {} bytes, expected {}",
            frame.format_name(),
            frame.data.len(),
            expected
        )));
    }
    Ok(())
}

/// BT.601 limited-range YUV 4:2:2 to RGB.
fn yuyv_to_rgb(data: &[u8], width: usize, stride: usize) -> Vec<u8> {
    let rows = if stride == 0 { 0 } else { data.len() / stride };
    let mut rgb = Vec::with_capacity(rows * width * 3);
    for row in data.chunks_exact(stride.max(1)).take(rows) {
        let end = rgb.len() + width * 3;
        for chunk in row.chunks_exact(4) {
            let u = chunk[1] as i32 - 128;
            let v = chunk[3] as i32 - 128;
            for y in [chunk[0], chunk[2]] {
                let c = (y as i32 - 16).max(0) * 298;
                let r = (c + 409 * v + 128) >> 8;
                let g = (c - 100 * u - 208 * v + 128) >> 8;
                let b = (c + 516 * u + 128) >> 8;
                rgb.extend([clamp(r), clamp(g), clamp(b)]);
            }
        }
        rgb.truncate(end);
    }
    rgb
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_is_swapped() {
        let frame = RawFrame::new(vec![1u8, 2, 3, 4, 5, 6], 2, 1, *b"BGR3");
        let image = to_rgb(&frame).unwrap();
        assert_eq!(image.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_rgb_passthrough() {
        let frame = RawFrame::new(vec![10u8; 4 * 3 * 3], 4, 3, *b"RGB3");
        let image = to_rgb(&frame).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }

    #[test]
    fn test_yuyv_white_and_black() {
        // Y=235 is white and Y=16 is black in limited range, with neutral chroma.
        let frame = RawFrame::new(vec![235u8, 128, 16, 128], 2, 1, *b"YUYV");
        let image = to_rgb(&frame).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_yuyv_odd_width_drops_row_padding() {
        // 3x2: each row is two macropixels, the second pixel of the last
        // one is padding.
        let row = [235u8, 128, 16, 128, 235, 128, 16, 128];
        let frame = RawFrame::new([row, row].concat(), 3, 2, *b"YUYV");
        let image = to_rgb(&frame).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        for y in 0..2 {
            assert_eq!(image.get_pixel(0, y).0, [255, 255, 255]);
            assert_eq!(image.get_pixel(1, y).0, [0, 0, 0]);
            assert_eq!(image.get_pixel(2, y).0, [255, 255, 255]);
        }
    }

    #[test]
    fn test_yuyv_odd_width_without_padding_is_short() {
        let frame = RawFrame::new(vec![128u8; 3 * 2 * 2], 3, 2, *b"YUYV");
        assert!(matches!(to_rgb(&frame), Err(CameraError::CameraIo(_))));
    }

    #[test]
    fn test_grey_expands() {
        let frame = RawFrame::new(vec![7u8, 9], 2, 1, *b"GREY");
        assert_eq!(to_rgb(&frame).unwrap().as_raw(), &vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let frame = RawFrame::new(vec![0u8; 5], 2, 1, *b"RGB3");
        assert!(matches!(to_rgb(&frame), Err(CameraError::CameraIo(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let frame = RawFrame::new(vec![0u8; 16], 2, 2, *b"Y16 ");
        match to_rgb(&frame) {
            Err(CameraError::UnsupportedFormat(name)) => assert_eq!(name, "Y16"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
