//! Image helpers shared by the detection and OCR adapters

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::detection::BoundingBox;

/// Replicate the luminance of `image` into three channels.
///
/// Detection runs on this normalized copy so that differently tinted photos
/// score consistently.
pub fn grayscale_rgb(image: &RgbImage) -> RgbImage {
    let gray = DynamicImage::ImageRgb8(image.clone()).into_luma8();
    DynamicImage::ImageLuma8(gray).into_rgb8()
}

/// Copy out the region covered by `bbox`
pub fn crop(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    image::imageops::crop_imm(image, bbox.x1, bbox.y1, bbox.width(), bbox.height()).to_image()
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale_rgb_equal_channels() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(1, 1, Rgb([200, 30, 90]));
        let gray = grayscale_rgb(&img);

        assert_eq!(gray.dimensions(), (4, 4));
        let Rgb([r, g, b]) = *gray.get_pixel(1, 1);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r > 0);
    }

    #[test]
    fn test_crop_dimensions() {
        let img = RgbImage::from_pixel(100, 50, Rgb([10, 20, 30]));
        let bbox = BoundingBox {
            x1: 10,
            y1: 5,
            x2: 40,
            y2: 25,
        };
        let region = crop(&img, &bbox);
        assert_eq!(region.dimensions(), (30, 20));
    }

    #[test]
    fn test_encode_png_roundtrip_dimensions() {
        let img = RgbImage::from_pixel(7, 3, Rgb([1, 2, 3]));
        let png = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
    }
}
