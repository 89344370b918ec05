use crate::{Result, VisualTestError};
use image::{Rgba, RgbaImage};
use image_compare::Algorithm;
use std::path::Path;

/// Result of comparing two images
pub struct CompareResult {
    /// Similarity score from 0.0 to 1.0
    pub similarity: f64,
    /// Largest per-channel difference of any pixel
    pub max_difference: u8,
}

/// Compare two renders using SSIM, ignoring alpha
pub fn compare_images(reference: &RgbaImage, captured: &RgbaImage) -> Result<CompareResult> {
    if reference.dimensions() != captured.dimensions() {
        return Err(VisualTestError::Compare(format!(
            "Image dimensions don't match: reference {:?} vs captured {:?}",
            reference.dimensions(),
            captured.dimensions()
        )));
    }

    let ref_rgb = image::DynamicImage::ImageRgba8(reference.clone()).to_rgb8();
    let cap_rgb = image::DynamicImage::ImageRgba8(captured.clone()).to_rgb8();

    let result =
        image_compare::rgb_similarity_structure(&Algorithm::MSSIMSimple, &ref_rgb, &cap_rgb)
            .map_err(|e| VisualTestError::Compare(format!("SSIM comparison failed: {}", e)))?;

    let max_difference = reference
        .pixels()
        .zip(captured.pixels())
        .map(|(a, b)| pixel_difference(a, b))
        .max()
        .unwrap_or(0);

    Ok(CompareResult {
        similarity: result.score,
        max_difference,
    })
}

/// Write an image highlighting differences between two renders
pub fn generate_diff_image(reference: &RgbaImage, captured: &RgbaImage, output: &Path) -> Result<()> {
    let (width, height) = reference.dimensions();
    let mut diff_img = RgbaImage::new(width, height);

    for (x, y, ref_pixel) in reference.enumerate_pixels() {
        let cap_pixel = captured.get_pixel(x, y);
        let diff = pixel_difference(ref_pixel, cap_pixel);

        if diff > 10 {
            let intensity = (diff as f32 / 255.0 * 200.0 + 55.0) as u8;
            diff_img.put_pixel(x, y, Rgba([intensity, 0, 0, 255]));
        } else {
            let r = (cap_pixel[0] as u16 / 3) as u8;
            let g = (cap_pixel[1] as u16 / 3) as u8;
            let b = (cap_pixel[2] as u16 / 3) as u8;
            diff_img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }

    diff_img.save(output)?;
    Ok(())
}

/// Maximum channel difference between two pixels
fn pixel_difference(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    let dr = (a[0] as i16 - b[0] as i16).unsigned_abs() as u8;
    let dg = (a[1] as i16 - b[1] as i16).unsigned_abs() as u8;
    let db = (a[2] as i16 - b[2] as i16).unsigned_abs() as u8;
    dr.max(dg).max(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_images_match() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([10, 200, 30, 255]));
        let result = compare_images(&img, &img).unwrap();
        assert!(result.similarity > 0.999);
        assert_eq!(result.max_difference, 0);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let a = RgbaImage::new(4, 4);
        let b = RgbaImage::new(4, 5);
        assert!(compare_images(&a, &b).is_err());
    }
}
