use anyhow::{Context, Result};
use font8x8::legacy::BASIC_LEGACY;
use image::{DynamicImage, Pixel, Rgba, RgbaImage};

/// Provenance label stamped onto every generated image.
pub const LABEL: &str = "Created by Rare AI";

const INSET_PX: u32 = 10;
// Light gray at 70% opacity.
const LABEL_COLOR: Rgba<u8> = Rgba([200, 200, 200, 178]);
const GLYPH_CELLS: u32 = 8;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Label height in pixels for a given image size: at least 12, otherwise
/// the smaller of width/40 and height/30.
fn label_px(width: u32, height: u32) -> u32 {
    let size = (width as f32 / 40.0).min(height as f32 / 30.0).max(12.0);
    size.round() as u32
}

/// Composite the provenance label onto the bottom-right corner of a
/// generated image, inset 10 pixels from both edges. Always applied, for
/// every image; deterministic for a fixed input.
pub fn apply(image: &DynamicImage) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = (canvas.width(), canvas.height());

    let glyph_h = label_px(width, height);
    let glyph_w = glyph_h; // 8x8 cells scale uniformly
    let label_w = glyph_w * LABEL.chars().count() as u32;

    let x0 = width.saturating_sub(INSET_PX + label_w);
    let y0 = height.saturating_sub(INSET_PX + glyph_h);

    for (i, ch) in LABEL.chars().enumerate() {
        let glyph = match BASIC_LEGACY.get(ch as usize) {
            Some(glyph) => glyph,
            None => continue,
        };
        let gx = x0 + glyph_w * i as u32;
        draw_glyph(&mut canvas, glyph, gx, y0, glyph_w, glyph_h);
    }

    canvas
}

/// Scale one 8x8 glyph bitmap to `w`x`h` pixels at (`x0`, `y0`),
/// alpha-blending set cells over the existing pixels.
fn draw_glyph(canvas: &mut RgbaImage, glyph: &[u8; 8], x0: u32, y0: u32, w: u32, h: u32) {
    for dy in 0..h {
        let row = glyph[(dy * GLYPH_CELLS / h).min(GLYPH_CELLS - 1) as usize];
        for dx in 0..w {
            let col = (dx * GLYPH_CELLS / w).min(GLYPH_CELLS - 1);
            if (row >> col) & 1 == 0 {
                continue;
            }
            let (x, y) = (x0 + dx, y0 + dy);
            if x < canvas.width() && y < canvas.height() {
                let mut px = *canvas.get_pixel(x, y);
                px.blend(&LABEL_COLOR);
                canvas.put_pixel(x, y, px);
            }
        }
    }
}

/// Encode a raster as a PNG data URI, the transcript's payload format for
/// image messages.
pub fn to_data_uri(image: &RgbaImage) -> Result<String> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .context("Failed to encode image")?;
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, buffer);
    Ok(format!("{}{}", PNG_DATA_URI_PREFIX, encoded))
}

/// Recover the encoded image bytes from a data URI payload.
pub fn data_uri_bytes(uri: &str) -> Result<Vec<u8>> {
    let (_, b64) = uri
        .split_once("base64,")
        .ok_or_else(|| anyhow::anyhow!("not a base64 data URI"))?;
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
        .context("Failed to decode image payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 10, 10, 255])))
    }

    #[test]
    fn test_label_px_clamps() {
        // Small images floor at 12.
        assert_eq!(label_px(100, 100), 12);
        // Otherwise the smaller of width/40 and height/30 wins.
        assert_eq!(label_px(800, 600), 20);
        assert_eq!(label_px(4000, 300), 12);
        assert_eq!(label_px(1200, 3000), 30);
    }

    #[test]
    fn test_apply_preserves_dimensions() {
        let out = apply(&flat_image(640, 480));
        assert_eq!((out.width(), out.height()), (640, 480));
    }

    #[test]
    fn test_label_lands_in_bottom_right_inset() {
        let img = flat_image(640, 480);
        let out = apply(&img);

        let background = Rgba([10, 10, 10, 255]);
        let label_w = label_px(640, 480) * LABEL.chars().count() as u32;
        let x0 = 640 - 10 - label_w;
        let y0 = 480 - 10 - label_px(640, 480);

        let mut changed_in_corner = false;
        for y in 0..480 {
            for x in 0..640 {
                if *out.get_pixel(x, y) != background {
                    assert!(x >= x0 && y >= y0, "stray label pixel at ({x}, {y})");
                    changed_in_corner = true;
                }
            }
        }
        assert!(changed_in_corner, "label left no pixels behind");

        // The 10px bands along the right and bottom edges stay clean.
        for y in 0..480 {
            for x in 631..640 {
                assert_eq!(*out.get_pixel(x, y), background);
            }
        }
        for x in 0..640 {
            for y in 471..480 {
                assert_eq!(*out.get_pixel(x, y), background);
            }
        }
    }

    #[test]
    fn test_apply_is_deterministic() {
        let img = flat_image(321, 123);
        assert_eq!(apply(&img), apply(&img));
    }

    #[test]
    fn test_tiny_image_still_gets_stamped() {
        // Narrower than the label; drawing clips instead of failing.
        let out = apply(&flat_image(40, 40));
        assert_eq!((out.width(), out.height()), (40, 40));
    }

    #[test]
    fn test_data_uri_round_trip() {
        let stamped = apply(&flat_image(32, 16));
        let uri = to_data_uri(&stamped).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let bytes = data_uri_bytes(&uri).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn test_data_uri_bytes_rejects_plain_text() {
        assert!(data_uri_bytes("hello").is_err());
    }
}
