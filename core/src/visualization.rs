use anyhow::{Context, Result};
use base64::Engine;
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, RgbaImage};

fn png_data_url(bytes: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<String> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(bytes, width, height, color)
        .with_context(|| format!("failed to encode {width}x{height} PNG"))?;

    let base64 = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/png;base64,{base64}"))
}

/// Encode a rendered activation raster as a PNG data URL.
pub fn encode_png_data_url(image: &RgbaImage) -> Result<String> {
    png_data_url(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )
}

/// Encode a grayscale image (values in [0, 1]) as a PNG data URL.
pub fn encode_luma_png_data_url(width: u32, height: u32, pixels: &[f32]) -> Result<String> {
    if pixels.len() != (width * height) as usize {
        anyhow::bail!(
            "pixel buffer length {} does not match image size {}x{}",
            pixels.len(),
            width,
            height
        );
    }

    let encoded = pixels
        .iter()
        .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect::<Vec<_>>();
    png_data_url(&encoded, width, height, ExtendedColorType::L8)
}
