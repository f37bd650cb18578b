use std::path::Path;

use dicom_pixeldata::PixelDecoder;
use image::GrayImage;
use ndarray::{Array2, Axis, Ix2};

use crate::error::PipelineError;

/// Decodes a stored DICOM file into an 8-bit grayscale image, normalized for
/// display. Multi-frame or multi-sample files contribute only their first
/// frame and first sample plane.
pub fn decode_to_grayscale(path: &Path) -> Result<GrayImage, PipelineError> {
    let obj = dicom_object::open_file(path)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    // Shape is [frames, rows, columns, samples].
    let arr = decoded
        .to_ndarray::<f32>()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    if arr.ndim() != 4 || arr.shape().contains(&0) {
        return Err(PipelineError::Decode(format!(
            "unexpected pixel array shape {:?}",
            arr.shape()
        )));
    }
    let plane = arr
        .index_axis_move(Axis(0), 0)
        .index_axis_move(Axis(2), 0)
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    Ok(normalize(plane))
}

/// Linear rescale of pixel intensities into the 0-255 display range:
/// non-finite values become zero, the minimum is subtracted, and the result
/// is scaled by the maximum when it is nonzero. A constant image comes out
/// uniformly zero rather than dividing by zero.
pub fn normalize(mut pixels: Array2<f32>) -> GrayImage {
    pixels.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });

    let min = pixels.iter().copied().fold(f32::INFINITY, f32::min);
    pixels.mapv_inplace(|v| v - min);
    let max = pixels.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max != 0.0 {
        pixels.mapv_inplace(|v| v / max);
    }
    pixels.mapv_inplace(|v| v * 255.0);

    let (rows, cols) = pixels.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        image::Luma([pixels[(y as usize, x as usize)] as u8])
    })
}
