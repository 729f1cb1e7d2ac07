//! Camera payload to RGB24

use crate::capture::frame::PixelFormat;
use crate::{Error, Result};

pub fn decode_frame(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    match format {
        PixelFormat::Mjpeg => expect_rgb(decode_jpeg(data)?, width, height),
        PixelFormat::Rgb24 => {
            // Already in RGB format
            check_len(data, pixels * 3, format)?;
            Ok(data[..pixels * 3].to_vec())
        }
        PixelFormat::Bgr24 => {
            check_len(data, pixels * 3, format)?;
            Ok(data[..pixels * 3]
                .chunks_exact(3)
                .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
                .collect())
        }
        PixelFormat::Yuyv4 => {
            if width % 2 != 0 {
                return Err(Error::Decode(format!("YUYV width {width} is odd")));
            }
            check_len(data, pixels * 2, format)?;
            Ok(yuyv_to_rgb(&data[..pixels * 2]))
        }
        PixelFormat::Nv12 => {
            let (width, height) = (width as usize, height as usize);
            check_len(data, pixels + nv12_chroma_len(width, height), format)?;
            Ok(nv12_to_rgb(data, width, height))
        }
    }
}

#[cfg(feature = "fast-jpeg")]
fn decode_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = zune_jpeg::JpegDecoder::new(data);
    decoder.decode().map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(not(feature = "fast-jpeg"))]
fn decode_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    decoder.decode().map_err(|e| Error::Decode(e.to_string()))
}

/// The JPEG must match the negotiated size. Greyscale output is widened to RGB.
fn expect_rgb(decoded: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if decoded.len() == pixels * 3 {
        Ok(decoded)
    } else if decoded.len() == pixels {
        Ok(decoded.iter().flat_map(|&l| [l, l, l]).collect())
    } else {
        Err(Error::Decode(format!(
            "JPEG decoded to {} bytes, expected {}x{} RGB",
            decoded.len(),
            width,
            height
        )))
    }
}

fn check_len(data: &[u8], expected: usize, format: PixelFormat) -> Result<()> {
    if data.len() < expected {
        return Err(Error::Decode(format!(
            "{:?} payload is {} bytes, expected {}",
            format,
            data.len(),
            expected
        )));
    }
    Ok(())
}

/// BT.601 limited range
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

fn yuyv_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for macro_px in data.chunks_exact(4) {
        let (y0, u, y1, v) = (macro_px[0], macro_px[1], macro_px[2], macro_px[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    rgb
}

/// Interleaved UV rows of `ceil(w/2)` pairs, `ceil(h/2)` rows
fn nv12_chroma_len(width: usize, height: usize) -> usize {
    width.div_ceil(2) * 2 * height.div_ceil(2)
}

fn nv12_to_rgb(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (luma, chroma) = data.split_at(width * height);
    let chroma_stride = width.div_ceil(2) * 2;
    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let y = luma[row * width + col];
            let uv = (row / 2) * chroma_stride + (col / 2) * 2;
            rgb.extend_from_slice(&yuv_to_rgb(y, chroma[uv], chroma[uv + 1]));
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_white_and_black() {
        // two pixels: white (Y=235) and black (Y=16), neutral chroma
        let rgb = decode_frame(&[235, 128, 16, 128], PixelFormat::Yuyv4, 2, 1).unwrap();
        assert_eq!(rgb, vec![255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn bgr_is_swapped() {
        let rgb = decode_frame(&[1, 2, 3], PixelFormat::Bgr24, 1, 1).unwrap();
        assert_eq!(rgb, vec![3, 2, 1]);
    }

    #[test]
    fn short_payload_is_a_decode_error() {
        let err = decode_frame(&[0; 5], PixelFormat::Rgb24, 2, 1).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn nv12_odd_width_is_decoded() {
        // 3x2 luma, one chroma row of two UV pairs
        let mut data = vec![235; 6];
        data.extend_from_slice(&[128; 4]);
        let rgb = decode_frame(&data, PixelFormat::Nv12, 3, 2).unwrap();
        assert_eq!(rgb, vec![255; 18]);
    }

    #[test]
    fn nv12_short_chroma_plane_is_a_decode_error() {
        let err = decode_frame(&[128; 9], PixelFormat::Nv12, 3, 2).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn greyscale_jpeg_output_is_widened() {
        let rgb = expect_rgb(vec![7, 9], 2, 1).unwrap();
        assert_eq!(rgb, vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn jpeg_of_wrong_size_is_rejected() {
        // 2x2 RGB where 4x4 was negotiated
        let err = expect_rgb(vec![0; 12], 4, 4).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn garbage_jpeg_is_rejected() {
        assert!(decode_frame(&[0xde, 0xad], PixelFormat::Mjpeg, 1, 1).is_err());
    }
}
