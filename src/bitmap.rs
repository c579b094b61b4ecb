//! `bitmap`
//!
//! Typed decoding of the device bitmap produced by the external
//! rasterizer.
//!
//! The bitmap is a plain Windows BMP: a fixed 54-byte header with
//! little-endian fields, then bottom-up scanlines padded to a 4-byte
//! boundary. Only the three header fields the encoder needs are decoded;
//! everything else the rasterizer writes is ignored.

use std::io::Read;

use crate::error::RasterError;

/// Number of bytes in the bitmap header.
pub const HEADER_LEN: usize = 54;

/// Byte offset of the row-data offset field.
const DATA_OFFSET_AT: usize = 10;
/// Byte offset of the width field.
const WIDTH_AT: usize = 18;
/// Byte offset of the height field.
const HEIGHT_AT: usize = 22;

/// The header fields of a device bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    /// Offset of the first scanline from the start of the file.
    pub data_offset: u64,
    /// Bitmap width in pixels.
    pub width: i32,
    /// Bitmap height in pixels.
    pub height: i32,
}

impl BitmapHeader {
    /// Reads and decodes a bitmap header from the start of `reader`.
    ///
    /// # Arguments
    /// * `reader`: A reader positioned at the start of the bitmap.
    ///
    /// # Returns
    /// The decoded header.
    ///
    /// # Errors
    /// [`RasterError::TruncatedHeader`] if the input ends within the
    /// fixed-size header, or an I/O error from the underlying reader.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self, RasterError> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).map_err(|error| {
            if error.kind() == std::io::ErrorKind::UnexpectedEof {
                RasterError::TruncatedHeader
            } else {
                RasterError::Io(error)
            }
        })?;

        Ok(BitmapHeader {
            data_offset: u64::from(read_u32_le(&header, DATA_OFFSET_AT)),
            width: read_u32_le(&header, WIDTH_AT) as i32,
            height: read_u32_le(&header, HEIGHT_AT) as i32,
        })
    }
}

/// Decodes a little-endian `u32` at `offset` within `bytes`.
fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Fills `buf` completely from `reader`.
///
/// # Arguments
/// * `reader`: The bitmap reader.
/// * `buf`: The scanline buffer to fill.
/// * `row`: Row index, used only for error reporting.
///
/// # Returns
/// `Ok(())` once the buffer is full.
///
/// # Errors
/// [`RasterError::TruncatedScanline`] when the input ends early, carrying
/// the expected and actual byte counts.
pub fn read_scanline<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    row: i32,
) -> Result<(), RasterError> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..])?;
        if read == 0 {
            return Err(RasterError::TruncatedScanline {
                row,
                expected: buf.len(),
                actual: filled,
            });
        }
        filled += read;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds a header with the given geometry and zeroes elsewhere.
    fn header_bytes(data_offset: u32, width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[DATA_OFFSET_AT..DATA_OFFSET_AT + 4].copy_from_slice(&data_offset.to_le_bytes());
        bytes[WIDTH_AT..WIDTH_AT + 4].copy_from_slice(&width.to_le_bytes());
        bytes[HEIGHT_AT..HEIGHT_AT + 4].copy_from_slice(&height.to_le_bytes());
        bytes
    }

    #[test]
    fn test_parse_header() {
        let bytes = header_bytes(54, 640, 480);
        let header = BitmapHeader::parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(
            header,
            BitmapHeader {
                data_offset: 54,
                width: 640,
                height: 480,
            }
        );
    }

    #[test]
    fn test_parse_truncated_header() {
        let bytes = header_bytes(54, 640, 480);
        let result = BitmapHeader::parse(&mut Cursor::new(&bytes[..20]));
        assert!(matches!(result, Err(RasterError::TruncatedHeader)));
    }

    #[test]
    fn test_read_scanline_reports_shortfall() {
        let mut buf = [0u8; 8];
        let result = read_scanline(&mut Cursor::new(vec![1u8, 2, 3]), &mut buf, 7);
        match result {
            Err(RasterError::TruncatedScanline {
                row,
                expected,
                actual,
            }) => {
                assert_eq!(row, 7);
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("expected truncated scanline, got {other:?}"),
        }
    }
}
