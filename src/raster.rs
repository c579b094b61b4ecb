//! `raster`
//!
//! The raster encoder: turns the device bitmap into compressed,
//! power-scaled scanline commands.
//!
//! Scanlines are emitted bottom-up in alternating directions, trimmed of
//! their white margins, and packed with a two-byte-run / literal scheme.
//! In colour mode every scanline is re-read once per separation pass; the
//! resulting escape ordering is part of the device contract and must not
//! be "optimized" away.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::bitmap::{read_scanline, BitmapHeader};
use crate::error::RasterError;
use crate::job::{PrintJob, RasterMode};
use crate::pjl::{JobBuffer, ESC};
use crate::units::{base_offsets, PageDims};

/// Working buffer bound for one scanline, in bytes.
pub const MAX_ROW_BYTES: usize = 102_400;

/// Number of separation passes in colour mode: grey plus the six
/// primary/secondary colour combinations.
const COLOUR_PASSES: i32 = 7;

/// Encodes the raster block into the job buffer.
///
/// The whole block is emitted once per configured raster repeat. Each
/// repeat re-parses the bitmap header, because the rasterizer may have
/// resized the page; the dimensions found in the final header are
/// returned so the framer can retile the vector stage against them.
///
/// # Arguments
/// * `reader`: The device bitmap, positioned anywhere (it is rewound).
/// * `out`: The job buffer to append to.
/// * `job`: The clamped job configuration.
///
/// # Returns
/// The page dimensions discovered in the bitmap header, in device dots.
///
/// # Errors
/// [`RasterError`] when the bitmap is malformed or unreadable.
pub fn encode_raster<R: Read + Seek>(
    reader: &mut R,
    out: &mut JobBuffer,
    job: &PrintJob,
) -> Result<PageDims, RasterError> {
    let mut page = PageDims::of_job(job);
    if job.raster.mode == RasterMode::None {
        return Ok(page);
    }

    for _ in 0..job.raster.repeat {
        reader.seek(SeekFrom::Start(0))?;
        let header = BitmapHeader::parse(reader)?;
        page = PageDims {
            width: header.width,
            height: header.height,
        };
        let (base_x, base_y) = base_offsets(job, page);

        let pixels = page.width.max(0);
        // Scanlines are padded to a 4-byte boundary in the file; the
        // decoded line is one byte per pixel (or per 8 pixels in mono).
        let (line_bytes, row_bytes) = match job.raster.mode {
            RasterMode::Colour => (pixels, (pixels * 3 + 3) / 4 * 4),
            RasterMode::Grey => (pixels, (pixels + 3) / 4 * 4),
            _ => {
                let packed = (pixels + 7) / 8;
                (packed, (packed + 3) / 4 * 4)
            }
        };
        let line_bytes = line_bytes as usize;
        let row_bytes = row_bytes as usize;
        if row_bytes > MAX_ROW_BYTES {
            return Err(RasterError::TooWide {
                bytes: row_bytes,
                limit: MAX_ROW_BYTES,
            });
        }
        debug!(
            "raster geometry: width {} height {} line {line_bytes} row {row_bytes}",
            page.width, page.height
        );

        // Grey and colour bitmaps scale power per pixel, so the block
        // power is pinned to 100; mono carries the configured power.
        let block_power = match job.raster.mode {
            RasterMode::Grey | RasterMode::Colour => 100,
            _ => job.raster.power,
        };
        let compression = match job.raster.mode {
            RasterMode::Grey | RasterMode::Colour => 7,
            _ => 2,
        };

        out.emit(&format!("{ESC}*r0F"));
        out.emit(&format!("{ESC}&y{block_power}P"));
        out.emit(&format!("{ESC}&z{}S", job.raster.speed));
        out.emit(&format!("{ESC}*r{}T", page.height * job.y_repeat));
        out.emit(&format!("{ESC}*r{}S", page.width * job.x_repeat));
        out.emit(&format!("{ESC}*b{compression}M"));
        // Raster direction (1 = up).
        out.emit(&format!("{ESC}&y1O"));
        // Start at the current position.
        out.emit(&format!("{ESC}*r1A"));

        let passes = if job.raster.mode == RasterMode::Colour {
            COLOUR_PASSES
        } else {
            1
        };
        let mut raw = vec![0u8; row_bytes];
        let mut line = vec![0u8; line_bytes];

        for tile_x in (0..job.x_repeat).rev() {
            let off_x = page.width * tile_x;
            for tile_y in (0..job.y_repeat).rev() {
                let off_y = page.height * tile_y;
                for pass in 0..passes {
                    let mut reversed = false;
                    reader.seek(SeekFrom::Start(header.data_offset))?;
                    for y in (0..page.height).rev() {
                        read_scanline(reader, &mut raw, y)?;
                        match job.raster.mode {
                            RasterMode::Colour => decode_colour_row(&raw, &mut line, pass),
                            RasterMode::Grey => {
                                for (value, &source) in line.iter_mut().zip(raw.iter()) {
                                    *value = 255 - source;
                                }
                            }
                            _ => line.copy_from_slice(&raw[..line_bytes]),
                        }
                        if matches!(job.raster.mode, RasterMode::Grey | RasterMode::Colour) {
                            for value in &mut line {
                                *value = (i32::from(*value) * job.raster.power / 255) as u8;
                            }
                        }

                        // Trim the white margins; skip fully white lines.
                        let Some(first) = line.iter().position(|&value| value != 0) else {
                            continue;
                        };
                        let last = line.iter().rposition(|&value| value != 0).unwrap_or(first);
                        let span = &mut line[first..last + 1];

                        out.emit(&format!("{ESC}*p{}Y", base_y + off_y + y));
                        let left = if job.raster.mode == RasterMode::Mono {
                            first as i32 * 8
                        } else {
                            first as i32
                        };
                        out.emit(&format!("{ESC}*p{}X", base_x + off_x + left));
                        if reversed {
                            out.emit(&format!("{ESC}*b{}A", -(span.len() as i32)));
                            span.reverse();
                        } else {
                            out.emit(&format!("{ESC}*b{}A", span.len()));
                        }
                        reversed = !reversed;

                        let packed = pack_scanline(span);
                        let padded = (packed.len() + 7) / 8 * 8;
                        out.emit(&format!("{ESC}*b{padded}W"));
                        out.extend(&packed);
                        for _ in packed.len()..padded {
                            out.push(0x80);
                        }
                    }
                }
            }
        }

        out.emit(&format!("{ESC}*rC"));
        // End-of-file markers.
        out.push(26);
        out.push(4);
    }

    Ok(page)
}

/// Decodes one colour scanline for a separation pass.
///
/// Each pixel's three channels form a saturation bitmask (a channel is
/// "on" above 240); the pixel's intensity is the average of the remaining
/// channels. Pixels whose mask does not match the current pass are forced
/// white, and the result is inverted so that darker means more power.
fn decode_colour_row(raw: &[u8], line: &mut [u8], pass: i32) {
    for (pixel, value) in raw.chunks_exact(3).zip(line.iter_mut()) {
        let mut mask = 0;
        let mut off_channels = 0;
        let mut sum = 0;
        for (channel, &level) in pixel.iter().enumerate() {
            if level > 240 {
                mask |= 1 << channel;
            } else {
                off_channels += 1;
                sum += i32::from(level);
            }
        }
        let intensity = if off_channels > 0 {
            sum / off_channels
        } else {
            mask = 0;
            255
        };
        let intensity = if mask == pass { intensity } else { 255 };
        *value = (255 - intensity) as u8;
    }
}

/// Packs a trimmed scanline span with the device's run/literal scheme.
///
/// A repeated byte run of length 2–128 encodes as `(257 - len, value)`;
/// anything else becomes a literal run of up to 127 bytes encoded as
/// `(len - 1, bytes…)`, terminated by the next repeat or the span end.
///
/// # Arguments
/// * `span`: The trimmed scanline bytes.
///
/// # Returns
/// The packed bytes, without alignment padding.
pub fn pack_scanline(span: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(span.len() + span.len() / 127 + 2);
    let mut i = 0;
    while i < span.len() {
        let mut j = i;
        while j < span.len() && j < i + 128 && span[j] == span[i] {
            j += 1;
        }
        if j - i >= 2 {
            packed.push((257 - (j - i)) as u8);
            packed.push(span[i]);
        } else {
            let mut j = i;
            while j < span.len() && j < i + 127 && (j + 1 == span.len() || span[j] != span[j + 1])
            {
                j += 1;
            }
            packed.push((j - i - 1) as u8);
            packed.extend_from_slice(&span[i..j]);
            i = j;
            continue;
        }
        i = j;
    }
    packed
}

/// Unpacks a scanline packed by [`pack_scanline`].
///
/// The inverse of the packing scheme; a `0x80` byte is alignment padding
/// and ends the data.
///
/// # Arguments
/// * `packed`: The packed bytes, with or without alignment padding.
///
/// # Returns
/// The original span.
pub fn unpack_scanline(packed: &[u8]) -> Vec<u8> {
    let mut span = Vec::new();
    let mut i = 0;
    while i < packed.len() {
        let code = packed[i];
        if code == 0x80 {
            break;
        }
        if code > 128 {
            let run = 257 - usize::from(code);
            if let Some(&value) = packed.get(i + 1) {
                span.extend(std::iter::repeat(value).take(run));
            }
            i += 2;
        } else {
            let len = usize::from(code) + 1;
            let end = (i + 1 + len).min(packed.len());
            span.extend_from_slice(&packed[i + 1..end]);
            i = end;
        }
    }
    span
}
