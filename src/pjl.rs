//! `pjl`
//!
//! The job framer: wraps the raster and vector blocks in the printer job
//! language escapes the device expects, in strict program order.

use std::io::{BufRead, Read, Seek};

use crate::error::JobError;
use crate::hpgl::encode_vector;
use crate::job::{PrintJob, RasterMode};
use crate::raster::encode_raster;
use crate::units::PageDims;

/// The escape character, we insert this _a lot_.
pub(crate) const ESC: char = '\x1b';

/// Number of zero bytes appended after the job footer; the device needs
/// the pad to flush trailing data.
pub const TRAILER_PAD: usize = 4096;

/// The single append-only output stream for one print job.
///
/// The framer owns the buffer for its whole lifetime; the raster and
/// vector encoders write into it in program order and the delivery client
/// receives it by reference at the end.
#[derive(Debug, Default)]
pub struct JobBuffer {
    bytes: Vec<u8>,
}

impl JobBuffer {
    /// Creates an empty job buffer.
    pub fn new() -> Self {
        JobBuffer::default()
    }

    /// Appends a command fragment as its raw bytes.
    pub fn emit(&mut self, fragment: &str) {
        self.bytes.extend_from_slice(fragment.as_bytes());
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Appends raw bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Frames a complete device job.
///
/// Emits the PJL header, conditionally runs the raster encoder (raster
/// power > 0 and a raster mode selected) and the vector encoder (vector
/// power > 0), and closes with the reset/exit footer and the zero pad.
/// When the raster encoder discovers a different bitmap size than
/// configured, the corrected dimensions feed the vector stage's tiling.
///
/// # Arguments
/// * `job`: The clamped job configuration.
/// * `bitmap`: The device bitmap (only read when the raster stage runs).
/// * `vectors`: The vector instruction stream (only read when the vector
///   stage runs).
///
/// # Returns
/// The finished job buffer.
///
/// # Errors
/// [`JobError`] from whichever stage fails first; later stages are not
/// attempted.
pub fn frame<R: Read + Seek, V: BufRead>(
    job: &PrintJob,
    bitmap: &mut R,
    vectors: V,
) -> Result<JobBuffer, JobError> {
    let mut out = JobBuffer::new();

    out.emit(&format!("{ESC}%-12345X@PJL JOB NAME={}\r\n", job.name));
    out.emit(&format!("{ESC}E@PJL ENTER LANGUAGE=PCL\r\n"));
    out.emit(&format!("{ESC}&y{}A", i32::from(job.auto_focus)));
    // Left and top offset registration, both zero.
    out.emit(&format!("{ESC}&l0U"));
    out.emit(&format!("{ESC}&l0Z"));
    out.emit(&format!("{ESC}&u{}D", job.resolution));
    out.emit(&format!("{ESC}*p0X"));
    out.emit(&format!("{ESC}*p0Y"));
    out.emit(&format!("{ESC}*t{}R", job.resolution));

    let mut page = PageDims::of_job(job);
    if job.raster.power > 0 && job.raster.mode != RasterMode::None {
        out.emit(&format!("{ESC}&y0C"));
        page = encode_raster(bitmap, &mut out, job)?;
    }

    if job.vector.power > 0 {
        out.emit(&format!("{ESC}E@PJL ENTER LANGUAGE=PCL\r\n"));
        // Page orientation and raster geometry reset before plotting.
        out.emit(&format!("{ESC}*r0F"));
        out.emit(&format!("{ESC}*r{}T", page.height * job.y_repeat));
        out.emit(&format!("{ESC}*r{}S", page.width * job.x_repeat));
        out.emit(&format!("{ESC}*r1A"));
        out.emit(&format!("{ESC}*rC"));
        out.emit(&format!("{ESC}%1B"));
        encode_vector(vectors, &mut out, job, page)?;
    }

    out.emit(&format!("{ESC}E"));
    out.emit(&format!("{ESC}%-12345X"));
    out.emit("@PJL EOJ \r\n");
    out.extend(&[0u8; TRAILER_PAD]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_job_buffer_builder() {
        let mut buffer = JobBuffer::new();
        assert!(buffer.is_empty());
        buffer.emit("IN;");
        buffer.push(26);
        buffer.extend(&[4, 0]);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.as_bytes(), b"IN;\x1a\x04\x00");
    }

    #[test]
    fn test_frame_with_both_stages_disabled() {
        let mut job = PrintJob::default();
        job.name = String::from("plaque");
        job.raster.power = 0;
        job.vector.power = 0;

        let out = frame(&job, &mut Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
        let bytes = out.into_bytes();

        let header = b"\x1b%-12345X@PJL JOB NAME=plaque\r\n";
        assert!(bytes.starts_with(header));
        let body = String::from_utf8_lossy(&bytes[..bytes.len() - TRAILER_PAD]);
        assert!(body.ends_with("\x1bE\x1b%-12345X@PJL EOJ \r\n"));
        assert!(bytes[bytes.len() - TRAILER_PAD..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_frame_autofocus_flag() {
        let mut job = PrintJob::default();
        job.raster.power = 0;
        job.vector.power = 0;

        job.auto_focus = true;
        let out = frame(&job, &mut Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
        let body = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(body.contains("\x1b&y1A"));

        job.auto_focus = false;
        let out = frame(&job, &mut Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
        let body = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(body.contains("\x1b&y0A"));
    }
}
