//! `error`
//!
//! Error types for job encoding and delivery.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while encoding the raster block from a device bitmap.
///
/// All of these are fatal to the current job: a malformed bitmap means the
/// external rasterizer produced inconsistent output, and no partial job may
/// be sent to the device.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The bitmap ended before the fixed-size header could be read.
    #[error("bitmap header is truncated")]
    TruncatedHeader,

    /// A scanline read returned fewer bytes than the header promised.
    #[error("scanline {row} is truncated: expected {expected} bytes, read {actual}")]
    TruncatedScanline {
        /// Row index counted from the top of the page.
        row: i32,
        /// Bytes the bitmap header implies per scanline.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The derived scanline byte count exceeds the working buffer bound.
    #[error("scanline of {bytes} bytes exceeds the {limit} byte working buffer")]
    TooWide {
        /// Derived bytes per scanline.
        bytes: usize,
        /// Maximum supported bytes per scanline.
        limit: usize,
    },

    /// Reading the bitmap failed at the I/O layer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors produced while encoding the vector block.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Reading the vector instruction stream failed at the I/O layer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A step of the line-printer handshake that expects an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    /// Queue selection (the initial receive-job command).
    QueueSelect,
    /// The byte-count-prefixed control file announcement.
    ControlHeader,
    /// The control file contents and their terminator.
    ControlFile,
    /// The byte-count-prefixed data file announcement.
    DataHeader,
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolStep::QueueSelect => "queue select",
            ProtocolStep::ControlHeader => "control file header",
            ProtocolStep::ControlFile => "control file transfer",
            ProtocolStep::DataHeader => "data file header",
        };
        f.write_str(name)
    }
}

/// Errors produced while delivering the finished job to the device.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Every connection attempt failed before the deadline.
    #[error("cannot connect to {host} after {waited_secs}s")]
    ConnectTimeout {
        /// The device host that never answered.
        host: String,
        /// The retry budget that was exhausted, in seconds.
        waited_secs: u64,
    },

    /// The device answered a handshake step with a non-zero status byte.
    #[error("{host} rejected {step} with status {status}")]
    Rejected {
        /// The device host that rejected the job.
        host: String,
        /// The handshake step that failed.
        step: ProtocolStep,
        /// The offending status byte.
        status: u8,
    },

    /// The connection failed mid-transfer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Umbrella error for the whole encode-and-deliver pipeline.
#[derive(Debug, Error)]
pub enum JobError {
    /// The raster encoder rejected the bitmap.
    #[error("raster encoding failed: {0}")]
    Raster(#[from] RasterError),

    /// The vector encoder could not read the instruction stream.
    #[error("vector encoding failed: {0}")]
    Vector(#[from] VectorError),

    /// The delivery client could not hand the job to the device.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// A rasterizer output file could not be opened or read.
    #[error("{}: {source}", path.display())]
    File {
        /// The offending path.
        path: PathBuf,
        /// The underlying system error.
        source: std::io::Error,
    },

    /// A preset file could not be parsed.
    #[error("{}: {source}", path.display())]
    Preset {
        /// The offending path.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },
}
