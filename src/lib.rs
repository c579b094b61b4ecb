//! `scorch`
//!
//! A print driver for Epilog laser engravers.
//!
//! An external interpreter rasterizes the submitted PostScript into a
//! device bitmap and a vector instruction stream; scorch transcodes the
//! pair into the engraver's command language (a compressed power-scaled
//! raster block and a pen-plotter vector block framed by printer job
//! language escapes) and delivers the result over the line-printer
//! protocol.

pub mod bitmap;
pub mod error;
pub mod hpgl;
pub mod job;
pub mod lpd;
pub mod pjl;
pub mod raster;
pub mod units;
pub mod vector;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::info;

pub use error::{DeliveryError, JobError, RasterError, VectorError};
pub use job::{PrintJob, RasterMode, RasterSettings, VectorSettings};
pub use lpd::{JobTicket, LpdClient};
pub use pjl::JobBuffer;

/// Builds the complete device job from the rasterizer's two outputs.
///
/// The configuration is clamped into its valid ranges first; encoding then
/// proceeds in strict order (raster, vector, framing) and stops at the
/// first failure.
///
/// # Arguments
/// * `job`: The job configuration.
/// * `bitmap`: The device bitmap.
/// * `vectors`: The vector instruction stream.
///
/// # Returns
/// The framed job bytes, ready for delivery.
///
/// # Errors
/// [`JobError`] from the first stage that fails.
pub fn build_job<R: Read + Seek, V: Read>(
    job: &PrintJob,
    bitmap: &mut R,
    vectors: V,
) -> Result<Vec<u8>, JobError> {
    let job = job.clone().clamped();
    let buffer = pjl::frame(&job, bitmap, BufReader::new(vectors))?;
    Ok(buffer.into_bytes())
}

/// Builds the job from the rasterizer's output files on disk and sends it
/// to the configured device.
///
/// # Arguments
/// * `job`: The job configuration.
/// * `bitmap_path`: Path of the device bitmap file.
/// * `vector_path`: Path of the vector instruction file.
///
/// # Returns
/// `Ok(())` once the device has accepted the whole job.
///
/// # Errors
/// [`JobError`] if a file cannot be opened, a stage fails to encode, or
/// delivery fails.
pub fn print_files(job: &PrintJob, bitmap_path: &Path, vector_path: &Path) -> Result<(), JobError> {
    let job = job.clone().clamped();
    info!(
        "job: {} ({}) raster: speed={} power={} dpi={} vector: speed={} power={} freq={}",
        job.name,
        job.user,
        job.raster.speed,
        job.raster.power,
        job.resolution,
        job.vector.speed,
        job.vector.power,
        job.vector.frequency,
    );

    let mut bitmap = open(bitmap_path)?;
    let vectors = open(vector_path)?;
    let data = build_job(&job, &mut bitmap, vectors)?;

    let ticket = JobTicket::from_job(&job);
    LpdClient::new(&job.host).send(&ticket, &data)?;
    Ok(())
}

/// Opens a rasterizer output file, attaching the path to any failure.
fn open(path: &Path) -> Result<File, JobError> {
    File::open(path).map_err(|source| JobError::File {
        path: path.to_path_buf(),
        source,
    })
}
