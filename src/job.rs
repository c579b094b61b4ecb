//! `job`
//!
//! The print job configuration consumed by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Default bed width (x-axis) in points.
pub const BED_WIDTH_PTS: i32 = 1728;
/// Default bed height (y-axis) in points.
pub const BED_HEIGHT_PTS: i32 = 864;
/// Default print resolution in dots per inch.
pub const RESOLUTION_DEFAULT: i32 = 600;

/// How the raster block interprets bitmap pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RasterMode {
    /// One bit per pixel; a screen has already been applied by the
    /// rasterizer and bytes pass through unchanged.
    #[default]
    Mono,
    /// One byte per pixel; grey level maps to engraving power.
    Grey,
    /// Three bytes per pixel; primary/secondary colours are engraved as
    /// separate passes with lightness mapping to power.
    Colour,
    /// No rasterization at all.
    None,
}

/// Settings for the raster (engraving) stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSettings {
    /// Pixel interpretation mode.
    pub mode: RasterMode,
    /// Engraving power, 0–100. Zero disables the raster block.
    pub power: i32,
    /// Engraving speed, 1–100.
    pub speed: i32,
    /// How many times the raster block is over-printed.
    pub repeat: i32,
    /// Photograph screen size in pixels; 0 selects a simple threshold.
    /// Consumed by the external rasterizer, carried for its interface.
    pub screen_size: i32,
}

impl Default for RasterSettings {
    fn default() -> Self {
        RasterSettings {
            mode: RasterMode::Mono,
            power: 40,
            speed: 100,
            repeat: 1,
            screen_size: 8,
        }
    }
}

/// Settings for the vector (cutting) stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSettings {
    /// Cutting power, 0–100. Zero disables the vector block.
    pub power: i32,
    /// Cutting speed, 1–100.
    pub speed: i32,
    /// Laser pulse frequency, 10–5000 Hz.
    pub frequency: i32,
    /// Whether to reorder cut segments to shorten pen-up travel.
    pub optimize: bool,
}

impl Default for VectorSettings {
    fn default() -> Self {
        VectorSettings {
            power: 50,
            speed: 30,
            frequency: 5000,
            optimize: true,
        }
    }
}

/// Everything the pipeline needs to know about one print job.
///
/// The caller populates this once (command line, preset file, defaults) and
/// the pipeline reads it; the only geometry that ever changes after
/// construction is the page size correction discovered by the raster
/// encoder, which is returned through [`crate::units::PageDims`] rather
/// than written back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    /// Job name, shown on the device and used for spool file naming.
    pub name: String,
    /// User that submitted the job.
    pub user: String,
    /// Print queue to select on the device.
    pub queue: String,
    /// Hostname or address of the device.
    pub host: String,
    /// Page width in points.
    pub width: i32,
    /// Page height in points.
    pub height: i32,
    /// Print resolution in dots per inch, 75–1200.
    pub resolution: i32,
    /// Whether the device should auto-focus before the job.
    pub auto_focus: bool,
    /// Whether the rasterizer mirrors the page along the X axis (for
    /// reverse cuts). Carried for the rasterizer's interface.
    pub flip_x: bool,
    /// Number of copies tiled along the X axis.
    pub x_repeat: i32,
    /// Number of copies tiled along the Y axis.
    pub y_repeat: i32,
    /// X re-centering offset in points; 0 means no re-centering.
    pub x_center: i32,
    /// Y re-centering offset in points; 0 means no re-centering.
    pub y_center: i32,
    /// Raster stage settings.
    pub raster: RasterSettings,
    /// Vector stage settings.
    pub vector: VectorSettings,
}

impl Default for PrintJob {
    fn default() -> Self {
        PrintJob {
            name: String::from("scorch"),
            user: String::from("unknown"),
            queue: String::new(),
            host: String::from("localhost"),
            width: BED_WIDTH_PTS,
            height: BED_HEIGHT_PTS,
            resolution: RESOLUTION_DEFAULT,
            auto_focus: false,
            flip_x: false,
            x_repeat: 1,
            y_repeat: 1,
            x_center: 0,
            y_center: 0,
            raster: RasterSettings::default(),
            vector: VectorSettings::default(),
        }
    }
}

impl PrintJob {
    /// Returns a copy of the job with every numeric field forced into its
    /// valid range.
    ///
    /// Out-of-range values are silently clamped, never rejected; values
    /// already in range are unchanged. The pipeline applies this before
    /// any encoding begins.
    ///
    /// # Returns
    /// The clamped job.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.resolution = self.resolution.clamp(75, 1200);
        self.raster.power = self.raster.power.clamp(0, 100);
        self.raster.speed = self.raster.speed.clamp(1, 100);
        self.raster.repeat = self.raster.repeat.max(1);
        self.raster.screen_size = self.raster.screen_size.max(0);
        self.vector.power = self.vector.power.clamp(0, 100);
        self.vector.speed = self.vector.speed.clamp(1, 100);
        self.vector.frequency = self.vector.frequency.clamp(10, 5000);
        self.x_repeat = self.x_repeat.max(1);
        self.y_repeat = self.y_repeat.max(1);
        self.x_center = self.x_center.max(0);
        self.y_center = self.y_center.max(0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_limits_out_of_range_values() {
        let mut job = PrintJob::default();
        job.resolution = 10_000;
        job.raster.power = -5;
        job.raster.speed = 0;
        job.vector.power = 250;
        job.vector.speed = 101;
        job.vector.frequency = 3;
        job.x_repeat = 0;
        job.y_repeat = -2;
        job.raster.screen_size = -8;

        let job = job.clamped();
        assert_eq!(job.resolution, 1200);
        assert_eq!(job.raster.power, 0);
        assert_eq!(job.raster.speed, 1);
        assert_eq!(job.vector.power, 100);
        assert_eq!(job.vector.speed, 100);
        assert_eq!(job.vector.frequency, 10);
        assert_eq!(job.x_repeat, 1);
        assert_eq!(job.y_repeat, 1);
        assert_eq!(job.raster.screen_size, 0);
    }

    #[test]
    fn test_clamped_keeps_in_range_values() {
        let mut job = PrintJob::default();
        job.resolution = 1200;
        job.vector.frequency = 10;
        job.raster.power = 100;

        let job = job.clamped();
        assert_eq!(job.resolution, 1200, "upper bound is inclusive");
        assert_eq!(job.vector.frequency, 10, "lower bound is inclusive");
        assert_eq!(job.raster.power, 100);
    }
}
