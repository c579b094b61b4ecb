//! `units`
//!
//! Conversions between page space and device space, and the shared
//! power/speed model used by both encoders.

use crate::job::{PrintJob, VectorSettings};

/// Points per inch in page space.
pub const POINTS_PER_INCH: i32 = 72;

/// The page dimensions both encoders tile against.
///
/// Initialised from the configured page size and corrected by the raster
/// encoder when the bitmap header disagrees (the rasterizer may have
/// resized the page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDims {
    /// Page width; points before the raster stage runs, device dots after.
    pub width: i32,
    /// Page height; points before the raster stage runs, device dots after.
    pub height: i32,
}

impl PageDims {
    /// The configured page dimensions of a job, before any correction.
    pub fn of_job(job: &PrintJob) -> Self {
        PageDims {
            width: job.width,
            height: job.height,
        }
    }
}

/// Computes the device-dot offsets implied by the job's re-centering
/// configuration.
///
/// A centering offset of 0 means "not re-centered". The base offset is
/// `center - dimension / 2`, clamped to the bed, then scaled from points
/// to dots at the job resolution.
///
/// # Arguments
/// * `job`: The job configuration.
/// * `page`: Current page dimensions.
///
/// # Returns
/// `(base_x, base_y)` in device dots.
pub fn base_offsets(job: &PrintJob, page: PageDims) -> (i32, i32) {
    let mut base_x = 0;
    let mut base_y = 0;
    if job.x_center != 0 {
        base_x = job.x_center - page.width / 2;
    }
    if job.y_center != 0 {
        base_y = job.y_center - page.height / 2;
    }
    base_x = base_x.max(0);
    base_y = base_y.max(0);
    (
        base_x * job.resolution / POINTS_PER_INCH,
        base_y * job.resolution / POINTS_PER_INCH,
    )
}

/// Scales a raw 0–100 power value by a 0–100 setting, rounded.
pub fn scale_power(raw: i32, setting: i32) -> i32 {
    (raw * setting + 50) / 100
}

/// The effective power, speed and frequency for one pen power level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorRamp {
    /// Effective device power.
    pub power: i32,
    /// Effective device speed.
    pub speed: i32,
    /// Effective pulse frequency.
    pub frequency: i32,
}

/// Derives the effective power/speed/frequency for a requested pen power.
///
/// The power is the raw value scaled to the configured vector power. When
/// the configured speed is below 100 and there is power to deliver at a
/// partial raw power, all three values are additionally rescaled by the
/// smallest of the three headroom ratios (power, speed and frequency), so
/// that slow cuts at partial power keep their energy per distance. The
/// rescale is `v' = (50 + v * ratio) / 100` with `ratio` in hundredths.
///
/// # Arguments
/// * `raw_power`: The pen power requested by the instruction stream, 0–100.
/// * `vector`: The job's vector settings (already clamped).
///
/// # Returns
/// The effective [`VectorRamp`].
pub fn vector_ramp(raw_power: i32, vector: &VectorSettings) -> VectorRamp {
    let mut power = scale_power(raw_power, vector.power);
    let mut speed = vector.speed;
    let mut frequency = vector.frequency;

    if vector.speed < 100 && power > 0 && raw_power < 100 {
        let mut ratio = 10_000 / raw_power;
        ratio = ratio.min(10_000 / speed);
        ratio = ratio.min(500_000 / frequency);
        power = (50 + power * ratio) / 100;
        speed = (50 + speed * ratio) / 100;
        frequency = (50 + frequency * ratio) / 100;
    }

    VectorRamp {
        power,
        speed,
        frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PrintJob;

    #[test]
    fn test_base_offsets() {
        let mut job = PrintJob::default();
        job.resolution = 600;
        let page = PageDims {
            width: 100,
            height: 50,
        };

        assert_eq!(base_offsets(&job, page), (0, 0), "no re-centering");

        job.x_center = 100;
        job.y_center = 40;
        assert_eq!(
            base_offsets(&job, page),
            (50 * 600 / 72, 15 * 600 / 72),
            "centered offsets scale to dots"
        );

        job.x_center = 10;
        assert_eq!(
            base_offsets(&job, page).0,
            0,
            "offsets clamp at the bed edge"
        );
    }

    #[test]
    fn test_scale_power_rounds() {
        assert_eq!(scale_power(50, 100), 50);
        assert_eq!(scale_power(50, 50), 25);
        assert_eq!(scale_power(1, 50), 1, "0.5 rounds up");
        assert_eq!(scale_power(0, 100), 0);
        assert_eq!(scale_power(100, 33), 33);
    }

    #[test]
    fn test_vector_ramp_full_speed_is_plain_scaling() {
        let vector = VectorSettings {
            power: 80,
            speed: 100,
            frequency: 5000,
            optimize: true,
        };
        assert_eq!(
            vector_ramp(50, &vector),
            VectorRamp {
                power: 40,
                speed: 100,
                frequency: 5000,
            }
        );
    }

    #[test]
    fn test_vector_ramp_derates_at_partial_power() {
        let vector = VectorSettings {
            power: 100,
            speed: 30,
            frequency: 500,
            optimize: true,
        };
        // Ratios: 10000/50 = 200, 10000/30 = 333, 500000/500 = 1000.
        let ramp = vector_ramp(50, &vector);
        assert_eq!(
            ramp,
            VectorRamp {
                power: 100,
                speed: 60,
                frequency: 1000,
            }
        );
    }

    #[test]
    fn test_vector_ramp_unit_ratio_is_identity() {
        let vector = VectorSettings {
            power: 100,
            speed: 50,
            frequency: 5000,
            optimize: true,
        };
        // Ratios: 200, 200, 100 -> minimum 100 leaves values unchanged.
        let ramp = vector_ramp(50, &vector);
        assert_eq!(
            ramp,
            VectorRamp {
                power: 50,
                speed: 50,
                frequency: 5000,
            }
        );
    }

    #[test]
    fn test_vector_ramp_skips_zero_power() {
        let vector = VectorSettings {
            power: 100,
            speed: 30,
            frequency: 5000,
            optimize: true,
        };
        let ramp = vector_ramp(0, &vector);
        assert_eq!(ramp.power, 0);
        assert_eq!(ramp.speed, 30, "no derating without power");
    }
}
