//! `hpgl`
//!
//! The vector encoder: replays the instruction stream as pen-plotter
//! commands with power/speed/frequency ramps.

use std::io::BufRead;

use crate::error::VectorError;
use crate::job::PrintJob;
use crate::pjl::{JobBuffer, ESC};
use crate::units::{base_offsets, vector_ramp, PageDims};
use crate::vector::{optimize, parse_directives, replay_vectors, trace_vectors, Directive};

/// Encodes the vector block into the job buffer.
///
/// The instruction stream is parsed once; when travel optimization is
/// enabled the directives are lifted into segments, reordered and replayed.
/// The directive list is then emitted once per output tile (Y tiles outer,
/// X tiles inner) with the tile's translated origin.
///
/// # Arguments
/// * `reader`: The vector instruction stream.
/// * `out`: The job buffer to append to.
/// * `job`: The clamped job configuration.
/// * `page`: Page dimensions, as corrected by the raster stage.
///
/// # Returns
/// `Ok(())` once the block, or at least its idempotent footer, is emitted.
///
/// # Errors
/// [`VectorError`] when the instruction stream cannot be read.
pub fn encode_vector<R: BufRead>(
    reader: R,
    out: &mut JobBuffer,
    job: &PrintJob,
    page: PageDims,
) -> Result<(), VectorError> {
    let mut directives = parse_directives(reader)?;
    if job.vector.optimize {
        let vectors = trace_vectors(&directives, job);
        directives = replay_vectors(&optimize(vectors));
    }
    emit_tiles(&directives, out, job, page);
    Ok(())
}

/// Replays the directive list once per tile and emits the block footers.
fn emit_tiles(directives: &[Directive], out: &mut JobBuffer, job: &PrintJob, page: PageDims) {
    let (base_x, base_y) = base_offsets(job, page);

    // Encoder state survives across tiles; only the preamble is per-tile.
    let mut pen_up = true;
    let mut fresh_move = true;
    let mut started = false;
    let mut power = 100;
    let (mut start_x, mut start_y) = (0, 0);
    let (mut last_x, mut last_y) = (0, 0);

    for tile_y in (0..job.y_repeat).rev() {
        let off_y = page.height * tile_y;
        for tile_x in (0..job.x_repeat).rev() {
            let off_x = page.width * tile_x;
            let mut tile_started = false;
            for directive in directives {
                if !tile_started {
                    tile_started = true;
                    out.emit("IN;");
                    out.emit(&format!("XR{:04};", job.vector.frequency));
                    out.emit(&format!("YP{:03};", job.vector.power));
                    out.emit(&format!("ZS{:03};", job.vector.speed));
                }
                match *directive {
                    Directive::MoveTo { x, y } => {
                        start_x = x;
                        start_y = y;
                        fresh_move = true;
                    }
                    Directive::ClosePath => {
                        // Only meaningful after a line, with the pen down
                        // and away from the subpath start.
                        if !fresh_move && !pen_up && (last_x != start_x || last_y != start_y) {
                            out.emit(&format!(
                                ",{},{}",
                                base_x + off_x + start_x,
                                base_y + off_y + start_y
                            ));
                        }
                    }
                    Directive::Power(level) => {
                        if level != power {
                            power = level;
                            started = true;
                            if !pen_up {
                                out.emit(";PU");
                            }
                            pen_up = true;
                            let ramp = vector_ramp(level, &job.vector);
                            if job.vector.speed < 100 {
                                out.emit(&format!(";ZS{:03};XR{:04};", ramp.speed, ramp.frequency));
                            }
                            out.emit(&format!(";YP{:03};", ramp.power));
                        }
                    }
                    Directive::LineTo { x, y } => {
                        started = true;
                        if fresh_move {
                            if !pen_up {
                                out.emit(";");
                            }
                            out.emit(&format!(
                                "PU{},{}",
                                base_x + off_x + start_x,
                                base_y + off_y + start_y
                            ));
                            pen_up = true;
                            fresh_move = false;
                        }
                        if pen_up {
                            out.emit(";PD");
                        } else {
                            out.emit(",");
                        }
                        pen_up = false;
                        out.emit(&format!("{},{}", base_x + off_x + x, base_y + off_y + y));
                        last_x = x;
                        last_y = y;
                    }
                    Directive::EndOfPage => break,
                }
            }
        }
    }

    if started {
        if !pen_up {
            out.emit(";");
        }
        out.emit(&format!("{ESC}%0B"));
    }
    // Idempotent footer: re-enter plotter mode with the pen up, even when
    // nothing was drawn.
    out.emit(&format!("{ESC}%1BPU"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn vector_job() -> PrintJob {
        let mut job = PrintJob::default();
        job.vector.power = 100;
        job.vector.speed = 100;
        job.vector.frequency = 5000;
        job.vector.optimize = false;
        job
    }

    fn encode(stream: &str, job: &PrintJob, page: PageDims) -> String {
        let mut out = JobBuffer::new();
        encode_vector(Cursor::new(stream.to_owned()), &mut out, job, page).unwrap();
        String::from_utf8(out.into_bytes()).unwrap()
    }

    const PAGE: PageDims = PageDims {
        width: 100,
        height: 50,
    };

    #[test]
    fn test_empty_stream_emits_only_the_footer() {
        let job = vector_job();
        assert_eq!(encode("", &job, PAGE), "\x1b%1BPU");
    }

    #[test]
    fn test_polyline_with_close() {
        let job = vector_job();
        // Draw (0,0) -> (10,0) -> (10,10), then close back to the start.
        let stream = "M0,0\nL0,10\nL10,10\nC\nX\n";
        assert_eq!(
            encode(stream, &job, PAGE),
            "IN;XR5000;YP100;ZS100;PU0,0;PD10,0,10,10,0,0;\x1b%0B\x1b%1BPU"
        );
    }

    #[test]
    fn test_close_at_start_point_is_silent() {
        let job = vector_job();
        let stream = "M0,0\nL0,10\nL0,0\nC\nX\n";
        assert_eq!(
            encode(stream, &job, PAGE),
            "IN;XR5000;YP100;ZS100;PU0,0;PD10,0,0,0;\x1b%0B\x1b%1BPU"
        );
    }

    #[test]
    fn test_power_change_lifts_the_pen() {
        let job = vector_job();
        let stream = "M0,0\nL0,10\nP50\nL0,20\nX\n";
        assert_eq!(
            encode(stream, &job, PAGE),
            "IN;XR5000;YP100;ZS100;PU0,0;PD10,0;PU;YP050;;PD20,0;\x1b%0B\x1b%1BPU"
        );
    }

    #[test]
    fn test_power_change_repeats_are_deduplicated() {
        let job = vector_job();
        let stream = "P100\nM0,0\nP100\nL0,10\nX\n";
        assert_eq!(
            encode(stream, &job, PAGE),
            "IN;XR5000;YP100;ZS100;PU0,0;PD10,0;\x1b%0B\x1b%1BPU",
            "matching the initial power level emits nothing"
        );
    }

    #[test]
    fn test_slow_jobs_emit_speed_and_frequency_ramps() {
        let mut job = vector_job();
        job.vector.speed = 30;
        let stream = "P50\nM0,0\nL0,10\nX\n";
        // Ramp for raw power 50: ratio min(200, 333, 100) = 100, identity.
        assert_eq!(
            encode(stream, &job, PAGE),
            "IN;XR5000;YP100;ZS030;;ZS030;XR5000;;YP050;PU0,0;PD10,0;\x1b%0B\x1b%1BPU"
        );
    }

    #[test]
    fn test_tiles_replay_with_translated_origins() {
        let mut job = vector_job();
        job.x_repeat = 2;
        let stream = "M0,0\nL10,20\nX\n";
        assert_eq!(
            encode(stream, &job, PAGE),
            concat!(
                "IN;XR5000;YP100;ZS100;PU100,0;PD120,10",
                "IN;XR5000;YP100;ZS100;;PU0,0;PD20,10",
                ";\x1b%0B\x1b%1BPU"
            )
        );
    }
}
