//! `vector`
//!
//! The vector instruction stream and the in-memory path model.
//!
//! The external rasterizer emits one ASCII line per drawing operation; this
//! module parses those lines into [`Directive`]s, lifts the directives into
//! cut segments ([`Vector`]s) and reorders the segments to shorten pen-up
//! travel before they are re-encoded for the device.

use std::io::BufRead;
use std::mem;

use crate::error::VectorError;
use crate::job::PrintJob;

/// One parsed line of the vector instruction stream.
///
/// Coordinates are integer page positions in device dots. Note that the
/// stream writes each pair as `Y,X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Start a new subpath at the given point.
    MoveTo {
        /// Horizontal position in dots.
        x: i32,
        /// Vertical position in dots.
        y: i32,
    },
    /// Cut a straight line from the current point to the given point.
    LineTo {
        /// Horizontal position in dots.
        x: i32,
        /// Vertical position in dots.
        y: i32,
    },
    /// Cut back to the start of the current subpath if away from it.
    ClosePath,
    /// Change the pen power for subsequent cuts.
    Power(i32),
    /// End of the page; nothing after this is replayed.
    EndOfPage,
}

/// A point in device dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
}

/// One cut segment with its assigned output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vector {
    /// Where the cut begins.
    pub start: Point,
    /// Where the cut ends.
    pub end: Point,
    /// Pen power assigned when the segment was traced.
    pub power: i32,
    /// Cut speed assigned when the segment was traced.
    pub speed: i32,
    /// Colour separation pass; 0 outside colour mode.
    pub pass: i32,
}

/// Parses the vector instruction stream into directives.
///
/// Each line starts with a tag character (`M`, `L`, `C`, `P` or the end
/// marker `X`); remaining text holds decimal integer arguments, written
/// `Y,X` for coordinate pairs. Lines with an unknown tag or unparsable
/// arguments are skipped; parsing stops at the end marker.
///
/// # Arguments
/// * `reader`: The instruction stream.
///
/// # Returns
/// The directives in stream order.
///
/// # Errors
/// Any I/O error from the underlying reader.
pub fn parse_directives<R: BufRead>(reader: R) -> Result<Vec<Directive>, VectorError> {
    let mut directives = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let Some(tag) = line.chars().next() else {
            continue;
        };
        if !tag.is_ascii_alphabetic() {
            continue;
        }
        let args = &line[1..];
        match tag {
            'M' => {
                if let Some((y, x)) = parse_pair(args) {
                    directives.push(Directive::MoveTo { x, y });
                }
            }
            'L' => {
                if let Some((y, x)) = parse_pair(args) {
                    directives.push(Directive::LineTo { x, y });
                }
            }
            'C' => directives.push(Directive::ClosePath),
            'P' => {
                if let Ok(power) = args.trim().parse() {
                    directives.push(Directive::Power(power));
                }
            }
            'X' => {
                directives.push(Directive::EndOfPage);
                break;
            }
            _ => {}
        }
    }
    Ok(directives)
}

/// Parses a `Y,X` integer pair.
fn parse_pair(args: &str) -> Option<(i32, i32)> {
    let (first, second) = args.split_once(',')?;
    Some((first.trim().parse().ok()?, second.trim().parse().ok()?))
}

/// Lifts a directive list into cut segments.
///
/// Mirrors the encoder's state machine: a move sets the subpath start, a
/// line produces one segment from the current point, a close produces the
/// segment back to the subpath start when the pen has drawn and sits away
/// from it, and power changes stamp subsequent segments.
///
/// # Arguments
/// * `directives`: The parsed instruction stream.
/// * `job`: The job configuration (supplies the assigned speed).
///
/// # Returns
/// The traced segments in stream order.
pub fn trace_vectors(directives: &[Directive], job: &PrintJob) -> Vec<Vector> {
    let mut vectors = Vec::new();
    let mut subpath_start = Point { x: 0, y: 0 };
    let mut current = Point { x: 0, y: 0 };
    let mut power = 100;
    let mut drawn = false;

    for directive in directives {
        match *directive {
            Directive::MoveTo { x, y } => {
                subpath_start = Point { x, y };
                current = subpath_start;
                drawn = false;
            }
            Directive::LineTo { x, y } => {
                let target = Point { x, y };
                vectors.push(Vector {
                    start: current,
                    end: target,
                    power,
                    speed: job.vector.speed,
                    pass: 0,
                });
                current = target;
                drawn = true;
            }
            Directive::ClosePath => {
                if drawn && current != subpath_start {
                    vectors.push(Vector {
                        start: current,
                        end: subpath_start,
                        power,
                        speed: job.vector.speed,
                        pass: 0,
                    });
                    current = subpath_start;
                }
            }
            Directive::Power(level) => power = level,
            Directive::EndOfPage => break,
        }
    }

    vectors
}

/// Turns an ordered segment list back into a directive stream.
///
/// Power changes are emitted only on transitions, and the move is elided
/// when a segment begins exactly where the previous one ended, so chains
/// of touching segments stay a single polyline on the device.
///
/// # Arguments
/// * `vectors`: The ordered segments.
///
/// # Returns
/// An equivalent directive stream.
pub fn replay_vectors(vectors: &[Vector]) -> Vec<Directive> {
    let mut directives = Vec::new();
    let mut power = 100;
    let mut pen: Option<Point> = None;

    for vector in vectors {
        if vector.power != power {
            directives.push(Directive::Power(vector.power));
            power = vector.power;
        }
        if pen != Some(vector.start) {
            directives.push(Directive::MoveTo {
                x: vector.start.x,
                y: vector.start.y,
            });
        }
        directives.push(Directive::LineTo {
            x: vector.end.x,
            y: vector.end.y,
        });
        pen = Some(vector.end);
    }

    directives
}

/// Reorders segments to shorten cumulative pen-up travel.
///
/// Greedy nearest-neighbor: starting with the pen at the origin, repeatedly
/// pick the remaining segment whose nearer endpoint is closest to the pen,
/// flip it when entered from its end, and move the pen to its far endpoint.
/// Selection is a linear scan with `swap_remove`, O(n²) overall, which
/// holds up fine for jobs of a few thousand segments and never allocates
/// during selection.
///
/// The result is a permutation of the input: no segment is created, merged
/// or dropped, though a segment's stored direction may be flipped.
///
/// # Arguments
/// * `vectors`: The segments to reorder.
///
/// # Returns
/// The reordered segments.
#[must_use]
pub fn optimize(mut vectors: Vec<Vector>) -> Vec<Vector> {
    let mut ordered = Vec::with_capacity(vectors.len());
    let mut pen = Point { x: 0, y: 0 };

    while !vectors.is_empty() {
        let mut best = 0;
        let mut flip = false;
        let mut best_distance = i64::MAX;
        for (index, vector) in vectors.iter().enumerate() {
            let from_start = distance_squared(pen, vector.start);
            if from_start < best_distance {
                best = index;
                flip = false;
                best_distance = from_start;
            }
            let from_end = distance_squared(pen, vector.end);
            if from_end < best_distance {
                best = index;
                flip = true;
                best_distance = from_end;
            }
        }

        let mut vector = vectors.swap_remove(best);
        if flip {
            mem::swap(&mut vector.start, &mut vector.end);
        }
        pen = vector.end;
        ordered.push(vector);
    }

    ordered
}

/// Squared Euclidean distance between two points.
fn distance_squared(a: Point, b: Point) -> i64 {
    let dx = i64::from(a.x - b.x);
    let dy = i64::from(a.y - b.y);
    dx * dx + dy * dy
}
