//! Multi-cycle wavetables with bilinear lookup.
//!
//! A [`Wavetable`] is an immutable rows×columns grid: each row holds one
//! cycle of a waveform, and morphing between rows is a fractional
//! "wave number" in row units. [`WavetableNode`] samples the table with a
//! phase signal (cycles) on one axis and a wave-number signal on the other,
//! interpolating linearly along both.

use std::rc::Rc;

use libm::floorf;

use ondular_graph::{
    Block, EvalContext, GraphError, NamedSources, NodeId, NodeRef, SignalNode,
};

use crate::Result;

/// How out-of-range wave numbers map back onto table rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    /// Modulo the row count, so `number + rows` reads the same row.
    #[default]
    Wrap,
    /// Reflect at the first and last row.
    Bounce,
    /// Saturate to the first or last row.
    Clamp,
    /// Emit 0 for any number outside `0..=rows-1`.
    Zero,
}

/// Immutable rows×columns waveform grid.
#[derive(Clone, Debug)]
pub struct Wavetable {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Wavetable {
    /// Builds a table from per-row cycles. All rows must be the same
    /// non-zero length.
    pub fn from_cycles(cycles: Vec<Vec<f32>>) -> Result<Self> {
        let rows = cycles.len();
        if rows == 0 {
            return Err(GraphError::MalformedWavetable {
                reason: "no cycles given".to_owned(),
            }
            .into());
        }
        let cols = cycles[0].len();
        if cols == 0 {
            return Err(GraphError::MalformedWavetable {
                reason: "cycle 0 is empty".to_owned(),
            }
            .into());
        }
        for (row, cycle) in cycles.iter().enumerate() {
            if cycle.len() != cols {
                return Err(GraphError::MalformedWavetable {
                    reason: format!(
                        "cycle {row} has {} samples, expected {cols}",
                        cycle.len()
                    ),
                }
                .into());
            }
        }

        let mut data = Vec::with_capacity(rows * cols);
        for cycle in &cycles {
            data.extend_from_slice(cycle);
        }
        Ok(Self { data, rows, cols })
    }

    /// Builds a table from a flat row-major buffer with explicit dimensions.
    pub fn from_flat(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(GraphError::MalformedWavetable {
                reason: format!(
                    "flat buffer of {} samples does not form {rows}x{cols}",
                    data.len()
                ),
            }
            .into());
        }
        Ok(Self { data, rows, cols })
    }

    /// Loads a mono multi-cycle WAV asset, slicing it into `slices` equal
    /// rows. `ratio` rescales each row's length by linear resampling
    /// (e.g. 0.5 halves the column count).
    pub fn from_wav<P: AsRef<std::path::Path>>(
        path: P,
        slices: usize,
        ratio: Option<f32>,
    ) -> Result<Self> {
        let (samples, _spec) = ondular_io::read_wav_mono(&path)?;
        if slices == 0 || samples.is_empty() || samples.len() % slices != 0 {
            return Err(GraphError::MalformedWavetable {
                reason: format!(
                    "{} samples cannot be sliced into {slices} equal cycles",
                    samples.len()
                ),
            }
            .into());
        }
        let cols = samples.len() / slices;

        let mut cycles: Vec<Vec<f32>> = samples.chunks(cols).map(<[f32]>::to_vec).collect();
        if let Some(ratio) = ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(GraphError::MalformedWavetable {
                    reason: format!("resample ratio {ratio} is not positive"),
                }
                .into());
            }
            let new_cols = ((cols as f32) * ratio).round().max(1.0) as usize;
            cycles = cycles
                .into_iter()
                .map(|cycle| resample_cycle(&cycle, new_cols))
                .collect();
        }

        tracing::debug!(
            rows = cycles.len(),
            cols = cycles[0].len(),
            "wavetable loaded"
        );
        Self::from_cycles(cycles)
    }

    /// Number of rows (cycles).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Samples per cycle.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Bilinear lookup: `phase` in cycles (fractional part used), `number`
    /// in row units mapped through `wrap`.
    pub fn lookup(&self, phase: f32, number: f32, wrap: WrapMode) -> f32 {
        let cols = self.cols as f32;
        let mut col = (phase - floorf(phase)) * cols;
        if col >= cols {
            col -= cols;
        }
        let c0 = col as usize;
        let cfrac = col - c0 as f32;
        let c1 = (c0 + 1) % self.cols;

        let last = (self.rows - 1) as f32;
        let mut row = match wrap {
            WrapMode::Wrap => {
                let r = self.rows as f32;
                let mut n = number % r;
                if n < 0.0 {
                    n += r;
                }
                n
            }
            WrapMode::Bounce => {
                if self.rows == 1 {
                    0.0
                } else {
                    let period = 2.0 * last;
                    let mut n = number % period;
                    if n < 0.0 {
                        n += period;
                    }
                    if n > last { period - n } else { n }
                }
            }
            WrapMode::Clamp => number.clamp(0.0, last),
            WrapMode::Zero => {
                if number < 0.0 || number > last {
                    return 0.0;
                }
                number
            }
        };
        if row >= self.rows as f32 {
            row -= self.rows as f32;
        }
        let r0 = row as usize;
        let rfrac = row - r0 as f32;
        let r1 = match wrap {
            WrapMode::Wrap => (r0 + 1) % self.rows,
            _ => (r0 + 1).min(self.rows - 1),
        };

        let at = |r: usize, c: usize| self.data[r * self.cols + c];
        let top = at(r0, c0) * (1.0 - cfrac) + at(r0, c1) * cfrac;
        let bottom = at(r1, c0) * (1.0 - cfrac) + at(r1, c1) * cfrac;
        top * (1.0 - rfrac) + bottom * rfrac
    }
}

/// Linear resampling of one cycle, treating it as periodic.
fn resample_cycle(cycle: &[f32], new_len: usize) -> Vec<f32> {
    let src_len = cycle.len();
    (0..new_len)
        .map(|j| {
            let pos = j as f32 * src_len as f32 / new_len as f32;
            let i0 = pos as usize % src_len;
            let i1 = (i0 + 1) % src_len;
            let frac = pos - floorf(pos);
            cycle[i0] * (1.0 - frac) + cycle[i1] * frac
        })
        .collect()
}

/// Samples a shared [`Wavetable`] from a phase source and a wave-number
/// source.
///
/// Ends when either source ends.
pub struct WavetableNode {
    id: NodeId,
    name: String,
    table: Rc<Wavetable>,
    phase: NodeRef,
    number: NodeRef,
    wrap: WrapMode,
    sample_rate: Option<f32>,
}

impl WavetableNode {
    /// Creates a lookup node over the given table.
    pub fn new(
        name: &str,
        table: Rc<Wavetable>,
        phase: NodeRef,
        number: NodeRef,
        wrap: WrapMode,
    ) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_owned(),
            table,
            phase,
            number,
            wrap,
            sample_rate: None,
        }
    }

    /// The table being read.
    pub fn table(&self) -> Rc<Wavetable> {
        self.table.clone()
    }
}

impl SignalNode for WavetableNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }

        let phase = self.phase.borrow_mut().sample(ctx, count);
        let number = self.number.borrow_mut().sample(ctx, count);
        let (Some(phase), Some(number)) = (phase, number) else {
            ctx.store(self.id, None);
            return None;
        };

        let buf: Vec<f32> = phase
            .iter()
            .zip(number.iter())
            .map(|(&p, &n)| self.table.lookup(p, n, self.wrap))
            .collect();
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![
            ("phase".to_owned(), self.phase.clone()),
            ("number".to_owned(), self.number.clone()),
        ]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}
