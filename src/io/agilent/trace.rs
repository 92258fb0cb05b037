/// A single point of a [`Trace`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracePoint {
    /// Retention time in minutes
    pub time: f64,
    pub intensity: f64,
}

impl From<(f64, f64)> for TracePoint {
    fn from((time, intensity): (f64, f64)) -> Self {
        Self { time, intensity }
    }
}

/// A time series of signal over the course of a run, one point per scan
/// for the total ion chromatogram, or one point per sample for a detector
/// channel.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trace {
    pub time: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl Trace {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: f64, intensity: f64) {
        self.time.push(time);
        self.intensity.push(intensity);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TracePoint> {
        Some(TracePoint {
            time: *self.time.get(index)?,
            intensity: *self.intensity.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = TracePoint> + '_ {
        self.time
            .iter()
            .zip(self.intensity.iter())
            .map(|(t, i)| TracePoint {
                time: *t,
                intensity: *i,
            })
    }

    /// The first and last time points, if any
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }

    /// Whether the time axis is strictly increasing
    pub fn is_strictly_increasing(&self) -> bool {
        self.time.windows(2).all(|w| w[0] < w[1])
    }

    /// Sum of intensity over the trace
    pub fn total(&self) -> f64 {
        self.intensity.iter().sum()
    }
}

impl FromIterator<TracePoint> for Trace {
    fn from_iter<T: IntoIterator<Item = TracePoint>>(iter: T) -> Self {
        let mut trace = Trace::default();
        for p in iter {
            trace.push(p.time, p.intensity);
        }
        trace
    }
}

impl FromIterator<(f64, f64)> for Trace {
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        iter.into_iter().map(TracePoint::from).collect()
    }
}
