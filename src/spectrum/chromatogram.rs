/// A single (retention time, intensity) sample of a chromatogram
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromatogramPoint {
    pub retention_time: f64,
    pub intensity: f64,
}

/**
An intensity-over-time trace such as the total ion current of a run.

An empty `id` with no points is the chromatogram counterpart of the empty
spectrum sentinel.
*/
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chromatogram {
    pub id: String,
    pub points: Vec<ChromatogramPoint>,
}

impl Chromatogram {
    pub fn new(id: String, points: Vec<ChromatogramPoint>) -> Self {
        Self { id, points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Discard the current points and replace them with `count` zeroed points
    pub fn resize(&mut self, count: usize) {
        self.points = vec![ChromatogramPoint::default(); count];
    }

    pub fn start_time(&self) -> Option<f64> {
        self.points.first().map(|p| p.retention_time)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.points.last().map(|p| p.retention_time)
    }

    /// The point with the greatest intensity
    pub fn apex(&self) -> Option<&ChromatogramPoint> {
        self.points
            .iter()
            .reduce(|best, p| if p.intensity > best.intensity { p } else { best })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_time_interval() {
        let mut chrom = Chromatogram::new("TIC".into(), Vec::new());
        assert!(chrom.start_time().is_none());
        chrom.points = vec![
            ChromatogramPoint { retention_time: 0.5, intensity: 10.0 },
            ChromatogramPoint { retention_time: 1.0, intensity: 30.0 },
            ChromatogramPoint { retention_time: 1.5, intensity: 20.0 },
        ];
        assert_eq!(chrom.count(), 3);
        assert_eq!(chrom.start_time(), Some(0.5));
        assert_eq!(chrom.end_time(), Some(1.5));
        assert_eq!(chrom.apex().map(|p| p.retention_time), Some(1.0));
    }
}
