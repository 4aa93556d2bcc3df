//! Segment planning

use crate::error::{MlError, MlResult};

/// One analysis window on the input timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First sample covered
    pub start: usize,
    /// Window length (always the model segment length)
    pub length: usize,
}

impl Segment {
    /// Number of samples of this window that fall inside `total_length`
    pub fn valid_length(&self, total_length: usize) -> usize {
        self.length.min(total_length.saturating_sub(self.start))
    }
}

/// Ordered windows covering a recording
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segments: Vec<Segment>,
    pub total_length: usize,
    pub segment_length: usize,
    pub stride: usize,
}

impl SegmentPlan {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn starts(&self) -> Vec<usize> {
        self.segments.iter().map(|s| s.start).collect()
    }
}

/// Splits a recording into overlapping fixed-length windows
pub struct SegmentPlanner;

impl SegmentPlanner {
    /// Plan windows of `segment_length` samples over `total_length` samples
    ///
    /// Consecutive windows start `round(segment_length * (1 - overlap))` samples
    /// apart (at least 1). The last window may extend past the end; the
    /// overhang is zero-padded when the window is sliced.
    pub fn plan(total_length: usize, segment_length: usize, overlap: f32) -> MlResult<SegmentPlan> {
        if !(0.0..1.0).contains(&overlap) {
            return Err(MlError::InvalidConfiguration(format!(
                "overlap must be in [0, 1), got {}",
                overlap
            )));
        }
        if segment_length == 0 {
            return Err(MlError::InvalidConfiguration(
                "segment length must be positive".into(),
            ));
        }
        if total_length == 0 {
            return Err(MlError::InvalidConfiguration(
                "cannot plan segments for empty audio".into(),
            ));
        }

        let stride = ((segment_length as f64 * (1.0 - overlap as f64)).round() as usize).max(1);

        let segments = (0..total_length)
            .step_by(stride)
            .map(|start| Segment {
                start,
                length: segment_length,
            })
            .collect();

        Ok(SegmentPlan {
            segments,
            total_length,
            segment_length,
            stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_scenario() {
        let plan = SegmentPlanner::plan(9, 4, 0.5).unwrap();
        assert_eq!(plan.stride, 2);
        assert_eq!(plan.starts(), vec![0, 2, 4, 6, 8]);
        assert!(plan.segments.iter().all(|s| s.length == 4));
        assert_eq!(plan.segments[4].valid_length(9), 1);
    }

    #[test]
    fn test_plan_shorter_than_segment() {
        let plan = SegmentPlanner::plan(3, 10, 0.25).unwrap();
        assert_eq!(plan.starts(), vec![0]);
        assert_eq!(plan.segments[0].valid_length(3), 3);
    }

    #[test]
    fn test_plan_no_overlap() {
        let plan = SegmentPlanner::plan(8, 4, 0.0).unwrap();
        assert_eq!(plan.starts(), vec![0, 4]);
    }

    #[test]
    fn test_plan_covers_every_sample() {
        for &(total, seg, overlap) in &[(100, 7, 0.25), (343, 50, 0.9), (1, 1, 0.0), (17, 3, 0.5)] {
            let plan = SegmentPlanner::plan(total, seg, overlap).unwrap();
            assert_eq!(plan.segments[0].start, 0);
            let mut covered = vec![false; total];
            for s in &plan.segments {
                for pos in s.start..(s.start + s.valid_length(total)) {
                    covered[pos] = true;
                }
            }
            assert!(covered.iter().all(|&c| c), "gap in plan {:?}", (total, seg, overlap));
        }
    }

    #[test]
    fn test_plan_stride_minimum() {
        let plan = SegmentPlanner::plan(5, 2, 0.9).unwrap();
        assert_eq!(plan.stride, 1);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_plan_rejects_invalid() {
        assert!(SegmentPlanner::plan(10, 4, 1.0).is_err());
        assert!(SegmentPlanner::plan(10, 4, -0.1).is_err());
        assert!(SegmentPlanner::plan(10, 0, 0.25).is_err());
        assert!(matches!(
            SegmentPlanner::plan(0, 4, 0.25),
            Err(MlError::InvalidConfiguration(_))
        ));
    }
}
