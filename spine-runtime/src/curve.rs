//! Keyframe interpolation curves.
//!
//! Bezier curves are expanded once, when they are set, into forward-difference coefficients over a
//! fixed number of subdivisions. Evaluation then walks at most `BEZIER_SEGMENTS` micro-segments and
//! interpolates linearly inside the one that contains the query.

const BEZIER_SEGMENTS: usize = 10;

/// Interpolation from one keyframe to the next, as authored.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Curve {
    #[default]
    Linear,
    Stepped,
    Bezier {
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CurveType {
    Linear,
    Stepped,
    Bezier,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct ForwardDifferences {
    dfx: f32,
    dfy: f32,
    ddfx: f32,
    ddfy: f32,
    dddfx: f32,
    dddfy: f32,
}

impl ForwardDifferences {
    fn new(cx1: f32, cy1: f32, cx2: f32, cy2: f32) -> Self {
        let subdiv1 = 1.0 / BEZIER_SEGMENTS as f32;
        let subdiv2 = subdiv1 * subdiv1;
        let subdiv3 = subdiv2 * subdiv1;
        let pre1 = 3.0 * subdiv1;
        let pre2 = 3.0 * subdiv2;
        let pre4 = 6.0 * subdiv2;
        let pre5 = 6.0 * subdiv3;
        let tmp1x = -cx1 * 2.0 + cx2;
        let tmp1y = -cy1 * 2.0 + cy2;
        let tmp2x = (cx1 - cx2) * 3.0 + 1.0;
        let tmp2y = (cy1 - cy2) * 3.0 + 1.0;
        Self {
            dfx: cx1 * pre1 + tmp1x * pre2 + tmp2x * subdiv3,
            dfy: cy1 * pre1 + tmp1y * pre2 + tmp2y * subdiv3,
            ddfx: tmp1x * pre4 + tmp2x * pre5,
            ddfy: tmp1y * pre4 + tmp2y * pre5,
            dddfx: tmp2x * pre5,
            dddfy: tmp2y * pre5,
        }
    }

    fn percent(&self, percent: f32) -> f32 {
        let Self {
            mut dfx,
            mut dfy,
            mut ddfx,
            mut ddfy,
            dddfx,
            dddfy,
        } = *self;
        let mut x = dfx;
        let mut y = dfy;
        let mut remaining = BEZIER_SEGMENTS - 2;
        loop {
            if x >= percent {
                let last_x = x - dfx;
                let last_y = y - dfy;
                let span = x - last_x;
                if span <= 0.0 {
                    return y;
                }
                return last_y + (y - last_y) * (percent - last_x) / span;
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            dfx += ddfx;
            dfy += ddfy;
            ddfx += dddfx;
            ddfy += dddfy;
            x += dfx;
            y += dfy;
        }
        // Last micro-segment always ends at (1, 1).
        let span = 1.0 - x;
        if span <= 0.0 {
            return 1.0;
        }
        y + (1.0 - y) * (percent - x) / span
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum SegmentCurve {
    #[default]
    Linear,
    Stepped,
    Bezier(ForwardDifferences),
}

/// Per-segment curves of a keyframed timeline. Segment `i` runs from frame `i` to frame `i + 1`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveTimeline {
    segments: Vec<SegmentCurve>,
}

impl CurveTimeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            segments: vec![SegmentCurve::Linear; frame_count.saturating_sub(1)],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.segments.len() + 1
    }

    pub fn set_linear(&mut self, frame_index: usize) {
        self.set_segment(frame_index, SegmentCurve::Linear);
    }

    pub fn set_stepped(&mut self, frame_index: usize) {
        self.set_segment(frame_index, SegmentCurve::Stepped);
    }

    /// Sets a cubic bezier for the segment. The control points are given in the unit square, the
    /// curve runs from (0, 0) to (1, 1).
    pub fn set_bezier(&mut self, frame_index: usize, cx1: f32, cy1: f32, cx2: f32, cy2: f32) {
        self.set_segment(
            frame_index,
            SegmentCurve::Bezier(ForwardDifferences::new(cx1, cy1, cx2, cy2)),
        );
    }

    pub fn set_curve(&mut self, frame_index: usize, curve: Curve) {
        match curve {
            Curve::Linear => self.set_linear(frame_index),
            Curve::Stepped => self.set_stepped(frame_index),
            Curve::Bezier { cx1, cy1, cx2, cy2 } => {
                self.set_bezier(frame_index, cx1, cy1, cx2, cy2)
            }
        }
    }

    /// The last frame has no outgoing segment and reports `Linear`.
    pub fn curve_type(&self, frame_index: usize) -> CurveType {
        match self.segments.get(frame_index) {
            Some(SegmentCurve::Stepped) => CurveType::Stepped,
            Some(SegmentCurve::Bezier(_)) => CurveType::Bezier,
            Some(SegmentCurve::Linear) | None => CurveType::Linear,
        }
    }

    /// Remaps a linear `percent` along the segment through the segment's curve.
    pub fn curve_percent(&self, frame_index: usize, percent: f32) -> f32 {
        let percent = percent.clamp(0.0, 1.0);
        match self.segments.get(frame_index) {
            Some(SegmentCurve::Stepped) => 0.0,
            Some(SegmentCurve::Bezier(differences)) => differences.percent(percent),
            Some(SegmentCurve::Linear) | None => percent,
        }
    }

    fn set_segment(&mut self, frame_index: usize, curve: SegmentCurve) {
        if let Some(segment) = self.segments.get_mut(frame_index) {
            *segment = curve;
        }
    }
}
