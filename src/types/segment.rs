//! Behavioral segment data structures

use serde::{Deserialize, Serialize};

/// Rule-derived behavioral segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    PowerUsers,
    AtRisk,
    Dormant,
    NewUsers,
    Engaged,
}

impl Segment {
    /// Segments in report order
    pub const REPORT_ORDER: [Segment; 5] = [
        Segment::PowerUsers,
        Segment::AtRisk,
        Segment::Dormant,
        Segment::NewUsers,
        Segment::Engaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::PowerUsers => "power_users",
            Segment::AtRisk => "at_risk",
            Segment::Dormant => "dormant",
            Segment::NewUsers => "new_users",
            Segment::Engaged => "engaged",
        }
    }
}

/// Per-segment aggregate over one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment: Segment,
    pub count: usize,
    /// Share of the batch, rounded to 1 decimal place
    pub percentage: f64,
    /// Up to five member ids for display
    pub sample_users: Vec<String>,
}

/// Segmentation result for a batch of users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub total_users: usize,
    pub segments: Vec<SegmentStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<crate::types::prediction::RejectedRecord>,
}

impl SegmentReport {
    /// Stats for one segment
    pub fn get(&self, segment: Segment) -> Option<&SegmentStats> {
        self.segments.iter().find(|s| s.segment == segment)
    }
}
