//! Hand landmark types

/// Landmark indices in the MediaPipe 21-point hand model
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    pub const COUNT: usize = 21;
}

/// Normalized landmark: x, y in [0, 1] of the source frame, z relative depth
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn parse(label: &str) -> Self {
        match label {
            "Left" | "left" => Handedness::Left,
            "Right" | "right" => Handedness::Right,
            _ => Handedness::Unknown,
        }
    }
}

/// One detected hand
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    pub hand: usize,
    pub handedness: Handedness,
    pub score: f32,
    pub landmarks: Vec<Landmark>,
    pub timestamp_ms: u64,
}

impl LandmarkSet {
    pub fn landmark(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied()
    }

    /// Hand whose every landmark sits at `at`; convenient for synthetic input
    pub fn uniform(hand: usize, at: Landmark) -> Self {
        Self {
            hand,
            handedness: Handedness::Unknown,
            score: 1.0,
            landmarks: vec![at; index::COUNT],
            timestamp_ms: 0,
        }
    }
}

/// Result of one detection pass, tagged with the frame it came from
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detections {
    pub frame_sequence: u64,
    pub frame_size: (u32, u32),
    pub hands: Vec<LandmarkSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_is_none() {
        let hand = LandmarkSet::uniform(0, Landmark::new(0.5, 0.5));
        assert_eq!(hand.landmark(index::PINKY_TIP), Some(Landmark::new(0.5, 0.5)));
        assert_eq!(hand.landmark(index::COUNT), None);
    }

    #[test]
    fn handedness_labels() {
        assert_eq!(Handedness::parse("Left"), Handedness::Left);
        assert_eq!(Handedness::parse("right"), Handedness::Right);
        assert_eq!(Handedness::parse("?"), Handedness::Unknown);
    }
}
