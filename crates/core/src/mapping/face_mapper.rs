use std::fmt;

use crate::mapping::face_tracker::{FaceTracker, TrackingConfig};
use crate::shared::detected_face::{DetectedFace, SourceIdentity};
use crate::shared::embedding::cosine_similarity;
use crate::shared::error::SwapError;

/// Which detected faces in a frame get swapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TargetSelection {
    /// Every detected face.
    All,
    /// The largest face.
    #[default]
    Primary,
    Leftmost,
    Rightmost,
    /// The two largest faces, left to right.
    Pair,
    /// The same person across frames, followed by embedding.
    Tracked,
}

impl TargetSelection {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" | "many" => Some(Self::All),
            "primary" | "one" => Some(Self::Primary),
            "left" | "leftmost" => Some(Self::Leftmost),
            "right" | "rightmost" => Some(Self::Rightmost),
            "pair" | "two" => Some(Self::Pair),
            "tracked" | "track" => Some(Self::Tracked),
            _ => None,
        }
    }
}

impl fmt::Display for TargetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Primary => "primary",
            Self::Leftmost => "left",
            Self::Rightmost => "right",
            Self::Pair => "pair",
            Self::Tracked => "tracked",
        };
        f.write_str(name)
    }
}

/// How source identities are assigned to selected targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IdentityAssignment {
    /// k-th target (left to right) gets the k-th source; extra targets
    /// reuse the last source.
    #[default]
    DetectionOrder,
    /// Each target gets the source whose embedding is most similar.
    NearestEmbedding,
}

impl IdentityAssignment {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "order" | "detection-order" => Some(Self::DetectionOrder),
            "nearest" | "nearest-embedding" => Some(Self::NearestEmbedding),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct MappingConfig {
    pub selection: TargetSelection,
    pub assignment: IdentityAssignment,
    /// Reverse the source order under detection-order assignment.
    pub flip: bool,
    pub tracking: TrackingConfig,
}

/// `(target face index, source identity index)` pairs for one frame.
///
/// Each target index appears at most once.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FaceMapping {
    pairs: Vec<(usize, usize)>,
}

impl FaceMapping {
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Decides, per frame, which faces are swapped and to which identity.
pub struct FaceMapper {
    config: MappingConfig,
    sources: Vec<SourceIdentity>,
    tracker: FaceTracker,
}

impl FaceMapper {
    pub fn new(config: MappingConfig, sources: Vec<SourceIdentity>) -> Result<Self, SwapError> {
        if sources.is_empty() {
            return Err(SwapError::InvalidInput(
                "at least one source identity is required".into(),
            ));
        }
        let tracker = FaceTracker::new(config.tracking.clone());
        Ok(Self {
            config,
            sources,
            tracker,
        })
    }

    pub fn sources(&self) -> &[SourceIdentity] {
        &self.sources
    }

    /// Map the faces of one frame. `faces` must be in analyser order.
    pub fn map(&mut self, faces: &[DetectedFace]) -> FaceMapping {
        let targets = self.select(faces);
        let pairs = match self.config.assignment {
            IdentityAssignment::DetectionOrder => {
                let last = self.sources.len() - 1;
                targets
                    .into_iter()
                    .enumerate()
                    .map(|(k, target)| {
                        let slot = k.min(last);
                        let source = if self.config.flip { last - slot } else { slot };
                        (target, source)
                    })
                    .collect()
            }
            IdentityAssignment::NearestEmbedding => targets
                .into_iter()
                .map(|target| (target, self.nearest_source(&faces[target])))
                .collect(),
        };
        FaceMapping { pairs }
    }

    fn select(&mut self, faces: &[DetectedFace]) -> Vec<usize> {
        if faces.is_empty() {
            return Vec::new();
        }
        let by_area = |a: &usize, b: &usize| faces[*a].bbox.area().total_cmp(&faces[*b].bbox.area());
        match self.config.selection {
            TargetSelection::All => (0..faces.len()).collect(),
            TargetSelection::Primary => (0..faces.len()).max_by(by_area).into_iter().collect(),
            TargetSelection::Leftmost => vec![0],
            TargetSelection::Rightmost => vec![faces.len() - 1],
            TargetSelection::Pair => {
                let mut indices: Vec<usize> = (0..faces.len()).collect();
                indices.sort_by(|a, b| by_area(b, a));
                indices.truncate(2);
                indices.sort_unstable();
                indices
            }
            TargetSelection::Tracked => self.tracker.select(faces).into_iter().collect(),
        }
    }

    /// Most similar source; ties go to the lowest index.
    fn nearest_source(&self, face: &DetectedFace) -> usize {
        let mut best = (0, f32::NEG_INFINITY);
        for (i, source) in self.sources.iter().enumerate() {
            let s = cosine_similarity(source.embedding(), &face.embedding);
            if s > best.1 {
                best = (i, s);
            }
        }
        best.0
    }
}
