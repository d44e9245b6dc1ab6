use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A single stack frame definition, referenced by index from every sample or
/// event in a profile's `shared.frames` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            line: None,
            col: None,
        }
    }

    pub fn with_location(
        name: impl Into<String>,
        file: impl Into<String>,
        line: Option<u32>,
        col: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            file: Some(file.into()),
            line,
            col,
        }
    }
}

/// Deduplicating frame table. Every converter builds one of these while
/// walking its raw input and only hands the finished `Vec<Frame>` to the
/// `shared.frames` array once conversion is complete.
///
/// Dedup key is `(name, file, line, col)`, per the common emission rules.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<Frame>,
    index: FxHashMap<Frame, usize>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for `frame`, inserting it if this is the first time
    /// this exact `(name, file, line, col)` tuple has been seen.
    pub fn index_for(&mut self, frame: Frame) -> usize {
        if let Some(&idx) = self.index.get(&frame) {
            return idx;
        }
        let idx = self.frames.len();
        self.index.insert(frame.clone(), idx);
        self.frames.push(frame);
        idx
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
