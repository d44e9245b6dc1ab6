//! The canonical profile format that every uniprof converter emits and the
//! analyzer consumes. Derived from the Speedscope file format schema:
//! <https://github.com/jlfwong/speedscope/wiki/Importing-from-custom-sources>

mod error;
mod frame;
mod profile;

pub use error::SchemaError;
pub use frame::{Frame, FrameTable};
pub use profile::{Event, EventType, EventedProfile, Profile, SampledProfile, ValueUnit};

use serde::{Deserialize, Serialize};
use std::io::Write;

/// Fixed schema URL embedded in every canonical profile's `$schema` field.
pub const SCHEMA_URL: &str = "https://www.speedscope.app/file-format-schema.json";

/// Root container for a canonical profile file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedscopeFile {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub shared: Shared,
    pub profiles: Vec<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "activeProfileIndex", skip_serializing_if = "Option::is_none")]
    pub active_profile_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exporter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shared {
    pub frames: Vec<Frame>,
}

impl SpeedscopeFile {
    pub fn new(name: impl Into<String>, exporter: impl Into<String>) -> Self {
        Self {
            schema: SCHEMA_URL.to_string(),
            shared: Shared::default(),
            profiles: Vec::new(),
            name: Some(name.into()),
            active_profile_index: None,
            exporter: Some(exporter.into()),
        }
    }

    /// Builds a `SpeedscopeFile` from an already-populated frame table and a
    /// list of profiles. This is the path every converter in uniprof-convert
    /// uses once it has finished deduplicating frames.
    pub fn from_frame_table(
        name: impl Into<String>,
        exporter: impl Into<String>,
        frames: FrameTable,
        profiles: Vec<Profile>,
    ) -> Self {
        Self {
            schema: SCHEMA_URL.to_string(),
            shared: Shared {
                frames: frames.into_frames(),
            },
            profiles,
            name: Some(name.into()),
            active_profile_index: None,
            exporter: Some(exporter.into()),
        }
    }

    /// Identifies which plugin produced this profile by reading `exporter`.
    /// Used by `detectFromProfile` in the lifecycle orchestrator.
    pub fn exporter_name(&self) -> Option<&str> {
        self.exporter.as_deref()
    }

    pub fn to_pretty_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_pretty<W: Write>(&self, writer: W) -> Result<(), SchemaError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_from_str(contents: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_dedup_round_trip() {
        let mut frames = FrameTable::new();
        let a = frames.index_for(Frame::new("main"));
        let b = frames.index_for(Frame::new("main"));
        assert_eq!(a, b, "identical frames must dedup to the same index");

        let c = frames.index_for(Frame::with_location("main", "a.py", Some(3), None));
        assert_ne!(a, c, "same name but different location must not collide");
    }

    #[test]
    fn empty_file_serializes_with_schema_url() {
        let file = SpeedscopeFile::new("test", "uniprof");
        let json = file.to_pretty_json().unwrap();
        assert!(json.contains(SCHEMA_URL));
        assert!(json.contains("\"exporter\": \"uniprof\""));
    }

    #[test]
    fn sampled_profile_round_trips_through_json() {
        let mut frames = FrameTable::new();
        let main = frames.index_for(Frame::new("main"));
        let work = frames.index_for(Frame::new("do_work"));

        let mut profile = SampledProfile::new("thread 1", ValueUnit::Seconds);
        profile.push_sample(vec![main, work], 0.001);
        profile.end_value = 0.001;

        let file = SpeedscopeFile::from_frame_table(
            "test",
            "uniprof",
            frames,
            vec![Profile::Sampled(profile)],
        );
        let json = file.to_pretty_json().unwrap();
        let parsed = SpeedscopeFile::read_from_str(&json).unwrap();
        assert_eq!(parsed.shared.frames.len(), 2);
        assert_eq!(parsed.profiles.len(), 1);
    }
}
