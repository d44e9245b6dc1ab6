use serde::{Deserialize, Serialize};

/// Units for profile start/end values and sample weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueUnit {
    None,
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Bytes,
}

/// A profile within a canonical profile file: either a per-thread list of
/// weighted stack samples, or a time-ordered stream of frame open/close
/// events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Profile {
    #[serde(rename = "sampled")]
    Sampled(SampledProfile),
    #[serde(rename = "evented")]
    Evented(EventedProfile),
}

impl Profile {
    pub fn name(&self) -> &str {
        match self {
            Profile::Sampled(p) => &p.name,
            Profile::Evented(p) => &p.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledProfile {
    pub name: String,
    pub unit: ValueUnit,
    pub start_value: f64,
    pub end_value: f64,
    /// Each inner vec is bottom-to-top: index 0 is the outermost caller.
    pub samples: Vec<Vec<usize>>,
    pub weights: Vec<f64>,
}

impl SampledProfile {
    pub fn new(name: impl Into<String>, unit: ValueUnit) -> Self {
        Self {
            name: name.into(),
            unit,
            start_value: 0.0,
            end_value: 0.0,
            samples: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn push_sample(&mut self, stack: Vec<usize>, weight: f64) {
        self.samples.push(stack);
        self.weights.push(weight);
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventedProfile {
    pub name: String,
    pub unit: ValueUnit,
    pub start_value: f64,
    pub end_value: f64,
    pub events: Vec<Event>,
}

impl EventedProfile {
    pub fn new(name: impl Into<String>, unit: ValueUnit) -> Self {
        Self {
            name: name.into(),
            unit,
            start_value: 0.0,
            end_value: 0.0,
            events: Vec::new(),
        }
    }

    pub fn open(&mut self, frame: usize, at: f64) {
        self.events.push(Event {
            event_type: EventType::Open,
            frame,
            at,
        });
    }

    pub fn close(&mut self, frame: usize, at: f64) {
        self.events.push(Event {
            event_type: EventType::Close,
            frame,
            at,
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub frame: usize,
    pub at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "C")]
    Close,
}
