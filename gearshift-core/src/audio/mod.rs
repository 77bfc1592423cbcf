//! Engine sound and one-shot cues.
//!
//! The [`AudioMixer`] owns every piece of audio state: the decoded samples, the looping
//! engine layers and the cues still ringing out. It talks to the output device only
//! through an [`AudioBackend`], so the whole state machine runs without a sound card.
//!
//! ```text
//! samples:  Unloaded -> Loading -> Loaded | LoadFailed
//! engine:   Stopped <-> Running (Layered on samples, Synth otherwise)
//! sound:    Enabled <-> Disabled
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

mod loader;
mod mixer;
#[cfg(test)]
pub(crate) mod testing;

pub use loader::SampleLoader;
pub use mixer::{
    AudioMixer, EngineKind, LayerTargets, LoadState, MixerSettings, layer_targets,
    normalized_rpm, synth_targets,
};

/// The five assets the game asks for at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleName {
    EngineIdle,
    EngineLow,
    EngineHigh,
    GearShift,
    Crash,
}

impl SampleName {
    pub const ALL: [SampleName; 5] = [
        SampleName::EngineIdle,
        SampleName::EngineLow,
        SampleName::EngineHigh,
        SampleName::GearShift,
        SampleName::Crash,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SampleName::EngineIdle => "engine_idle",
            SampleName::EngineLow => "engine_low",
            SampleName::EngineHigh => "engine_high",
            SampleName::GearShift => "gear_shift",
            SampleName::Crash => "crash",
        }
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Sound effects played once and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    GearShift,
    Crash,
}

impl Cue {
    pub fn sample(self) -> SampleName {
        match self {
            Cue::GearShift => SampleName::GearShift,
            Cue::Crash => SampleName::Crash,
        }
    }
}

/// Looping engine layers mixed by RPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopLayer {
    Idle,
    Low,
    High,
}

impl LoopLayer {
    pub fn sample(self) -> SampleName {
        match self {
            LoopLayer::Idle => SampleName::EngineIdle,
            LoopLayer::Low => SampleName::EngineLow,
            LoopLayer::High => SampleName::EngineHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sawtooth,
    Triangle,
}

/// Exponential fade applied to a synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decay {
    /// Gain reached at the end of the fade.
    pub floor: f32,
    /// Seconds from start to `floor`.
    pub seconds: f32,
}

/// Parameters of a synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub waveform: Waveform,
    pub frequency: f32,
    pub gain: f32,
    pub decay: Option<Decay>,
}

/// PCM data decoded once at load time, shared by every voice that plays it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSample {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved frames.
    pub samples: Arc<[f32]>,
}

impl DecodedSample {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels,
            sample_rate,
            samples: samples.into(),
        }
    }

    /// Playback length at rate 1.0, in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / f32::from(self.channels) / self.sample_rate as f32
    }
}

/// Every sample that loaded successfully, by name.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    samples: HashMap<SampleName, DecodedSample>,
}

impl SampleBank {
    pub fn insert(&mut self, name: SampleName, sample: DecodedSample) {
        self.samples.insert(name, sample);
    }

    pub fn get(&self, name: SampleName) -> Option<&DecodedSample> {
        self.samples.get(&name)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sample '{0}' is not available")]
    MissingAsset(SampleName),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("sample '{name}' could not be loaded: {source}")]
    Sample {
        name: SampleName,
        #[source]
        source: Box<AudioError>,
    },
    #[error("audio device unavailable: {0}")]
    Device(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("sample loader stopped without reporting")]
    LoaderGone,
}

/// The output side of the mixer: creates, adjusts and releases playing sources.
///
/// Every method may fail; the mixer logs and carries on. Parameter setters are called
/// once per tick with already-smoothed values.
pub trait AudioBackend {
    /// A mixing stage that engine layers feed into.
    type Bus;
    /// One playing source together with its own gain stage.
    type Voice;

    fn open_bus(&mut self, gain: f32) -> Result<Self::Bus, AudioError>;

    fn close_bus(&mut self, bus: Self::Bus) -> Result<(), AudioError>;

    /// Start `sample` looping forever through `bus`.
    fn start_loop(
        &mut self,
        bus: &Self::Bus,
        layer: LoopLayer,
        sample: &DecodedSample,
        gain: f32,
    ) -> Result<Self::Voice, AudioError>;

    /// Start `sample` once, straight to the output.
    fn start_sample(&mut self, sample: &DecodedSample, gain: f32)
    -> Result<Self::Voice, AudioError>;

    /// Start a synthesized tone straight to the output.
    fn start_tone(&mut self, tone: &Tone) -> Result<Self::Voice, AudioError>;

    fn set_gain(&mut self, voice: &mut Self::Voice, gain: f32) -> Result<(), AudioError>;

    fn set_rate(&mut self, voice: &mut Self::Voice, rate: f32) -> Result<(), AudioError>;

    fn set_frequency(&mut self, voice: &mut Self::Voice, hz: f32) -> Result<(), AudioError>;

    /// Stop and disconnect a voice.
    fn stop(&mut self, voice: Self::Voice) -> Result<(), AudioError>;
}
