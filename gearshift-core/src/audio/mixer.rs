use tracing::{debug, info, warn};

use super::{
    AudioBackend, AudioError, Cue, Decay, LoopLayer, SampleBank, SampleLoader, Tone, Waveform,
};
use crate::config::AudioConfig;

/// Smoothing time constants, in seconds.
const LAYER_GAIN_TAU: f32 = 0.05;
const LAYER_RATE_TAU: f32 = 0.02;
const SYNTH_FREQ_TAU: f32 = 0.02;
const SYNTH_GAIN_TAU: f32 = 0.05;

const SYNTH_MIN_HZ: f32 = 80.0;
const SYNTH_MAX_HZ: f32 = 1200.0;
const SYNTH_START_GAIN: f32 = 0.0001;

const CUE_TONE: Tone = Tone {
    waveform: Waveform::Triangle,
    frequency: 200.0,
    gain: 0.01,
    decay: Some(Decay {
        floor: 0.0001,
        seconds: 0.4,
    }),
};
/// Synthesized cues are released this long after they start.
const CUE_TONE_LIFETIME: f64 = 0.5;
/// Sampled cues are released this long after their natural end.
const CUE_SAMPLE_TAIL: f64 = 0.2;

/// Position of `rpm` between idle and redline, clamped to `[0, 1]`.
pub fn normalized_rpm(rpm: f32, idle: f32, redline: f32) -> f32 {
    let span = redline - idle;
    if span <= 0.0 {
        return 0.0;
    }
    ((rpm - idle) / span).clamp(0.0, 1.0)
}

/// Where the two sampled engine layers are heading for a given normalized RPM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTargets {
    pub low_gain: f32,
    pub high_gain: f32,
    pub low_rate: f32,
    pub high_rate: f32,
}

pub fn layer_targets(norm: f32) -> LayerTargets {
    LayerTargets {
        low_gain: (1.0 - 1.4 * norm).max(0.0),
        high_gain: (1.2 * norm).max(0.0),
        low_rate: 0.8 + 0.9 * norm,
        high_rate: 0.9 + 1.3 * norm,
    }
}

/// Frequency and gain of the fallback engine tone.
pub fn synth_targets(norm: f32) -> (f32, f32) {
    let frequency = SYNTH_MIN_HZ + norm * (SYNTH_MAX_HZ - SYNTH_MIN_HZ);
    let gain = 0.04 + 0.08 * norm;
    (frequency, gain)
}

/// A parameter that glides toward its target with a first-order lag.
#[derive(Debug, Clone, Copy)]
struct Smoothed {
    value: f32,
}

impl Smoothed {
    fn new(value: f32) -> Self {
        Self { value }
    }

    fn approach(&mut self, target: f32, dt: f32, tau: f32) -> f32 {
        let blend = if tau <= 0.0 {
            1.0
        } else {
            1.0 - (-dt.max(0.0) / tau).exp()
        };
        self.value += (target - self.value) * blend;
        self.value
    }
}

struct Layer<V> {
    voice: V,
    gain: Smoothed,
    rate: Smoothed,
}

impl<V> Layer<V> {
    fn new(voice: V) -> Self {
        Self {
            voice,
            gain: Smoothed::new(0.0),
            rate: Smoothed::new(1.0),
        }
    }
}

enum Engine<B: AudioBackend> {
    Layered {
        bus: B::Bus,
        low: Layer<B::Voice>,
        high: Layer<B::Voice>,
        idle: Option<B::Voice>,
    },
    Synth {
        voice: B::Voice,
        frequency: Smoothed,
        gain: Smoothed,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Layered,
    Synth,
}

enum Samples {
    Unloaded,
    Loading(SampleLoader),
    Loaded(SampleBank),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    LoadFailed,
}

struct RingingCue<V> {
    voice: V,
    release_at: f64,
}

/// Fixed mix levels and the RPM span used for normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSettings {
    pub master_gain: f32,
    pub idle_gain: f32,
    pub cue_gain: f32,
    pub idle_rpm: f32,
    pub redline_rpm: f32,
}

impl MixerSettings {
    pub fn new(audio: &AudioConfig, idle_rpm: f32, redline_rpm: f32) -> Self {
        Self {
            master_gain: audio.master_gain,
            idle_gain: audio.idle_gain,
            cue_gain: audio.cue_gain,
            idle_rpm,
            redline_rpm,
        }
    }
}

fn swallow(result: Result<(), AudioError>, what: &str) {
    if let Err(error) = result {
        debug!("{what} failed: {error}");
    }
}

/// RPM-driven engine sound plus one-shot cues.
///
/// No method returns an error: every backend failure is logged and the mixer keeps
/// going with whatever it still has. Without a backend it does nothing at all.
pub struct AudioMixer<B: AudioBackend> {
    backend: Option<B>,
    settings: MixerSettings,
    samples: Samples,
    engine: Option<Engine<B>>,
    ringing: Vec<RingingCue<B::Voice>>,
    sound_enabled: bool,
    clock: f64,
}

impl<B: AudioBackend> AudioMixer<B> {
    pub fn new(backend: Result<B, AudioError>, settings: MixerSettings) -> Self {
        let backend = match backend {
            Ok(backend) => Some(backend),
            Err(error) => {
                warn!("Audio output unavailable, running silent: {error}");
                None
            }
        };
        Self {
            backend,
            settings,
            samples: Samples::Unloaded,
            engine: None,
            ringing: Vec::new(),
            sound_enabled: true,
            clock: 0.0,
        }
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        match self.samples {
            Samples::Unloaded => LoadState::Unloaded,
            Samples::Loading(_) => LoadState::Loading,
            Samples::Loaded(_) => LoadState::Loaded,
            Samples::Failed => LoadState::LoadFailed,
        }
    }

    pub fn samples_loaded(&self) -> bool {
        matches!(self.samples, Samples::Loaded(_))
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    pub fn engine_kind(&self) -> Option<EngineKind> {
        self.engine.as_ref().map(|engine| match engine {
            Engine::Layered { .. } => EngineKind::Layered,
            Engine::Synth { .. } => EngineKind::Synth,
        })
    }

    pub fn ringing_cues(&self) -> usize {
        self.ringing.len()
    }

    /// Hand over a loader. Ignored unless nothing has been loaded yet.
    pub fn begin_loading(&mut self, loader: SampleLoader) {
        if matches!(self.samples, Samples::Unloaded) {
            self.samples = Samples::Loading(loader);
        }
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        if self.sound_enabled == enabled {
            return;
        }
        self.sound_enabled = enabled;
        info!(enabled, "sound toggled");
        if !enabled {
            self.stop_engine_sound();
        }
    }

    /// Flip sound on/off, returning the new state.
    pub fn toggle_sound(&mut self) -> bool {
        self.set_sound_enabled(!self.sound_enabled);
        self.sound_enabled
    }

    /// Advance the mixer clock: pick up a finished load and release expired cues.
    pub fn advance(&mut self, dt: f32) {
        self.clock += f64::from(dt.max(0.0));
        self.poll_loader();
        self.release_expired_cues();
    }

    fn poll_loader(&mut self) {
        let polled = match &mut self.samples {
            Samples::Loading(loader) => loader.poll(),
            _ => return,
        };
        match polled {
            None => {}
            Some(Ok(bank)) => {
                info!(samples = bank.len(), "Samples loaded");
                self.samples = Samples::Loaded(bank);
                // Swap the placeholder tone for the sampled layers on the next update.
                if self.engine_kind() == Some(EngineKind::Synth) {
                    self.stop_engine_sound();
                }
            }
            Some(Err(error)) => {
                warn!("Sample loading failed, falling back to synthesized tones: {error}");
                self.samples = Samples::Failed;
            }
        }
    }

    fn release_expired_cues(&mut self) {
        let now = self.clock;
        let (expired, ringing): (Vec<_>, Vec<_>) = std::mem::take(&mut self.ringing)
            .into_iter()
            .partition(|cue| cue.release_at <= now);
        self.ringing = ringing;
        if let Some(backend) = self.backend.as_mut() {
            for cue in expired {
                swallow(backend.stop(cue.voice), "cue release");
            }
        }
    }

    /// Create engine voices if sound is on and none are running.
    ///
    /// With samples loaded the layers are tried first on every start, so a synth that stood
    /// in for refused layers gives way to them once the engine is next released (sound
    /// toggled off, or a crash).
    pub fn start_engine_if_needed(&mut self) {
        if !self.sound_enabled || self.engine.is_some() {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let layered = match &self.samples {
            Samples::Loaded(bank) => Some(bank),
            _ => None,
        };
        let started = match layered {
            Some(bank) => start_layered(backend, bank, &self.settings)
                .or_else(|error| {
                    warn!("Sampled engine unavailable, using synth: {error}");
                    start_synth(backend)
                }),
            None => start_synth(backend),
        };

        match started {
            Ok(engine) => self.engine = Some(engine),
            Err(error) => debug!("engine sound start failed: {error}"),
        }
    }

    /// Steer the engine layers toward the mix for `rpm`. `dt` drives the smoothing.
    pub fn update_engine_sound(&mut self, rpm: f32, dt: f32) {
        if !self.sound_enabled {
            return;
        }
        self.start_engine_if_needed();

        let norm = normalized_rpm(rpm, self.settings.idle_rpm, self.settings.redline_rpm);
        let (Some(backend), Some(engine)) = (self.backend.as_mut(), self.engine.as_mut()) else {
            return;
        };

        match engine {
            Engine::Layered { low, high, .. } => {
                let targets = layer_targets(norm);
                let gain = low.gain.approach(targets.low_gain, dt, LAYER_GAIN_TAU);
                swallow(backend.set_gain(&mut low.voice, gain), "low gain");
                let gain = high.gain.approach(targets.high_gain, dt, LAYER_GAIN_TAU);
                swallow(backend.set_gain(&mut high.voice, gain), "high gain");
                let rate = low.rate.approach(targets.low_rate, dt, LAYER_RATE_TAU);
                swallow(backend.set_rate(&mut low.voice, rate), "low rate");
                let rate = high.rate.approach(targets.high_rate, dt, LAYER_RATE_TAU);
                swallow(backend.set_rate(&mut high.voice, rate), "high rate");
            }
            Engine::Synth {
                voice,
                frequency,
                gain,
            } => {
                let (target_hz, target_gain) = synth_targets(norm);
                let hz = frequency.approach(target_hz, dt, SYNTH_FREQ_TAU);
                swallow(backend.set_frequency(voice, hz), "synth frequency");
                let level = gain.approach(target_gain, dt, SYNTH_GAIN_TAU);
                swallow(backend.set_gain(voice, level), "synth gain");
            }
        }
    }

    /// Release every engine voice. Cues keep ringing.
    pub fn stop_engine_sound(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match engine {
            Engine::Layered {
                bus,
                low,
                high,
                idle,
            } => {
                swallow(backend.stop(low.voice), "low layer stop");
                swallow(backend.stop(high.voice), "high layer stop");
                if let Some(idle) = idle {
                    swallow(backend.stop(idle), "idle layer stop");
                }
                swallow(backend.close_bus(bus), "bus close");
            }
            Engine::Synth { voice, .. } => {
                swallow(backend.stop(voice), "synth stop");
            }
        }
    }

    /// Play a cue once: the sample when loaded, a short decaying tone otherwise.
    pub fn play_cue(&mut self, cue: Cue) {
        if !self.sound_enabled {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let sample = match &self.samples {
            Samples::Loaded(bank) => bank.get(cue.sample()),
            _ => None,
        };
        let (started, lifetime) = match sample {
            Some(sample) => (
                backend.start_sample(sample, self.settings.cue_gain),
                f64::from(sample.duration_secs()) + CUE_SAMPLE_TAIL,
            ),
            None => (backend.start_tone(&CUE_TONE), CUE_TONE_LIFETIME),
        };

        match started {
            Ok(voice) => self.ringing.push(RingingCue {
                voice,
                release_at: self.clock + lifetime,
            }),
            Err(error) => debug!(?cue, "cue playback failed: {error}"),
        }
    }
}

fn start_layered<B: AudioBackend>(
    backend: &mut B,
    bank: &SampleBank,
    settings: &MixerSettings,
) -> Result<Engine<B>, AudioError> {
    let low_sample = bank
        .get(LoopLayer::Low.sample())
        .ok_or(AudioError::MissingAsset(LoopLayer::Low.sample()))?;
    let high_sample = bank
        .get(LoopLayer::High.sample())
        .ok_or(AudioError::MissingAsset(LoopLayer::High.sample()))?;

    let bus = backend.open_bus(settings.master_gain)?;

    let low = match backend.start_loop(&bus, LoopLayer::Low, low_sample, 0.0) {
        Ok(voice) => voice,
        Err(error) => {
            swallow(backend.close_bus(bus), "bus close");
            return Err(error);
        }
    };
    let high = match backend.start_loop(&bus, LoopLayer::High, high_sample, 0.0) {
        Ok(voice) => voice,
        Err(error) => {
            swallow(backend.stop(low), "low layer stop");
            swallow(backend.close_bus(bus), "bus close");
            return Err(error);
        }
    };

    // The idle bed is optional; the engine runs without it.
    let idle = match bank.get(LoopLayer::Idle.sample()) {
        Some(sample) if settings.idle_gain > 0.0 => {
            match backend.start_loop(&bus, LoopLayer::Idle, sample, settings.idle_gain) {
                Ok(voice) => Some(voice),
                Err(error) => {
                    debug!("idle layer unavailable: {error}");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(Engine::Layered {
        bus,
        low: Layer::new(low),
        high: Layer::new(high),
        idle,
    })
}

fn start_synth<B: AudioBackend>(backend: &mut B) -> Result<Engine<B>, AudioError> {
    let tone = Tone {
        waveform: Waveform::Sawtooth,
        frequency: SYNTH_MIN_HZ,
        gain: SYNTH_START_GAIN,
        decay: None,
    };
    let voice = backend.start_tone(&tone)?;
    Ok(Engine::Synth {
        voice,
        frequency: Smoothed::new(SYNTH_MIN_HZ),
        gain: Smoothed::new(SYNTH_START_GAIN),
    })
}
