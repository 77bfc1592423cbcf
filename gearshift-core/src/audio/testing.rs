//! Recording backend for exercising the mixer without an output device.

use std::collections::HashMap;

use super::{AudioBackend, AudioError, DecodedSample, LoopLayer, Tone, Waveform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    Loop(LoopLayer),
    Sample,
    Tone(Waveform),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenBus(f32),
    CloseBus,
    StartLoop(LoopLayer, f32),
    StartSample(f32),
    StartTone(Tone),
    SetGain(VoiceKind, f32),
    SetRate(VoiceKind, f32),
    SetFrequency(VoiceKind, f32),
    Stop(VoiceKind),
}

#[derive(Debug)]
pub struct MockVoice {
    id: u32,
    kind: VoiceKind,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    /// Every start_* call fails while set.
    pub refuse_voices: bool,
    /// Only start_loop fails while set.
    pub refuse_loops: bool,
    /// Every stop/close call fails while set (the voice is still gone afterwards).
    pub refuse_teardown: bool,
    live: HashMap<u32, VoiceKind>,
    open_buses: usize,
    next_id: u32,
}

impl RecordingBackend {
    pub fn live(&self, kind: VoiceKind) -> usize {
        self.live.values().filter(|live| **live == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.live.len()
    }

    pub fn open_buses(&self) -> usize {
        self.open_buses
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    fn start(&mut self, kind: VoiceKind, call: Call) -> Result<MockVoice, AudioError> {
        self.calls.push(call);
        if self.refuse_voices {
            return Err(AudioError::Playback("refused".to_string()));
        }
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        Ok(MockVoice {
            id: self.next_id,
            kind,
        })
    }
}

impl AudioBackend for RecordingBackend {
    type Bus = ();
    type Voice = MockVoice;

    fn open_bus(&mut self, gain: f32) -> Result<(), AudioError> {
        self.calls.push(Call::OpenBus(gain));
        if self.refuse_voices {
            return Err(AudioError::Playback("refused".to_string()));
        }
        self.open_buses += 1;
        Ok(())
    }

    fn close_bus(&mut self, _bus: ()) -> Result<(), AudioError> {
        self.calls.push(Call::CloseBus);
        self.open_buses -= 1;
        if self.refuse_teardown {
            return Err(AudioError::Playback("already closed".to_string()));
        }
        Ok(())
    }

    fn start_loop(
        &mut self,
        _bus: &(),
        layer: LoopLayer,
        _sample: &DecodedSample,
        gain: f32,
    ) -> Result<MockVoice, AudioError> {
        if self.refuse_loops {
            self.calls.push(Call::StartLoop(layer, gain));
            return Err(AudioError::Playback("no loop voices".to_string()));
        }
        self.start(VoiceKind::Loop(layer), Call::StartLoop(layer, gain))
    }

    fn start_sample(&mut self, _sample: &DecodedSample, gain: f32) -> Result<MockVoice, AudioError> {
        self.start(VoiceKind::Sample, Call::StartSample(gain))
    }

    fn start_tone(&mut self, tone: &Tone) -> Result<MockVoice, AudioError> {
        self.start(VoiceKind::Tone(tone.waveform), Call::StartTone(*tone))
    }

    fn set_gain(&mut self, voice: &mut MockVoice, gain: f32) -> Result<(), AudioError> {
        self.calls.push(Call::SetGain(voice.kind, gain));
        Ok(())
    }

    fn set_rate(&mut self, voice: &mut MockVoice, rate: f32) -> Result<(), AudioError> {
        self.calls.push(Call::SetRate(voice.kind, rate));
        Ok(())
    }

    fn set_frequency(&mut self, voice: &mut MockVoice, hz: f32) -> Result<(), AudioError> {
        self.calls.push(Call::SetFrequency(voice.kind, hz));
        Ok(())
    }

    fn stop(&mut self, voice: MockVoice) -> Result<(), AudioError> {
        self.calls.push(Call::Stop(voice.kind));
        self.live.remove(&voice.id);
        if self.refuse_teardown {
            return Err(AudioError::Playback("already stopped".to_string()));
        }
        Ok(())
    }
}
