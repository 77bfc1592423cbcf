use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use gearshift_core::audio::{AudioBackend, AudioError, DecodedSample, LoopLayer, Tone, Waveform};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

const SYNTH_SAMPLE_RATE: u32 = 44_100;

/// Decode any format rodio understands into interleaved f32 frames.
pub fn decode(bytes: Vec<u8>) -> Result<DecodedSample, AudioError> {
    let decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples().collect();
    if samples.is_empty() {
        return Err(AudioError::Decode("no audio frames".to_string()));
    }
    Ok(DecodedSample::new(channels, sample_rate, samples))
}

/// Frequency shared between the mixer thread and the audio callback.
#[derive(Clone)]
struct SharedFrequency(Arc<AtomicU32>);

impl SharedFrequency {
    fn new(hz: f32) -> Self {
        Self(Arc::new(AtomicU32::new(hz.to_bits())))
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, hz: f32) {
        self.0.store(hz.to_bits(), Ordering::Relaxed);
    }
}

/// Mono oscillator. Endless unless it carries a decay envelope.
struct Oscillator {
    waveform: Waveform,
    frequency: SharedFrequency,
    phase: f32,
    /// Per-sample multiplier and samples left while decaying.
    envelope: Option<(f32, u32)>,
    level: f32,
}

impl Oscillator {
    fn new(tone: &Tone, frequency: SharedFrequency) -> Self {
        let envelope = tone.decay.map(|decay| {
            let samples = (decay.seconds * SYNTH_SAMPLE_RATE as f32).max(1.0) as u32;
            let target = if tone.gain > 0.0 {
                (decay.floor / tone.gain).clamp(f32::MIN_POSITIVE, 1.0)
            } else {
                1.0
            };
            (target.powf(1.0 / samples as f32), samples)
        });
        Self {
            waveform: tone.waveform,
            frequency,
            phase: 0.0,
            envelope,
            level: 1.0,
        }
    }

    fn shape(&self) -> f32 {
        match self.waveform {
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
        }
    }
}

impl Iterator for Oscillator {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((factor, remaining)) = self.envelope.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
            self.level *= *factor;
        }

        let out = self.shape() * self.level;
        self.phase += self.frequency.get().max(0.0) / SYNTH_SAMPLE_RATE as f32;
        self.phase -= self.phase.floor();
        Some(out)
    }
}

impl Source for Oscillator {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SYNTH_SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        self.envelope.map(|(_, remaining)| {
            Duration::from_secs_f32(remaining as f32 / SYNTH_SAMPLE_RATE as f32)
        })
    }
}

/// Master gain applied to every layer routed through it.
pub struct RodioBus {
    gain: f32,
}

/// One sink per voice, so each has its own volume and speed.
pub struct RodioVoice {
    sink: Sink,
    bus_gain: f32,
    frequency: Option<SharedFrequency>,
}

pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn open() -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::Device(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    fn sink(&self, volume: f32) -> Result<Sink, AudioError> {
        let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::Playback(e.to_string()))?;
        sink.set_volume(volume);
        Ok(sink)
    }
}

fn buffer(sample: &DecodedSample) -> SamplesBuffer<f32> {
    SamplesBuffer::new(sample.channels, sample.sample_rate, sample.samples.to_vec())
}

impl AudioBackend for RodioBackend {
    type Bus = RodioBus;
    type Voice = RodioVoice;

    fn open_bus(&mut self, gain: f32) -> Result<RodioBus, AudioError> {
        Ok(RodioBus { gain })
    }

    fn close_bus(&mut self, _bus: RodioBus) -> Result<(), AudioError> {
        Ok(())
    }

    fn start_loop(
        &mut self,
        bus: &RodioBus,
        _layer: LoopLayer,
        sample: &DecodedSample,
        gain: f32,
    ) -> Result<RodioVoice, AudioError> {
        let sink = self.sink(gain * bus.gain)?;
        sink.append(buffer(sample).repeat_infinite());
        Ok(RodioVoice {
            sink,
            bus_gain: bus.gain,
            frequency: None,
        })
    }

    fn start_sample(&mut self, sample: &DecodedSample, gain: f32) -> Result<RodioVoice, AudioError> {
        let sink = self.sink(gain)?;
        sink.append(buffer(sample));
        Ok(RodioVoice {
            sink,
            bus_gain: 1.0,
            frequency: None,
        })
    }

    fn start_tone(&mut self, tone: &Tone) -> Result<RodioVoice, AudioError> {
        let sink = self.sink(tone.gain)?;
        let frequency = SharedFrequency::new(tone.frequency);
        sink.append(Oscillator::new(tone, frequency.clone()));
        Ok(RodioVoice {
            sink,
            bus_gain: 1.0,
            frequency: Some(frequency),
        })
    }

    fn set_gain(&mut self, voice: &mut RodioVoice, gain: f32) -> Result<(), AudioError> {
        voice.sink.set_volume(gain.max(0.0) * voice.bus_gain);
        Ok(())
    }

    fn set_rate(&mut self, voice: &mut RodioVoice, rate: f32) -> Result<(), AudioError> {
        voice.sink.set_speed(rate.max(0.01));
        Ok(())
    }

    fn set_frequency(&mut self, voice: &mut RodioVoice, hz: f32) -> Result<(), AudioError> {
        match &voice.frequency {
            Some(frequency) => {
                frequency.set(hz);
                Ok(())
            }
            None => Err(AudioError::Playback("voice has no pitch control".to_string())),
        }
    }

    fn stop(&mut self, voice: RodioVoice) -> Result<(), AudioError> {
        voice.sink.stop();
        Ok(())
    }
}
