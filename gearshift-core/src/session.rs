//! One running game: physics, obstacles, score and sound, advanced one tick per frame.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::audio::{AudioBackend, AudioMixer, Cue};
use crate::config::GameConfig;
use crate::input::Intent;
use crate::obstacles::{Obstacle, ObstacleField};
use crate::physics::{Car, Physics, Road, Shift};

/// What the HUD shows after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub score: f32,
    pub speed: f32,
    pub gear: u8,
    pub max_gear: u8,
    pub rpm: f32,
    pub game_over: bool,
    pub sound_enabled: bool,
}

pub struct GameSession<B: AudioBackend> {
    config: GameConfig,
    physics: Physics,
    field: ObstacleField,
    rng: StdRng,
    mixer: AudioMixer<B>,
    score: f32,
    elapsed: f32,
    game_over: bool,
}

impl<B: AudioBackend> GameSession<B> {
    /// Start a session. A config that fails [`GameConfig::validate`] is replaced by the
    /// defaults, with a warning.
    pub fn new(config: GameConfig, mixer: AudioMixer<B>) -> Self {
        Self::with_rng(config, mixer, StdRng::from_os_rng())
    }

    /// Deterministic obstacle stream for a given seed.
    pub fn with_seed(config: GameConfig, mixer: AudioMixer<B>, seed: u64) -> Self {
        Self::with_rng(config, mixer, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, mut mixer: AudioMixer<B>, rng: StdRng) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(error) => {
                warn!("{error}; using default settings");
                GameConfig::default()
            }
        };
        let physics = Physics::new(&config);
        let field = ObstacleField::new(
            config.obstacles.clone(),
            *physics.road(),
            config.world.height,
        );
        mixer.set_sound_enabled(config.audio.enabled);
        Self {
            config,
            physics,
            field,
            rng,
            mixer,
            score: 0.0,
            elapsed: 0.0,
            game_over: false,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn car(&self) -> &Car {
        self.physics.car()
    }

    pub fn road(&self) -> &Road {
        self.physics.road()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.field.obstacles()
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    pub fn mixer(&self) -> &AudioMixer<B> {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut AudioMixer<B> {
        &mut self.mixer
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            score: self.score,
            speed: self.physics.car().speed,
            gear: self.physics.gear(),
            max_gear: self.physics.max_gear(),
            rpm: self.physics.rpm(),
            game_over: self.game_over,
            sound_enabled: self.mixer.sound_enabled(),
        }
    }

    /// Advance the session by `dt` seconds of wall-clock time.
    ///
    /// Audio housekeeping and the sound toggle run in every state. Everything else is
    /// frozen once the game is over, until a restart is requested.
    pub fn tick(&mut self, intent: &Intent, dt: f32) -> Telemetry {
        // NaN collapses to zero.
        let dt = dt.max(0.0).min(self.config.world.max_frame_dt);

        self.mixer.advance(dt);
        if intent.toggle_sound {
            self.mixer.toggle_sound();
        }

        if self.game_over {
            if intent.restart {
                self.restart();
            }
            return self.telemetry();
        }

        if intent.shift_up && self.physics.shift(Shift::Up) {
            self.mixer.play_cue(Cue::GearShift);
        }
        if intent.shift_down && self.physics.shift(Shift::Down) {
            self.mixer.play_cue(Cue::GearShift);
        }

        self.physics.step(intent, dt);
        self.field.step(&mut self.rng, dt, self.score);

        if let Some(obstacle) = self.field.first_collision(&self.physics.car().bounds()) {
            info!(
                score = self.score,
                obstacle = obstacle.id,
                seconds = self.elapsed,
                "Crashed, game over"
            );
            self.game_over = true;
            self.mixer.play_cue(Cue::Crash);
            self.mixer.stop_engine_sound();
            return self.telemetry();
        }

        let scoring = &self.config.scoring;
        let speed = self.physics.car().speed.max(0.0);
        self.score += dt * (scoring.per_second + speed * scoring.per_speed);
        self.elapsed += dt;

        self.mixer.update_engine_sound(self.physics.rpm(), dt);

        self.telemetry()
    }

    /// Start a fresh run. The mixer and its loaded samples carry over.
    pub fn restart(&mut self) {
        info!(final_score = self.score, "Restarting");
        self.physics = Physics::new(&self.config);
        self.field.clear();
        self.score = 0.0;
        self.elapsed = 0.0;
        self.game_over = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{Call, RecordingBackend, VoiceKind};
    use crate::audio::{MixerSettings, Waveform};
    use bevy_math::Vec2;

    const DT: f32 = 1.0 / 60.0;

    fn session() -> GameSession<RecordingBackend> {
        let config = GameConfig::default();
        let settings = MixerSettings::new(
            &config.audio,
            config.gearbox.idle_rpm,
            config.gearbox.redline_rpm,
        );
        let mixer = AudioMixer::new(Ok(RecordingBackend::default()), settings);
        GameSession::with_seed(config, mixer, 99)
    }

    fn gas() -> Intent {
        Intent {
            gas: true,
            ..Intent::default()
        }
    }

    fn shift_cues(session: &GameSession<RecordingBackend>) -> usize {
        session
            .mixer()
            .backend()
            .unwrap()
            .count(|call| {
                matches!(call, Call::StartTone(tone) if tone.waveform == Waveform::Triangle)
            })
    }

    fn block_car(session: &mut GameSession<RecordingBackend>) {
        let position = session.car().position;
        session.field.insert(position, Vec2::new(40.0, 20.0), 0.0);
    }

    #[test]
    fn score_strictly_increases_while_running() {
        let mut session = session();
        let mut last = session.score();
        for step in 0..300 {
            let intent = if step % 2 == 0 { gas() } else { Intent::default() };
            let telemetry = session.tick(&intent, DT);
            // Obstacles are cleared away so the run lasts.
            session.field.clear();
            assert!(telemetry.score > last);
            last = telemetry.score;
        }
    }

    #[test]
    fn faster_driving_scores_faster() {
        let mut idle = session();
        let mut driving = session();
        for _ in 0..300 {
            idle.tick(&Intent::default(), DT);
            driving.tick(&gas(), DT);
            idle.field.clear();
            driving.field.clear();
        }
        assert!(driving.score() > idle.score());
    }

    #[test]
    fn collision_ends_the_game_and_cuts_the_engine() {
        let mut session = session();
        session.tick(&gas(), DT);
        assert!(session.mixer().engine_kind().is_some());

        block_car(&mut session);
        let telemetry = session.tick(&gas(), DT);
        assert!(telemetry.game_over);
        assert_eq!(session.mixer().engine_kind(), None);
        assert_eq!(session.mixer().ringing_cues(), 1);
        let backend = session.mixer().backend().unwrap();
        assert_eq!(backend.live(VoiceKind::Tone(Waveform::Sawtooth)), 0);
    }

    #[test]
    fn nothing_moves_after_game_over() {
        let mut session = session();
        block_car(&mut session);
        session.tick(&gas(), DT);
        assert!(session.is_over());

        let frozen = session.telemetry();
        let car = session.car().clone();
        let obstacles = session.obstacles().to_vec();
        for _ in 0..120 {
            let telemetry = session.tick(
                &Intent {
                    gas: true,
                    left: true,
                    shift_up: true,
                    ..Intent::default()
                },
                DT,
            );
            assert_eq!(telemetry, frozen);
        }
        assert_eq!(session.car(), &car);
        assert_eq!(session.obstacles(), obstacles.as_slice());
        assert_eq!(session.mixer().engine_kind(), None);
    }

    #[test]
    fn restart_only_applies_after_game_over() {
        let mut session = session();
        let restart = Intent {
            restart: true,
            ..Intent::default()
        };
        for _ in 0..30 {
            session.tick(&gas(), DT);
            session.field.clear();
        }
        let before = session.score();
        session.tick(&restart, DT);
        assert!(session.score() > before);

        block_car(&mut session);
        session.tick(&Intent::default(), DT);
        assert!(session.is_over());

        let telemetry = session.tick(&restart, DT);
        assert!(!telemetry.game_over);
        assert_eq!(telemetry.score, 0.0);
        assert_eq!(telemetry.gear, 1);
        assert_eq!(telemetry.speed, 0.0);
        assert!(session.obstacles().is_empty());
    }

    #[test]
    fn shift_cue_only_on_real_gear_change() {
        let mut session = session();
        let down = Intent {
            shift_down: true,
            ..Intent::default()
        };
        let up = Intent {
            shift_up: true,
            ..Intent::default()
        };

        session.tick(&down, DT);
        assert_eq!(session.telemetry().gear, 1);
        assert_eq!(shift_cues(&session), 0);

        session.tick(&up, DT);
        assert_eq!(session.telemetry().gear, 2);
        assert_eq!(shift_cues(&session), 1);

        let top = session.telemetry().max_gear;
        for _ in 0..20 {
            session.tick(&up, DT);
            session.field.clear();
        }
        assert_eq!(session.telemetry().gear, top);
        assert_eq!(shift_cues(&session), usize::from(top) - 1);
    }

    #[test]
    fn sound_toggle_works_while_game_over() {
        let mut session = session();
        block_car(&mut session);
        session.tick(&Intent::default(), DT);
        let toggle = Intent {
            toggle_sound: true,
            ..Intent::default()
        };
        let telemetry = session.tick(&toggle, DT);
        assert!(telemetry.game_over);
        assert!(!telemetry.sound_enabled);
    }

    #[test]
    fn long_frames_are_clamped() {
        let mut session = session();
        session.tick(&gas(), 5.0);
        session.field.clear();
        let mut reference = self::session();
        reference.tick(&gas(), 0.1);
        assert_eq!(session.score(), reference.score());
    }

    #[test]
    fn odd_frame_times_never_stall_the_loop() {
        let mut session = session();
        for dt in [-1.0, f32::NAN, f32::NEG_INFINITY] {
            let telemetry = session.tick(&gas(), dt);
            assert_eq!(telemetry.score, 0.0, "{dt}");
        }
        let telemetry = session.tick(&gas(), f32::INFINITY);
        assert!(telemetry.score.is_finite() && telemetry.score > 0.0);
    }

    fn session_with(config: GameConfig) -> GameSession<RecordingBackend> {
        let defaults = GameConfig::default();
        let settings = MixerSettings::new(
            &defaults.audio,
            defaults.gearbox.idle_rpm,
            defaults.gearbox.redline_rpm,
        );
        let mixer = AudioMixer::new(Ok(RecordingBackend::default()), settings);
        GameSession::with_seed(config, mixer, 99)
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let mut config = GameConfig::default();
        config.world.max_frame_dt = -0.1;
        config.gearbox.ratios.clear();
        config.obstacles.speed_per_score = -1.0;
        let mut session = session_with(config);
        assert_eq!(session.config().world.max_frame_dt, 0.1);
        assert_eq!(session.config().gearbox.ratios.len(), 9);

        let telemetry = session.tick(&gas(), DT);
        assert!(telemetry.score > 0.0);
        assert_eq!(telemetry.max_gear, 9);
    }

    #[test]
    fn valid_config_is_kept() {
        let mut config = GameConfig::default();
        config.gearbox.ratios = vec![3.0, 2.0];
        config.world.max_frame_dt = 0.05;
        let session = session_with(config);
        assert_eq!(session.config().gearbox.ratios, vec![3.0, 2.0]);
        assert_eq!(session.telemetry().max_gear, 2);
    }

    #[test]
    fn restart_keeps_the_mixer() {
        let mut session = session();
        session.tick(&gas(), DT);
        block_car(&mut session);
        session.tick(&gas(), DT);
        session.tick(
            &Intent {
                restart: true,
                ..Intent::default()
            },
            DT,
        );
        session.tick(&gas(), DT);
        let backend = session.mixer().backend().unwrap();
        assert_eq!(backend.live(VoiceKind::Tone(Waveform::Sawtooth)), 1);
    }
}
