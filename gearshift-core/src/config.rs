use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::SampleName;

/// Tunables for a whole session, stored as TOML.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub car: CarConfig,
    #[serde(default)]
    pub gearbox: GearboxConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WorldConfig {
    #[serde(default = "default_screen_width")]
    pub width: f32,
    #[serde(default = "default_screen_height")]
    pub height: f32,
    /// Left road edge as a fraction of the screen width.
    #[serde(default = "default_road_margin")]
    pub road_margin: f32,
    /// Road width as a fraction of the screen width.
    #[serde(default = "default_road_fraction")]
    pub road_fraction: f32,
    /// Longest frame the simulation will integrate in one step (seconds).
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            road_margin: default_road_margin(),
            road_fraction: default_road_fraction(),
            max_frame_dt: default_max_frame_dt(),
        }
    }
}

fn default_screen_width() -> f32 {
    480.0
}

fn default_screen_height() -> f32 {
    800.0
}

fn default_road_margin() -> f32 {
    0.08
}

fn default_road_fraction() -> f32 {
    0.84
}

fn default_max_frame_dt() -> f32 {
    0.1
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CarConfig {
    pub width: f32,
    pub height: f32,
    /// Distance from the bottom of the screen to the car's top edge.
    pub bottom_offset: f32,
    /// Lateral speed while a steer control is held (px/s).
    pub steer_speed: f32,
    /// Acceleration per unit of gear ratio with the gas held.
    pub engine_accel: f32,
    pub brake_decel: f32,
    /// Fraction of the current speed lost per second when coasting.
    pub drag: f32,
    /// Engine RPM per unit of speed per unit of gear ratio.
    pub rpm_per_speed: f32,
    pub color: [u8; 3],
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            width: 44.0,
            height: 76.0,
            bottom_offset: 140.0,
            steer_speed: 160.0,
            engine_accel: 8.0,
            brake_decel: 60.0,
            drag: 0.35,
            rpm_per_speed: 25.0,
            color: [0x00, 0xb2, 0xff],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GearboxConfig {
    /// Ratio per gear, first gear first.
    pub ratios: Vec<f32>,
    pub idle_rpm: f32,
    pub redline_rpm: f32,
}

impl Default for GearboxConfig {
    fn default() -> Self {
        Self {
            ratios: vec![4.0, 3.2, 2.6, 2.1, 1.7, 1.4, 1.1, 0.9, 0.7],
            idle_rpm: 800.0,
            redline_rpm: 7000.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ObstacleConfig {
    pub spawn_interval: f32,
    pub min_width: f32,
    pub width_jitter: f32,
    pub min_height: f32,
    pub height_jitter: f32,
    /// Extra distance above the screen at which new obstacles appear.
    pub spawn_gap: f32,
    pub base_speed: f32,
    pub speed_jitter: f32,
    pub speed_per_score: f32,
    pub color: [u8; 3],
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            spawn_interval: 1.2,
            min_width: 40.0,
            width_jitter: 80.0,
            min_height: 20.0,
            height_jitter: 30.0,
            spawn_gap: 10.0,
            base_speed: 100.0,
            speed_jitter: 120.0,
            speed_per_score: 0.6,
            color: [0xff, 0x6b, 0x6b],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ScoringConfig {
    pub per_second: f32,
    pub per_speed: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            per_second: 10.0,
            per_speed: 0.05,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub asset_dir: PathBuf,
    pub engine_idle: String,
    pub engine_low: String,
    pub engine_high: String,
    pub gear_shift: String,
    pub crash: String,
    pub master_gain: f32,
    pub idle_gain: f32,
    pub cue_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            asset_dir: PathBuf::from("gearshift/assets"),
            engine_idle: "engine_idle.wav".to_string(),
            engine_low: "engine_low.wav".to_string(),
            engine_high: "engine_high.wav".to_string(),
            gear_shift: "gear_shift.wav".to_string(),
            crash: "crash.wav".to_string(),
            master_gain: 0.9,
            idle_gain: 0.06,
            cue_gain: 0.9,
        }
    }
}

impl AudioConfig {
    /// Relative file name configured for a sample.
    pub fn file_name(&self, name: SampleName) -> &str {
        match name {
            SampleName::EngineIdle => &self.engine_idle,
            SampleName::EngineLow => &self.engine_low,
            SampleName::EngineHigh => &self.engine_high,
            SampleName::GearShift => &self.gear_shift,
            SampleName::Crash => &self.crash,
        }
    }

    pub fn sample_path(&self, name: SampleName) -> PathBuf {
        self.asset_dir.join(self.file_name(name))
    }
}

impl GameConfig {
    /// Load a config from a TOML file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        config
            .validate()
            .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Save this config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(path, text)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.check_finite()?;

        let world = &self.world;
        if world.width <= 0.0 || world.height <= 0.0 {
            return Err("world size must be positive".to_string());
        }
        if world.max_frame_dt <= 0.0 {
            return Err(format!(
                "world.max_frame_dt must be positive, got {}",
                world.max_frame_dt
            ));
        }
        if world.road_margin < 0.0 || world.road_margin + world.road_fraction > 1.0 {
            return Err("road must lie within the screen".to_string());
        }
        if world.road_fraction * world.width < self.car.width {
            return Err("road is narrower than the car".to_string());
        }

        let gearbox = &self.gearbox;
        if gearbox.ratios.is_empty() {
            return Err("gearbox.ratios must list at least one gear".to_string());
        }
        if gearbox.ratios.len() > u8::MAX as usize {
            return Err(format!("gearbox.ratios has {} gears", gearbox.ratios.len()));
        }
        if gearbox.ratios.iter().any(|ratio| *ratio <= 0.0) {
            return Err("gearbox.ratios must all be positive".to_string());
        }
        if gearbox.redline_rpm <= gearbox.idle_rpm {
            return Err(format!(
                "redline ({}) must be above idle ({})",
                gearbox.redline_rpm, gearbox.idle_rpm
            ));
        }

        let obstacles = &self.obstacles;
        if obstacles.spawn_interval <= 0.0 {
            return Err("obstacles.spawn_interval must be positive".to_string());
        }
        if obstacles.min_width <= 0.0 || obstacles.min_height <= 0.0 {
            return Err("obstacles.min_width and min_height must be positive".to_string());
        }
        let non_negative = [
            ("width_jitter", obstacles.width_jitter),
            ("height_jitter", obstacles.height_jitter),
            ("speed_jitter", obstacles.speed_jitter),
            ("speed_per_score", obstacles.speed_per_score),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, value)| *value < 0.0) {
            return Err(format!("obstacles.{name} must not be negative, got {value}"));
        }

        if self.scoring.per_second <= 0.0 {
            return Err("scoring.per_second must be positive".to_string());
        }
        Ok(())
    }

    fn check_finite(&self) -> Result<(), String> {
        let (world, car, obstacles, scoring, audio) =
            (&self.world, &self.car, &self.obstacles, &self.scoring, &self.audio);
        let fields = [
            ("world.width", world.width),
            ("world.height", world.height),
            ("world.road_margin", world.road_margin),
            ("world.road_fraction", world.road_fraction),
            ("world.max_frame_dt", world.max_frame_dt),
            ("car.width", car.width),
            ("car.height", car.height),
            ("car.bottom_offset", car.bottom_offset),
            ("car.steer_speed", car.steer_speed),
            ("car.engine_accel", car.engine_accel),
            ("car.brake_decel", car.brake_decel),
            ("car.drag", car.drag),
            ("car.rpm_per_speed", car.rpm_per_speed),
            ("gearbox.idle_rpm", self.gearbox.idle_rpm),
            ("gearbox.redline_rpm", self.gearbox.redline_rpm),
            ("obstacles.spawn_interval", obstacles.spawn_interval),
            ("obstacles.min_width", obstacles.min_width),
            ("obstacles.width_jitter", obstacles.width_jitter),
            ("obstacles.min_height", obstacles.min_height),
            ("obstacles.height_jitter", obstacles.height_jitter),
            ("obstacles.spawn_gap", obstacles.spawn_gap),
            ("obstacles.base_speed", obstacles.base_speed),
            ("obstacles.speed_jitter", obstacles.speed_jitter),
            ("obstacles.speed_per_score", obstacles.speed_per_score),
            ("scoring.per_second", scoring.per_second),
            ("scoring.per_speed", scoring.per_speed),
            ("audio.master_gain", audio.master_gain),
            ("audio.idle_gain", audio.idle_gain),
            ("audio.cue_gain", audio.cue_gain),
        ];
        let ratios = self
            .gearbox
            .ratios
            .iter()
            .map(|ratio| ("gearbox.ratios", *ratio));
        match fields.into_iter().chain(ratios).find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(format!("{name} must be a finite number, got {value}")),
            None => Ok(()),
        }
    }
}
