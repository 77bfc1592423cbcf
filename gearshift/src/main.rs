use std::path::{Path, PathBuf};

use bevy::{prelude::*, window::WindowResolution};
use gearshift_core::audio::{AudioMixer, MixerSettings, SampleLoader};
use gearshift_core::{DEFAULT_CONFIG_PATH, GameConfig, GameSession, InputAdapter, Telemetry};

use rodio_backend::RodioBackend;

mod input;
mod render;
mod rodio_backend;
mod ui;

// ── Resources ───────────────────────────────────────────────────────────

/// Config the app was started with, plus why the file was not used if it wasn't.
#[derive(Resource)]
pub struct Settings {
    pub config: GameConfig,
    pub path: PathBuf,
    pub load_error: Option<String>,
}

/// The running game. Lives on the main thread because the audio stream is not `Send`.
pub struct ActiveSession(pub GameSession<RodioBackend>);

#[derive(Resource, Default)]
pub struct PlayerInput(pub InputAdapter);

/// Telemetry from the most recent tick, for the HUD.
#[derive(Resource)]
pub struct LatestTelemetry(pub Telemetry);

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameSystems {
    Input,
    Simulate,
    Present,
}

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let settings = load_settings(&config_path);
    let world = &settings.config.world;

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Gearshift".into(),
                resolution: WindowResolution::new(world.width as u32, world.height as u32),
                resizable: false,
                ..default()
            }),
            ..default()
        }))
        .add_plugins((input::InputPlugin, render::RenderPlugin, ui::HudPlugin))
        .insert_resource(ClearColor(Color::srgb(0.12, 0.32, 0.14)))
        .insert_resource(settings)
        .init_resource::<PlayerInput>()
        .configure_sets(
            Update,
            (
                FrameSystems::Input,
                FrameSystems::Simulate,
                FrameSystems::Present,
            )
                .chain(),
        )
        .add_systems(Startup, start_session)
        .add_systems(Update, tick_session.in_set(FrameSystems::Simulate))
        .run();
}

fn load_settings(path: &Path) -> Settings {
    match GameConfig::load(path) {
        Ok(config) => Settings {
            config,
            path: path.to_path_buf(),
            load_error: None,
        },
        Err(error) => Settings {
            config: GameConfig::default(),
            path: path.to_path_buf(),
            load_error: Some(error),
        },
    }
}

/// Open the audio device, start loading samples and create the session.
fn start_session(world: &mut World) {
    let Some(settings) = world.get_resource::<Settings>() else {
        return;
    };
    match &settings.load_error {
        Some(error) => warn!("{error}; using default settings"),
        None => info!("Loaded config from {}", settings.path.display()),
    }
    let config = settings.config.clone();

    let mixer_settings = MixerSettings::new(
        &config.audio,
        config.gearbox.idle_rpm,
        config.gearbox.redline_rpm,
    );
    let mut mixer = AudioMixer::new(RodioBackend::open(), mixer_settings);
    if mixer.backend().is_some() {
        info!("Loading samples from {}", config.audio.asset_dir.display());
        mixer.begin_loading(SampleLoader::spawn(&config.audio, rodio_backend::decode));
    }

    let session = GameSession::new(config, mixer);
    world.insert_resource(LatestTelemetry(session.telemetry()));
    world.insert_non_send_resource(ActiveSession(session));
}

fn tick_session(
    time: Res<Time>,
    mut input: ResMut<PlayerInput>,
    mut session: NonSendMut<ActiveSession>,
    mut telemetry: ResMut<LatestTelemetry>,
) {
    let intent = input.0.snapshot();
    telemetry.0 = session.0.tick(&intent, time.delta_secs());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/gearshift.toml");
        let settings = load_settings(&path);
        assert_eq!(settings.load_error, None);
        assert_eq!(settings.config.gearbox.ratios.len(), 9);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let settings = load_settings(Path::new("no/such/gearshift.toml"));
        assert!(settings.load_error.is_some());
        assert_eq!(settings.config.world.width, 480.0);
    }
}
