pub mod audio;
pub mod config;
pub mod input;
pub mod obstacles;
pub mod physics;
pub mod session;

pub use config::GameConfig;
pub use input::{Control, InputAdapter, Intent};
pub use session::{GameSession, Telemetry};

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "gearshift/assets/gearshift.toml";
