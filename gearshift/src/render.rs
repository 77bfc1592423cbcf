use std::collections::HashMap;

use bevy::prelude::*;
use gearshift_core::config::WorldConfig;
use gearshift_core::physics::Road;

use crate::{ActiveSession, FrameSystems, Settings};

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ObstacleSprites>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (sync_car, sync_obstacles).in_set(FrameSystems::Present),
            );
    }
}

#[derive(Component)]
struct CarSprite;

#[derive(Component)]
struct ObstacleSprite;

/// Obstacle id to the sprite drawing it.
#[derive(Resource, Default)]
struct ObstacleSprites(HashMap<u64, Entity>);

const ROAD_COLOR: Color = Color::srgb(0.22, 0.22, 0.24);
const EDGE_COLOR: Color = Color::srgb(0.85, 0.85, 0.85);

/// Screen space has its origin top-left with y down; the 2D camera is centered with y up.
fn to_world(world: &WorldConfig, position: Vec2, size: Vec2, z: f32) -> Vec3 {
    let center = position + size / 2.0;
    Vec3::new(
        center.x - world.width / 2.0,
        world.height / 2.0 - center.y,
        z,
    )
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::srgb_u8(r, g, b)
}

fn setup_scene(mut commands: Commands, settings: Res<Settings>) {
    commands.spawn(Camera2d);

    let config = &settings.config;
    let world = &config.world;
    let road = Road::from_world(world);
    let road_size = Vec2::new(road.width, world.height);

    commands.spawn((
        Sprite::from_color(ROAD_COLOR, road_size),
        Transform::from_translation(to_world(world, Vec2::new(road.x, 0.0), road_size, 0.0)),
    ));
    for edge_x in [road.x - 2.0, road.right() - 2.0] {
        let size = Vec2::new(4.0, world.height);
        commands.spawn((
            Sprite::from_color(EDGE_COLOR, size),
            Transform::from_translation(to_world(world, Vec2::new(edge_x, 0.0), size, 0.1)),
        ));
    }

    let car = &config.car;
    commands.spawn((
        CarSprite,
        Sprite::from_color(rgb(car.color), Vec2::new(car.width, car.height)),
        Transform::default(),
    ));
}

fn sync_car(
    session: NonSend<ActiveSession>,
    settings: Res<Settings>,
    mut query: Query<&mut Transform, With<CarSprite>>,
) {
    let Ok(mut transform) = query.single_mut() else {
        return;
    };
    let car = session.0.car();
    transform.translation = to_world(&settings.config.world, car.position, car.size, 2.0);
}

fn sync_obstacles(
    mut commands: Commands,
    session: NonSend<ActiveSession>,
    settings: Res<Settings>,
    mut sprites: ResMut<ObstacleSprites>,
    mut transforms: Query<&mut Transform, With<ObstacleSprite>>,
) {
    let world = &settings.config.world;
    let obstacles = session.0.obstacles();

    sprites.0.retain(|id, entity| {
        let alive = obstacles.iter().any(|obstacle| obstacle.id == *id);
        if !alive {
            commands.entity(*entity).despawn();
        }
        alive
    });

    for obstacle in obstacles {
        let translation = to_world(world, obstacle.position, obstacle.size, 1.0);
        match sprites.0.get(&obstacle.id) {
            Some(entity) => {
                if let Ok(mut transform) = transforms.get_mut(*entity) {
                    transform.translation = translation;
                }
            }
            None => {
                let entity = commands
                    .spawn((
                        ObstacleSprite,
                        Sprite::from_color(rgb(obstacle.color), obstacle.size),
                        Transform::from_translation(translation),
                    ))
                    .id();
                sprites.0.insert(obstacle.id, entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_corners_map_to_camera_space() {
        let world = WorldConfig::default();
        let top_left = to_world(&world, Vec2::ZERO, Vec2::ZERO, 0.0);
        assert_eq!(top_left, Vec3::new(-240.0, 400.0, 0.0));

        let full = to_world(&world, Vec2::ZERO, Vec2::new(480.0, 800.0), 0.0);
        assert_eq!(full, Vec3::ZERO);

        let car = to_world(&world, Vec2::new(218.0, 660.0), Vec2::new(44.0, 76.0), 2.0);
        assert_eq!(car, Vec3::new(0.0, -298.0, 2.0));
    }
}
