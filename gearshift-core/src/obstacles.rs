use bevy_math::{Rect, Vec2};
use rand::Rng;

use crate::config::ObstacleConfig;
use crate::physics::{Road, overlaps, rect_at};

/// Something the car must not touch. `position` is the top-left corner in screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: u64,
    pub position: Vec2,
    pub size: Vec2,
    /// Downward speed in px/s.
    pub speed: f32,
    pub color: [u8; 3],
}

impl Obstacle {
    pub fn bounds(&self) -> Rect {
        rect_at(self.position, self.size)
    }
}

/// Downward speed for a new obstacle. `jitter` is a uniform sample in `[0, 1)`.
///
/// Non-decreasing in `score` for any fixed jitter.
pub fn spawn_speed(config: &ObstacleConfig, score: f32, jitter: f32) -> f32 {
    config.base_speed + jitter * config.speed_jitter + score.max(0.0) * config.speed_per_score
}

/// Result of advancing the field by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStep {
    pub spawned: usize,
    pub pruned: usize,
}

/// Spawns, advances and prunes obstacles on a fixed timer.
#[derive(Debug, Clone)]
pub struct ObstacleField {
    config: ObstacleConfig,
    road: Road,
    screen_height: f32,
    obstacles: Vec<Obstacle>,
    spawn_timer: f32,
    next_id: u64,
}

impl ObstacleField {
    pub fn new(config: ObstacleConfig, road: Road, screen_height: f32) -> Self {
        Self {
            config,
            road,
            screen_height,
            obstacles: Vec::new(),
            spawn_timer: 0.0,
            next_id: 1,
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn clear(&mut self) {
        self.obstacles.clear();
        self.spawn_timer = 0.0;
    }

    /// Insert a ready-made obstacle, clamped onto the road. Returns its id.
    pub fn insert(&mut self, position: Vec2, size: Vec2, speed: f32) -> u64 {
        let width = size.x.min(self.road.width);
        let id = self.next_id;
        self.next_id += 1;
        self.obstacles.push(Obstacle {
            id,
            position: Vec2::new(self.road.clamp_x(position.x, width), position.y),
            size: Vec2::new(width, size.y),
            speed,
            color: self.config.color,
        });
        id
    }

    /// Create one obstacle just above the top of the screen.
    pub fn spawn<R: Rng>(&mut self, rng: &mut R, score: f32) -> u64 {
        let config = &self.config;
        let width = config.min_width + rng.random::<f32>() * config.width_jitter;
        let height = config.min_height + rng.random::<f32>() * config.height_jitter;
        let x = self.road.x + rng.random::<f32>() * (self.road.width - width).max(0.0);
        let y = -height - config.spawn_gap;
        let speed = spawn_speed(config, score, rng.random::<f32>());
        self.insert(Vec2::new(x, y), Vec2::new(width, height), speed)
    }

    /// Run the spawn timer, move every obstacle down and drop the ones below the screen.
    pub fn step<R: Rng>(&mut self, rng: &mut R, dt: f32, score: f32) -> FieldStep {
        let mut step = FieldStep::default();

        self.spawn_timer += dt.max(0.0);
        // A single long frame spawns at most once.
        if self.spawn_timer > self.config.spawn_interval {
            self.spawn(rng, score);
            self.spawn_timer = (self.spawn_timer - self.config.spawn_interval)
                .min(self.config.spawn_interval);
            step.spawned = 1;
        }

        for obstacle in &mut self.obstacles {
            obstacle.position.y += obstacle.speed * dt;
        }

        let before = self.obstacles.len();
        let bottom = self.screen_height;
        self.obstacles.retain(|obstacle| obstacle.position.y <= bottom);
        step.pruned = before - self.obstacles.len();

        step
    }

    /// First obstacle overlapping `bounds`, if any.
    pub fn first_collision(&self, bounds: &Rect) -> Option<&Obstacle> {
        self.obstacles
            .iter()
            .find(|obstacle| overlaps(bounds, &obstacle.bounds()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn road() -> Road {
        Road {
            x: 38.4,
            width: 403.2,
        }
    }

    fn field() -> ObstacleField {
        ObstacleField::new(ObstacleConfig::default(), road(), 800.0)
    }

    #[test]
    fn spawns_once_per_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut field = field();
        let mut spawned = 0;
        // 12 seconds at 100 fps.
        for _ in 0..1_200 {
            spawned += field.step(&mut rng, 0.01, 0.0).spawned;
        }
        assert!((9..=10).contains(&spawned), "spawned {spawned}");
    }

    #[test]
    fn spawned_obstacles_start_above_screen_and_on_road() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut field = field();
        let road = road();
        for _ in 0..200 {
            field.spawn(&mut rng, 0.0);
        }
        for obstacle in field.obstacles() {
            assert!(obstacle.position.y + obstacle.size.y < 0.0);
            assert!(obstacle.position.x >= road.x);
            assert!(obstacle.position.x + obstacle.size.x <= road.right() + 1e-3);
            assert!((40.0..120.0).contains(&obstacle.size.x));
            assert!((20.0..50.0).contains(&obstacle.size.y));
        }
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut field = field();
        let a = field.spawn(&mut rng, 0.0);
        let b = field.spawn(&mut rng, 0.0);
        assert!(b > a);
    }

    #[test]
    fn off_road_insert_is_clamped() {
        let mut field = field();
        let road = road();
        field.insert(Vec2::new(-500.0, 0.0), Vec2::new(60.0, 20.0), 100.0);
        field.insert(Vec2::new(5_000.0, 0.0), Vec2::new(60.0, 20.0), 100.0);
        field.insert(Vec2::new(0.0, 0.0), Vec2::new(900.0, 20.0), 100.0);
        let obstacles = field.obstacles();
        assert_eq!(obstacles[0].position.x, road.x);
        assert_eq!(obstacles[1].position.x, road.right() - 60.0);
        assert_eq!(obstacles[2].position.x, road.x);
        assert_eq!(obstacles[2].size.x, road.width);
    }

    #[test]
    fn obstacles_below_screen_are_pruned() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut field = field();
        field.insert(Vec2::new(100.0, 790.0), Vec2::new(40.0, 20.0), 100.0);
        field.insert(Vec2::new(200.0, 100.0), Vec2::new(40.0, 20.0), 100.0);

        let step = field.step(&mut rng, 0.2, 0.0);
        assert_eq!(step.pruned, 1);
        assert_eq!(field.len(), 1);
        assert_eq!(field.obstacles()[0].position.y, 120.0);
    }

    #[test]
    fn long_session_does_not_grow_unbounded() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut field = field();
        let mut peak = 0;
        for _ in 0..60 * 60 * 10 {
            field.step(&mut rng, 1.0 / 60.0, 0.0);
            peak = peak.max(field.len());
        }
        assert!(peak < 20, "peak {peak}");
    }

    #[test]
    fn spawn_speed_rises_with_score() {
        let config = ObstacleConfig::default();
        for jitter in [0.0, 0.5, 0.999] {
            let mut prev = spawn_speed(&config, 0.0, jitter);
            for score in 1..500 {
                let speed = spawn_speed(&config, score as f32, jitter);
                assert!(speed >= prev);
                prev = speed;
            }
        }
        assert_eq!(spawn_speed(&config, 100.0, 0.0), 160.0);
    }

    #[test]
    fn collision_with_overlapping_obstacle() {
        let mut field = field();
        field.insert(Vec2::new(200.0, 700.0), Vec2::new(40.0, 20.0), 100.0);
        let car = rect_at(Vec2::new(200.0, 700.0), Vec2::new(44.0, 76.0));
        assert!(field.first_collision(&car).is_some());
    }

    #[test]
    fn no_collision_when_obstacle_is_left_of_car() {
        let mut field = field();
        field.insert(Vec2::new(100.0, 700.0), Vec2::new(40.0, 20.0), 100.0);
        let car = rect_at(Vec2::new(200.0, 700.0), Vec2::new(44.0, 76.0));
        assert!(field.first_collision(&car).is_none());
    }
}
