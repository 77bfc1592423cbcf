use bevy_math::{Rect, Vec2};
use tracing::trace;

use crate::config::{CarConfig, GameConfig, GearboxConfig, WorldConfig};
use crate::input::Intent;

/// Horizontal extent of the drivable road in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Road {
    pub x: f32,
    pub width: f32,
}

impl Road {
    pub fn from_world(world: &WorldConfig) -> Self {
        Self {
            x: world.width * world.road_margin,
            width: world.width * world.road_fraction,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Clamp the left edge of something `width` wide so it stays fully on the road.
    pub fn clamp_x(&self, x: f32, width: f32) -> f32 {
        let max_x = (self.right() - width).max(self.x);
        x.clamp(self.x, max_x)
    }
}

/// Inclusive AABB overlap: rectangles that only touch still collide.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}

/// Screen-space rectangle from a top-left corner and a size (y grows downward).
pub fn rect_at(position: Vec2, size: Vec2) -> Rect {
    Rect::from_corners(position, position + size)
}

/// The player's car. `position` is the top-left corner in screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub position: Vec2,
    pub size: Vec2,
    pub speed: f32,
    pub lateral_velocity: f32,
    pub color: [u8; 3],
}

impl Car {
    pub fn spawn(config: &CarConfig, world: &WorldConfig, road: &Road) -> Self {
        let size = Vec2::new(config.width, config.height);
        let x = road.clamp_x(world.width / 2.0, size.x);
        let y = world.height - config.bottom_offset;
        Self {
            position: Vec2::new(x, y),
            size,
            speed: 0.0,
            lateral_velocity: 0.0,
            color: config.color,
        }
    }

    pub fn bounds(&self) -> Rect {
        rect_at(self.position, self.size)
    }
}

/// Manual gearbox. Gears are numbered from 1.
#[derive(Debug, Clone)]
pub struct Gearbox {
    ratios: Vec<f32>,
    gear: u8,
}

impl Gearbox {
    /// An empty table becomes a single direct-drive gear; more than 255 gears are cut off.
    pub fn new(mut ratios: Vec<f32>) -> Self {
        if ratios.is_empty() {
            ratios.push(1.0);
        }
        ratios.truncate(usize::from(u8::MAX));
        Self { ratios, gear: 1 }
    }

    pub fn gear(&self) -> u8 {
        self.gear
    }

    pub fn max_gear(&self) -> u8 {
        self.ratios.len() as u8
    }

    pub fn ratio(&self) -> f32 {
        self.ratios[usize::from(self.gear) - 1]
    }

    /// Returns `true` if the gear changed.
    pub fn shift_up(&mut self) -> bool {
        if self.gear < self.max_gear() {
            self.gear += 1;
            true
        } else {
            false
        }
    }

    /// Returns `true` if the gear changed.
    pub fn shift_down(&mut self) -> bool {
        if self.gear > 1 {
            self.gear -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DriveParams {
    steer_speed: f32,
    engine_accel: f32,
    brake_decel: f32,
    drag: f32,
    rpm_per_speed: f32,
    idle_rpm: f32,
    redline_rpm: f32,
}

impl DriveParams {
    fn new(car: &CarConfig, gearbox: &GearboxConfig) -> Self {
        Self {
            steer_speed: car.steer_speed,
            engine_accel: car.engine_accel,
            brake_decel: car.brake_decel,
            drag: car.drag,
            rpm_per_speed: car.rpm_per_speed,
            idle_rpm: gearbox.idle_rpm,
            redline_rpm: gearbox.redline_rpm,
        }
    }
}

/// Engine speed for a road speed in a given ratio, with the rev limiter applied.
pub fn engine_rpm(speed: f32, ratio: f32, rpm_per_speed: f32, idle: f32, redline: f32) -> f32 {
    (idle + speed.abs() * ratio * rpm_per_speed).min(redline).max(idle)
}

/// Which way a shift went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Up,
    Down,
}

/// Car kinematics, gearbox and engine speed.
#[derive(Debug, Clone)]
pub struct Physics {
    car: Car,
    gearbox: Gearbox,
    road: Road,
    params: DriveParams,
    rpm: f32,
}

impl Physics {
    pub fn new(config: &GameConfig) -> Self {
        let road = Road::from_world(&config.world);
        let params = DriveParams::new(&config.car, &config.gearbox);
        Self {
            car: Car::spawn(&config.car, &config.world, &road),
            gearbox: Gearbox::new(config.gearbox.ratios.clone()),
            road,
            rpm: params.idle_rpm,
            params,
        }
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    pub fn road(&self) -> &Road {
        &self.road
    }

    pub fn gear(&self) -> u8 {
        self.gearbox.gear()
    }

    pub fn max_gear(&self) -> u8 {
        self.gearbox.max_gear()
    }

    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    pub fn idle_rpm(&self) -> f32 {
        self.params.idle_rpm
    }

    pub fn redline_rpm(&self) -> f32 {
        self.params.redline_rpm
    }

    /// Road speed at which the current gear hits the redline.
    pub fn gear_top_speed(&self) -> f32 {
        let params = &self.params;
        (params.redline_rpm - params.idle_rpm) / (self.gearbox.ratio() * params.rpm_per_speed)
    }

    /// Apply one shift request. RPM follows immediately so telemetry sees the new value.
    pub fn shift(&mut self, shift: Shift) -> bool {
        let changed = match shift {
            Shift::Up => self.gearbox.shift_up(),
            Shift::Down => self.gearbox.shift_down(),
        };
        if changed {
            self.rpm = self.compute_rpm();
            trace!(gear = self.gearbox.gear(), ?shift, "gear shift");
        }
        changed
    }

    fn compute_rpm(&self) -> f32 {
        let params = &self.params;
        engine_rpm(
            self.car.speed,
            self.gearbox.ratio(),
            params.rpm_per_speed,
            params.idle_rpm,
            params.redline_rpm,
        )
    }

    /// Advance speed, lateral position and RPM by `dt` seconds.
    pub fn step(&mut self, intent: &Intent, dt: f32) {
        let dt = dt.max(0.0);
        let params = self.params;
        let speed = self.car.speed;

        self.car.speed = if intent.brake {
            toward_zero(speed, params.brake_decel * dt)
        } else if intent.gas {
            let top = self.gear_top_speed();
            if speed < top {
                let accel = params.engine_accel * self.gearbox.ratio();
                (speed + accel * dt).min(top)
            } else {
                // Over-revved after a downshift: gas adds nothing, drag still applies.
                toward_zero(speed, speed.abs() * params.drag * dt)
            }
        } else {
            toward_zero(speed, speed.abs() * params.drag * dt)
        };

        self.car.lateral_velocity = intent.steer_axis() * params.steer_speed;
        let x = self.car.position.x + self.car.lateral_velocity * dt;
        self.car.position.x = self.road.clamp_x(x, self.car.size.x);

        self.rpm = self.compute_rpm();
    }
}

fn toward_zero(value: f32, amount: f32) -> f32 {
    if value > 0.0 {
        (value - amount).max(0.0)
    } else {
        (value + amount).min(0.0)
    }
}
