//! Damped Euler integration shared by the server and client prediction.

use crate::{FRICTION, PLAYER_SPEED, WORLD_HEIGHT, WORLD_WIDTH};

/// A vector in 2D world space. Positive y points down, as on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        self.sub(other).length()
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn add(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    /// Clamps both components into the world rectangle.
    pub fn clamp_to_world(&self) -> Vec2 {
        Vec2::new(self.x.clamp(0.0, WORLD_WIDTH), self.y.clamp(0.0, WORLD_HEIGHT))
    }
}

/// An integrable object: position, velocity and the acceleration applied this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
}

impl Body {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// One damped Euler step: `v += a*dt; p += v*dt; v *= FRICTION`.
pub fn integrate(body: &mut Body, dt: f32) {
    body.velocity = body.velocity.add(body.acceleration.scale(dt));
    body.position = body.position.add(body.velocity.scale(dt));
    body.velocity = body.velocity.scale(FRICTION);
}

/// Directional input sampled for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl InputState {
    /// Direct acceleration of `PLAYER_SPEED` per active axis.
    ///
    /// Opposite keys do not cancel: right overrides left and down overrides
    /// up, so holding both still accelerates.
    pub fn acceleration(&self) -> Vec2 {
        let mut acceleration = Vec2::ZERO;

        if self.left {
            acceleration.x = -PLAYER_SPEED;
        }
        if self.right {
            acceleration.x = PLAYER_SPEED;
        }
        if self.up {
            acceleration.y = -PLAYER_SPEED;
        }
        if self.down {
            acceleration.y = PLAYER_SPEED;
        }

        acceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_vector_math() {
        let a = Vec2::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.scale(2.0), Vec2::new(6.0, 8.0));
        assert_eq!(a.add(Vec2::new(1.0, -1.0)), Vec2::new(4.0, 3.0));
        assert_eq!(a.distance(Vec2::ZERO), 5.0);
    }

    #[test]
    fn test_clamp_to_world() {
        let clamped = Vec2::new(-5.0, WORLD_HEIGHT + 20.0).clamp_to_world();
        assert_eq!(clamped, Vec2::new(0.0, WORLD_HEIGHT));
    }

    #[test]
    fn test_integrate_single_step() {
        let mut body = Body {
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::new(10.0, 0.0),
            acceleration: Vec2::new(60.0, -60.0),
        };

        integrate(&mut body, DT);

        // v = 10 + 60/60 = 11, p = 100 + 11/60, then v *= 0.98
        assert_approx_eq!(body.position.x, 100.0 + 11.0 * DT, 1e-4);
        assert_approx_eq!(body.position.y, 100.0 - 1.0 * DT, 1e-4);
        assert_approx_eq!(body.velocity.x, 11.0 * FRICTION, 1e-4);
        assert_approx_eq!(body.velocity.y, -1.0 * FRICTION, 1e-4);
    }

    #[test]
    fn test_velocity_decays_geometrically_without_input() {
        let v0 = Vec2::new(120.0, -80.0);
        let mut body = Body {
            position: Vec2::ZERO,
            velocity: v0,
            acceleration: Vec2::ZERO,
        };

        for n in 1..=120 {
            integrate(&mut body, DT);
            let factor = FRICTION.powi(n);
            assert_approx_eq!(body.velocity.x, v0.x * factor, 1e-3);
            assert_approx_eq!(body.velocity.y, v0.y * factor, 1e-3);
        }
    }

    #[test]
    fn test_input_acceleration() {
        let idle = InputState::default();
        assert_eq!(idle.acceleration(), Vec2::ZERO);

        let up_left = InputState {
            left: true,
            up: true,
            ..InputState::default()
        };
        assert_eq!(up_left.acceleration(), Vec2::new(-PLAYER_SPEED, -PLAYER_SPEED));

        let both = InputState {
            left: true,
            right: true,
            ..InputState::default()
        };
        assert_eq!(both.acceleration(), Vec2::new(PLAYER_SPEED, 0.0));
    }

    #[test]
    fn test_held_input_accelerates_then_saturates() {
        let input = InputState {
            right: true,
            ..InputState::default()
        };
        let mut body = Body::at(Vec2::new(800.0, 600.0));

        let mut last_speed = 0.0;
        for _ in 0..30 {
            body.acceleration = input.acceleration();
            integrate(&mut body, DT);
            assert!(body.velocity.x > last_speed);
            last_speed = body.velocity.x;
        }

        // Terminal velocity of the damped step is a*dt*F/(1-F).
        let terminal = PLAYER_SPEED * DT * FRICTION / (1.0 - FRICTION);
        assert!(body.velocity.x < terminal);
        assert!(body.position.x > 800.0);
    }
}
