use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Slack allowed when checking containment, to absorb float rounding.
pub const CONTAINMENT_EPSILON: f32 = 1e-3;

/// Widest deviation from the inward normal when the ball is kicked off a
/// stalled wall contact.
const STALL_PERTURBATION: f32 = std::f32::consts::FRAC_PI_6;

#[derive(Debug, Clone, PartialEq)]
pub enum ArenaError {
    InvalidRadius(f32),
    InvalidCenter,
}

impl std::fmt::Display for ArenaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRadius(r) => write!(f, "arena radius must be finite and > 0, got {r}"),
            Self::InvalidCenter => write!(f, "arena center must be finite"),
        }
    }
}

impl std::error::Error for ArenaError {}

/// Circular arena.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub center: Vec2,
    pub radius: f32,
}

impl Arena {
    pub fn new(center: Vec2, radius: f32) -> Result<Self, ArenaError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ArenaError::InvalidRadius(radius));
        }
        if !center.is_finite() {
            return Err(ArenaError::InvalidCenter);
        }
        Ok(Self { center, radius })
    }

    /// Furthest an entity's centre may be from the arena centre.
    pub fn max_distance(&self, entity_radius: f32) -> f32 {
        (self.radius - entity_radius).max(0.0)
    }

    /// Project `position` back inside the arena along the radial direction.
    pub fn clamp(&self, position: Vec2, entity_radius: f32) -> Vec2 {
        let offset = position - self.center;
        let max = self.max_distance(entity_radius);
        if offset.length_squared() > max * max {
            self.center + offset.normalize_or_zero() * max
        } else {
            position
        }
    }

    pub fn contains(&self, position: Vec2, entity_radius: f32) -> bool {
        position.distance(self.center) <= self.max_distance(entity_radius) + CONTAINMENT_EPSILON
    }

    /// Outward unit normal of the wall nearest `position`. Falls back to +X at
    /// the exact centre.
    pub fn outward_normal(&self, position: Vec2) -> Vec2 {
        let n = (position - self.center).normalize_or_zero();
        if n == Vec2::ZERO { Vec2::X } else { n }
    }

    /// `count` points evenly spaced on a ring at `ring_fraction` of the radius.
    pub fn spawn_points(&self, count: usize, ring_fraction: f32) -> Vec<Vec2> {
        let ring = self.radius * ring_fraction;
        (0..count)
            .map(|i| {
                let angle = std::f32::consts::TAU * (i as f32) / (count.max(1) as f32);
                self.center + Vec2::from_angle(angle) * ring
            })
            .collect()
    }

    /// Uniformly random angle, random distance up to `fraction` of the radius.
    pub fn random_point_within(&self, fraction: f32, rng: &mut impl Rng) -> Vec2 {
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let dist = rng.random::<f32>() * self.radius * fraction;
        self.center + Vec2::from_angle(angle) * dist
    }
}

/// Elastic reflection about `normal`, scaled by `damping`.
pub fn reflect(velocity: Vec2, normal: Vec2, damping: f32) -> Vec2 {
    (velocity - 2.0 * velocity.dot(normal) * normal) * damping
}

/// Result of resolving the ball against the wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    pub position: Vec2,
    pub velocity: Vec2,
    /// The post-bounce speed was below the floor and was reset.
    pub stall_reset: bool,
}

/// Keep a moving body inside the arena, bouncing it off the wall.
///
/// On contact the position is clamped and the velocity reflected and damped.
/// A body that is touching or hugging the wall below `min_speed`, or that has
/// stopped anywhere, is relaunched at exactly `min_speed` along the inward
/// normal with a random deflection so it never rests on the boundary.
/// Returns `None` when nothing had to change.
pub fn bounce_off_wall(
    arena: &Arena,
    position: Vec2,
    velocity: Vec2,
    entity_radius: f32,
    damping: f32,
    min_speed: f32,
    rng: &mut impl Rng,
) -> Option<WallContact> {
    let max = arena.max_distance(entity_radius);
    let dist = position.distance(arena.center);
    let normal = arena.outward_normal(position);

    let touching = dist >= max;
    let hugging = dist >= max - entity_radius;

    let mut out_pos = position;
    let mut out_vel = velocity;
    if touching {
        out_pos = arena.clamp(position, entity_radius);
        if velocity.dot(normal) > 0.0 {
            out_vel = reflect(velocity, normal, damping);
        }
    }

    let stalled = (out_vel.length() < min_speed && (touching || hugging))
        || out_vel.length_squared() <= f32::EPSILON;
    if stalled {
        let jitter = rng.random_range(-STALL_PERTURBATION..=STALL_PERTURBATION);
        let inward = Vec2::from_angle(jitter).rotate(-normal);
        out_vel = inward * min_speed;
    }

    if !touching && !stalled {
        return None;
    }
    Some(WallContact {
        position: out_pos,
        velocity: out_vel,
        stall_reset: stalled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn arena() -> Arena {
        Arena::new(Vec2::ZERO, 300.0).unwrap()
    }

    #[test]
    fn rejects_bad_radius() {
        assert_eq!(
            Arena::new(Vec2::ZERO, 0.0),
            Err(ArenaError::InvalidRadius(0.0))
        );
        assert!(Arena::new(Vec2::ZERO, -5.0).is_err());
        assert!(Arena::new(Vec2::ZERO, f32::NAN).is_err());
        assert!(Arena::new(Vec2::new(f32::INFINITY, 0.0), 10.0).is_err());
    }

    #[test]
    fn clamp_projects_onto_boundary() {
        let a = arena();
        let clamped = a.clamp(Vec2::new(500.0, 0.0), 20.0);
        assert!((clamped - Vec2::new(280.0, 0.0)).length() < 1e-3);
        let inside = Vec2::new(10.0, -10.0);
        assert_eq!(a.clamp(inside, 20.0), inside);
    }

    #[test]
    fn reflect_head_on_reverses_and_damps() {
        let v = reflect(Vec2::new(100.0, 0.0), Vec2::X, 0.9);
        assert!((v - Vec2::new(-90.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn reflect_glancing_keeps_tangent() {
        let v = reflect(Vec2::new(100.0, 50.0), Vec2::X, 1.0);
        assert!((v - Vec2::new(-100.0, 50.0)).length() < 1e-3);
    }

    #[test]
    fn spawn_points_on_ring() {
        let a = arena();
        let points = a.spawn_points(8, 0.7);
        assert_eq!(points.len(), 8);
        for p in &points {
            assert!((p.length() - 210.0).abs() < 1e-2, "Spawn {p} not on ring");
        }
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                assert!(points[i].distance(points[j]) > 1.0, "Spawn points overlap");
            }
        }
    }

    #[test]
    fn fast_wall_hit_reflects() {
        let mut rng = StdRng::seed_from_u64(1);
        let contact = bounce_off_wall(
            &arena(),
            Vec2::new(295.0, 0.0),
            Vec2::new(400.0, 0.0),
            12.0,
            0.9,
            120.0,
            &mut rng,
        )
        .expect("wall contact");
        assert!((contact.position.x - 288.0).abs() < 1e-3);
        assert!((contact.velocity - Vec2::new(-360.0, 0.0)).length() < 1e-2);
        assert!(!contact.stall_reset);
    }

    #[test]
    fn slow_wall_hit_resets_to_min_speed_inward() {
        let mut rng = StdRng::seed_from_u64(2);
        let contact = bounce_off_wall(
            &arena(),
            Vec2::new(290.0, 0.0),
            Vec2::new(30.0, 0.0),
            12.0,
            0.9,
            120.0,
            &mut rng,
        )
        .expect("wall contact");
        assert!(contact.stall_reset);
        assert!((contact.velocity.length() - 120.0).abs() < 1e-3);
        assert!(contact.velocity.x < 0.0, "Reset velocity must point inward");
    }

    #[test]
    fn stopped_ball_relaunches_anywhere() {
        let mut rng = StdRng::seed_from_u64(3);
        let contact =
            bounce_off_wall(&arena(), Vec2::new(5.0, 5.0), Vec2::ZERO, 12.0, 0.9, 120.0, &mut rng)
                .expect("stall reset");
        assert!((contact.velocity.length() - 120.0).abs() < 1e-3);
    }

    #[test]
    fn free_flight_is_untouched() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(
            bounce_off_wall(
                &arena(),
                Vec2::new(0.0, 0.0),
                Vec2::new(300.0, 0.0),
                12.0,
                0.9,
                120.0,
                &mut rng,
            )
            .is_none()
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn clamp_always_contains(
                x in -2000.0f32..2000.0,
                y in -2000.0f32..2000.0,
                r in 1.0f32..50.0,
            ) {
                let a = arena();
                let p = a.clamp(Vec2::new(x, y), r);
                prop_assert!(a.contains(p, r), "{p} escaped arena for radius {r}");
            }

            #[test]
            fn bounce_never_leaves_ball_resting(
                angle in 0.0f32..std::f32::consts::TAU,
                speed in 0.0f32..900.0,
                seed in any::<u64>(),
            ) {
                let a = arena();
                let mut rng = StdRng::seed_from_u64(seed);
                let pos = Vec2::from_angle(angle) * 289.0;
                let vel = Vec2::from_angle(angle) * speed;
                let out = bounce_off_wall(&a, pos, vel, 12.0, 0.9, 120.0, &mut rng)
                    .map_or(vel, |c| c.velocity);
                prop_assert!(out.length() >= 120.0 - 1e-3, "speed {} below floor", out.length());
            }
        }
    }
}
