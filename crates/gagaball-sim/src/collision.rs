use glam::Vec2;

use gagaball_core::powerup::PowerupKind;
use gagaball_core::time::Millis;

use crate::config::MatchConfig;
use crate::entity::{Ball, Player};

/// What a ball-player contact resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// Ball redirected; `parry` marks a timed parry rather than a swing.
    Deflected { parry: bool },
    Eliminated,
    /// Touching, but neither condition holds. No state change.
    PassThrough,
}

/// Classify the contact between `ball` and `player`, or `None` when they are
/// not in contact.
///
/// An armed parry reaches further than the bodies do: it fires as soon as the
/// ball is inside `parry_range`. The player that last deflected the ball is
/// ignored until the ball's target lock lapses.
pub fn classify_contact(
    ball: &Ball,
    player: &Player,
    now: Millis,
    config: &MatchConfig,
) -> Option<ContactOutcome> {
    if !player.is_active() {
        return None;
    }
    if ball.last_deflector == Some(player.id) && ball.is_locked(now) {
        return None;
    }

    let distance = ball.position.distance(player.position);
    let parry_contact = player.parry.is_armed(now) && distance < config.parry_range;
    let body_contact = distance < ball.radius + player.radius;

    if parry_contact {
        return Some(ContactOutcome::Deflected { parry: true });
    }
    if !body_contact {
        return None;
    }
    if player.velocity.length() > config.swing_velocity_threshold {
        return Some(ContactOutcome::Deflected { parry: false });
    }
    if ball.speed() > config.elimination_speed_threshold && player.is_vulnerable(now) {
        return Some(ContactOutcome::Eliminated);
    }
    Some(ContactOutcome::PassThrough)
}

/// Send the ball away from `player` at hit power times any modifiers.
///
/// Returns the new ball speed.
pub fn deflect(
    ball: &mut Ball,
    player: &mut Player,
    parry: bool,
    now: Millis,
    config: &MatchConfig,
) -> f32 {
    let mut direction = (ball.position - player.position).normalize_or_zero();
    if direction == Vec2::ZERO {
        direction = (-ball.velocity).normalize_or_zero();
    }
    if direction == Vec2::ZERO {
        direction = Vec2::X;
    }

    let mut power = config.hit_power;
    if parry {
        power *= config.parry_multiplier;
        ball.bump_multiplier(config.speed_multiplier_increment, config.speed_multiplier_cap);
        player.parry.consume();
    }
    if player.has_powerup(PowerupKind::DoubleBounce) {
        power *= config.double_bounce_multiplier;
    }

    ball.velocity = direction * power;
    ball.hit_count += 1;
    ball.current_target = None;
    ball.target_lock_time = now + config.retarget_delay_ms;
    ball.last_deflector = Some(player.id);
    power
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{PlayerRole, spawn_player};

    fn config() -> MatchConfig {
        MatchConfig::default()
    }

    fn vulnerable_player_at(pos: Vec2) -> Player {
        let mut p = spawn_player(1, "P", pos, PlayerRole::LocalHuman, 0, &config());
        p.invulnerable_until = None;
        p
    }

    fn ball_at(pos: Vec2, vel: Vec2) -> Ball {
        Ball::new(pos, vel, &config())
    }

    #[test]
    fn no_contact_when_apart() {
        let player = vulnerable_player_at(Vec2::ZERO);
        let ball = ball_at(Vec2::new(100.0, 0.0), Vec2::new(-300.0, 0.0));
        assert_eq!(classify_contact(&ball, &player, 0, &config()), None);
    }

    #[test]
    fn fast_ball_eliminates_still_player() {
        let player = vulnerable_player_at(Vec2::ZERO);
        let ball = ball_at(Vec2::new(25.0, 0.0), Vec2::new(-200.0, 0.0));
        assert_eq!(
            classify_contact(&ball, &player, 0, &config()),
            Some(ContactOutcome::Eliminated)
        );
    }

    #[test]
    fn slow_ball_passes_through() {
        let player = vulnerable_player_at(Vec2::ZERO);
        let ball = ball_at(Vec2::new(25.0, 0.0), Vec2::new(-100.0, 0.0));
        assert_eq!(
            classify_contact(&ball, &player, 0, &config()),
            Some(ContactOutcome::PassThrough)
        );
    }

    #[test]
    fn spawn_protection_passes_through() {
        let player = spawn_player(1, "P", Vec2::ZERO, PlayerRole::LocalHuman, 0, &config());
        let ball = ball_at(Vec2::new(25.0, 0.0), Vec2::new(-700.0, 0.0));
        assert_eq!(
            classify_contact(&ball, &player, 1_000, &config()),
            Some(ContactOutcome::PassThrough)
        );
    }

    #[test]
    fn moving_player_swings() {
        let mut player = vulnerable_player_at(Vec2::ZERO);
        player.velocity = Vec2::new(200.0, 0.0);
        let ball = ball_at(Vec2::new(25.0, 0.0), Vec2::new(-700.0, 0.0));
        assert_eq!(
            classify_contact(&ball, &player, 0, &config()),
            Some(ContactOutcome::Deflected { parry: false })
        );
    }

    #[test]
    fn armed_parry_reaches_beyond_body() {
        let mut player = vulnerable_player_at(Vec2::ZERO);
        player.parry.press(0, 200);
        let ball = ball_at(Vec2::new(50.0, 0.0), Vec2::new(-400.0, 0.0));
        assert_eq!(
            classify_contact(&ball, &player, 100, &config()),
            Some(ContactOutcome::Deflected { parry: true })
        );
    }

    #[test]
    fn deflector_ignored_during_lock() {
        let mut player = vulnerable_player_at(Vec2::ZERO);
        let mut ball = ball_at(Vec2::new(25.0, 0.0), Vec2::new(-400.0, 0.0));
        deflect(&mut ball, &mut player, false, 1_000, &config());
        ball.position = Vec2::new(25.0, 0.0);
        assert_eq!(classify_contact(&ball, &player, 1_100, &config()), None);
        assert!(classify_contact(&ball, &player, 1_300, &config()).is_some());
    }

    #[test]
    fn parry_deflection_doubles_power_and_bumps_multiplier() {
        let mut player = vulnerable_player_at(Vec2::ZERO);
        player.parry.press(0, 200);
        let mut ball = ball_at(Vec2::new(0.0, 40.0), Vec2::new(0.0, -400.0));
        let speed = deflect(&mut ball, &mut player, true, 50, &config());
        assert!((speed - 700.0).abs() < 1e-3);
        assert!((ball.velocity - Vec2::new(0.0, 700.0)).length() < 1e-3);
        assert!((ball.speed_multiplier - 1.1).abs() < 1e-6);
        assert!(!player.parry.is_armed(60), "Parry is spent");
        assert_eq!(ball.current_target, None);
        assert_eq!(ball.target_lock_time, 350);
    }

    #[test]
    fn double_bounce_stacks_with_parry() {
        use gagaball_core::powerup::ActivePowerup;
        let mut player = vulnerable_player_at(Vec2::ZERO);
        player.active_powerup = Some(ActivePowerup::new(PowerupKind::DoubleBounce, 0, 5_000));
        let mut ball = ball_at(Vec2::new(30.0, 0.0), Vec2::ZERO);
        let swing = deflect(&mut ball, &mut player, false, 0, &config());
        assert!((swing - 525.0).abs() < 1e-3);
        let parry = deflect(&mut ball, &mut player, true, 0, &config());
        assert!((parry - 1050.0).abs() < 1e-3);
    }
}
