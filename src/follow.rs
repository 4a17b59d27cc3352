// Companions seeking their leader.
use bevy::prelude::*;

use crate::motion::{Dormant, Position, Velocity};
use crate::player::ControlTarget;

#[derive(Component, Debug, Clone, Copy)]
pub struct Follow {
    pub target: Entity,
    pub speed: f32,
    /// Closer than this the follower stops.
    pub min_distance: f32,
    pub enabled: bool,
}

impl Follow {
    pub fn new(target: Entity, speed: f32, min_distance: f32) -> Self {
        Self {
            target,
            speed,
            min_distance,
            enabled: false,
        }
    }

    pub fn velocity(&self, from: Vec2, to: Vec2) -> Vec2 {
        if !self.enabled {
            return Vec2::ZERO;
        }
        seek(from, to, self.speed, self.min_distance)
    }
}

pub fn seek(from: Vec2, to: Vec2, speed: f32, min_distance: f32) -> Vec2 {
    let offset = to - from;
    if offset.length() <= min_distance {
        return Vec2::ZERO;
    }
    offset.normalize_or_zero() * speed
}

/// Steers every follower except whoever the player is driving.
pub fn party_follow(
    control: Res<ControlTarget>,
    targets: Query<&Position>,
    mut followers: Query<(Entity, &Position, &mut Velocity, &Follow), Without<Dormant>>,
) {
    for (entity, position, mut velocity, follow) in &mut followers {
        if entity == control.0 {
            continue;
        }
        let Ok(target) = targets.get(follow.target) else {
            velocity.0 = Vec2::ZERO;
            continue;
        };
        velocity.0 = follow.velocity(position.0, target.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follow(enabled: bool) -> Follow {
        Follow {
            target: Entity::PLACEHOLDER,
            speed: 120.0,
            min_distance: 26.0,
            enabled,
        }
    }

    #[test]
    fn seeks_at_full_speed_when_far() {
        let v = follow(true).velocity(Vec2::ZERO, Vec2::new(100.0, 0.0));
        assert!((v.length() - 120.0).abs() < 1e-3);
        assert!(v.x > 0.0);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn stops_inside_min_distance() {
        let f = follow(true);
        assert_eq!(f.velocity(Vec2::ZERO, Vec2::new(26.0, 0.0)), Vec2::ZERO);
        assert_eq!(f.velocity(Vec2::ONE, Vec2::ONE), Vec2::ZERO);
    }

    #[test]
    fn disabled_follower_stands_still() {
        assert_eq!(
            follow(false).velocity(Vec2::ZERO, Vec2::new(100.0, 0.0)),
            Vec2::ZERO
        );
    }

    #[test]
    fn controlled_and_dormant_followers_are_skipped() {
        let mut app = App::new();
        let leader = app.world_mut().spawn(Position(Vec2::new(200.0, 0.0))).id();
        let mut f = follow(true);
        f.target = leader;
        let driven = app
            .world_mut()
            .spawn((Position(Vec2::ZERO), Velocity(Vec2::new(5.0, 5.0)), f))
            .id();
        let sleeping = app
            .world_mut()
            .spawn((Position(Vec2::ZERO), Velocity::default(), f, Dormant))
            .id();
        let trailing = app
            .world_mut()
            .spawn((Position(Vec2::ZERO), Velocity::default(), f))
            .id();
        app.insert_resource(ControlTarget(driven))
            .add_systems(Update, party_follow);
        app.update();

        let world = app.world();
        assert_eq!(world.get::<Velocity>(driven).unwrap().0, Vec2::new(5.0, 5.0));
        assert_eq!(world.get::<Velocity>(sleeping).unwrap().0, Vec2::ZERO);
        assert!((world.get::<Velocity>(trailing).unwrap().0.x - 120.0).abs() < 1e-3);
    }
}
