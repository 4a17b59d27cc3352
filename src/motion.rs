// Arcade-style movement in stage space.
//
// Stage space is 640x360 with the origin at the top left and y pointing down.
// Everything that lives in the scene carries a `Position` there, and
// `sync_transforms` maps it onto Bevy's centred, y-up world once per frame.
use bevy::prelude::*;

use crate::stages::WorldSet;

pub struct MotionPlugin;

impl Plugin for MotionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                (integrate, apply_drag, push_boxes, clamp_to_world)
                    .chain()
                    .in_set(WorldSet::Physics),
                sync_transforms.in_set(WorldSet::Sync),
            ),
        );
    }
}

pub const GAME_WIDTH: f32 = 640.0;
pub const GAME_HEIGHT: f32 = 360.0;

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position(pub Vec2);

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

/// Axis-aligned collision box centred on the position.
#[derive(Component, Debug, Clone, Copy)]
pub struct Body {
    pub size: Vec2,
}

impl Body {
    pub fn rect(&self, at: Vec2) -> Rect {
        Rect::from_center_size(at, self.size)
    }
}

/// Hidden and skipped by movement until woken.
#[derive(Component, Debug, Default)]
pub struct Dormant;

#[derive(Component, Debug, Default)]
pub struct BoundToWorld;

/// Can be shoved by a `Pusher`. Slows by `drag` px/s², keeps `bounce` of its
/// speed when it hits the edge of the world.
#[derive(Component, Debug, Clone, Copy)]
pub struct Pushable {
    pub drag: f32,
    pub bounce: f32,
}

#[derive(Component, Debug, Default)]
pub struct Pusher;

/// Trigger area centred on the entity's position.
#[derive(Component, Debug, Clone, Copy)]
pub struct Zone {
    pub size: Vec2,
    pub enabled: bool,
}

impl Zone {
    pub fn new(size: Vec2) -> Self {
        Self {
            size,
            enabled: true,
        }
    }

    pub fn contains(&self, at: Vec2, point: Vec2) -> bool {
        self.enabled && Rect::from_center_size(at, self.size).contains(point)
    }

    pub fn overlaps(&self, at: Vec2, other: Rect) -> bool {
        self.enabled && overlaps(Rect::from_center_size(at, self.size), other)
    }
}

pub fn overlaps(a: Rect, b: Rect) -> bool {
    !a.intersect(b).is_empty()
}

pub fn integrate(
    time: Res<Time>,
    mut movers: Query<(&mut Position, &Velocity), Without<Dormant>>,
) {
    let dt = time.delta_secs();
    for (mut position, velocity) in &mut movers {
        position.0 += velocity.0 * dt;
    }
}

pub fn apply_drag(time: Res<Time>, mut boxes: Query<(&mut Velocity, &Pushable)>) {
    let dt = time.delta_secs();
    for (mut velocity, pushable) in &mut boxes {
        let slow = |v: f32| v.signum() * (v.abs() - pushable.drag * dt).max(0.0);
        velocity.0 = Vec2::new(slow(velocity.0.x), slow(velocity.0.y));
    }
}

/// Separates boxes from pushers along the axis of least overlap and hands
/// them the pusher's speed on that axis.
pub fn push_boxes(
    pushers: Query<(&Position, &Velocity, &Body), (With<Pusher>, Without<Pushable>)>,
    mut boxes: Query<(&mut Position, &mut Velocity, &Body), With<Pushable>>,
) {
    for (pusher_pos, pusher_vel, pusher_body) in &pushers {
        let pusher_rect = pusher_body.rect(pusher_pos.0);
        for (mut box_pos, mut box_vel, box_body) in &mut boxes {
            let overlap = pusher_rect.intersect(box_body.rect(box_pos.0));
            if overlap.is_empty() {
                continue;
            }
            let away = box_pos.0 - pusher_pos.0;
            if overlap.width() < overlap.height() {
                box_pos.0.x += overlap.width() * away.x.signum();
                box_vel.0.x = pusher_vel.0.x;
            } else {
                box_pos.0.y += overlap.height() * away.y.signum();
                box_vel.0.y = pusher_vel.0.y;
            }
        }
    }
}

pub fn clamp_to_world(
    mut bodies: Query<
        (&mut Position, &mut Velocity, &Body, Option<&Pushable>),
        With<BoundToWorld>,
    >,
) {
    for (mut position, mut velocity, body, pushable) in &mut bodies {
        let half = body.size / 2.0;
        let bounce = pushable.map_or(0.0, |p| p.bounce);
        let clamped = position
            .0
            .clamp(half, Vec2::new(GAME_WIDTH, GAME_HEIGHT) - half);
        if clamped.x != position.0.x {
            velocity.0.x *= -bounce;
        }
        if clamped.y != position.0.y {
            velocity.0.y *= -bounce;
        }
        position.0 = clamped;
    }
}

pub fn to_world(stage: Vec2) -> Vec2 {
    Vec2::new(stage.x - GAME_WIDTH / 2.0, GAME_HEIGHT / 2.0 - stage.y)
}

pub fn to_stage(world: Vec2) -> Vec2 {
    Vec2::new(world.x + GAME_WIDTH / 2.0, GAME_HEIGHT / 2.0 - world.y)
}

pub fn sync_transforms(mut placed: Query<(&Position, &mut Transform), Changed<Position>>) {
    for (position, mut transform) in &mut placed {
        let world = to_world(position.0);
        transform.translation.x = world.x;
        transform.translation.y = world.y;
    }
}
