// The cast: who the player drives, how they walk and which way they face.
use std::time::Duration;

use bevy::prelude::*;
use strum::IntoStaticStr;

use crate::follow::{Follow, party_follow};
use crate::motion::{BoundToWorld, Body, Dormant, Position, Pusher, Velocity};
use crate::preload::{GameAssets, Texture};
use crate::sound::{CueOptions, SoundKey, SoundSystem};
use crate::stages::{Stage, WorldSet};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlsEnabled>()
            .init_resource::<TouchInput>()
            .init_resource::<FootstepClock>()
            .init_resource::<MovementLog>()
            .add_systems(Startup, spawn_cast)
            .add_systems(
                Update,
                (
                    (steer_controlled, party_follow)
                        .chain()
                        .in_set(WorldSet::Steer),
                    halt_party
                        .run_if(controls_disabled)
                        .before(WorldSet::Physics)
                        .after(WorldSet::Steer),
                    face_each_other.in_set(WorldSet::Face),
                ),
            );
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Cast {
    Jon,
    Bianca,
    Megabyte,
    Kira,
}

/// Every cast entity. They are spawned once and live for the whole session.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Party {
    pub jon: Entity,
    pub bianca: Entity,
    pub megabyte: Entity,
    pub kira: Entity,
}

/// The character keyboard and touch input drive.
#[derive(Resource, Debug, Clone, Copy)]
pub struct ControlTarget(pub Entity);

#[derive(Resource, Debug, Clone, Copy)]
pub struct ControlsEnabled(pub bool);

impl Default for ControlsEnabled {
    fn default() -> Self {
        Self(true)
    }
}

pub fn controls_enabled(controls: Res<ControlsEnabled>) -> bool {
    controls.0
}

fn controls_disabled(controls: Res<ControlsEnabled>) -> bool {
    !controls.0
}

#[derive(Component, Debug, Default)]
pub struct Pet {
    pub sitting: bool,
}

/// Direction held on the touch d-pad.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct TouchInput {
    pub x: f32,
    pub y: f32,
}

const FOOTSTEP_INTERVAL: Duration = Duration::from_millis(280);
const FOOTSTEP_VOLUME: f32 = 0.3;

#[derive(Resource, Debug, Default)]
pub struct FootstepClock {
    last: Option<Duration>,
}

impl FootstepClock {
    /// True at most once per interval.
    pub fn ready(&mut self, now: Duration) -> bool {
        if self
            .last
            .is_some_and(|last| now.saturating_sub(last) <= FOOTSTEP_INTERVAL)
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}

#[derive(Resource, Debug, Default)]
struct MovementLog(Option<(Entity, IVec2)>);

const JON_SIZE: Vec2 = Vec2::new(34.0, 66.0);
const BIANCA_SIZE: Vec2 = Vec2::new(29.0, 60.0);
const MEGABYTE_SIZE: Vec2 = Vec2::new(45.0, 36.0);
const KIRA_SIZE: Vec2 = Vec2::new(40.0, 40.0);
const CAST_DEPTH: f32 = 10.0;

const BASE_SPEED: f32 = 130.0;
const HEALTH_SPEED: f32 = 80.0;
const MOVE_IN_SPEED: f32 = 110.0;
const MOVE_IN_TOGETHER_SPEED: f32 = 160.0;
const TOGETHER_DISTANCE: f32 = 52.0;

const FACING_THRESHOLD: f32 = 0.5;

fn spawn_cast(mut commands: Commands, assets: Res<GameAssets>) {
    let mut spawn = |cast: Cast, texture: Texture, at: Vec2, size: Vec2| {
        commands
            .spawn((
                cast,
                Sprite {
                    image: assets.texture(texture),
                    custom_size: Some(size),
                    ..default()
                },
                Transform::from_xyz(0.0, 0.0, CAST_DEPTH),
                Position(at),
                Velocity::default(),
                Body { size },
                BoundToWorld,
            ))
            .id()
    };
    let jon = spawn(Cast::Jon, Texture::Jon, Vec2::new(140.0, 180.0), JON_SIZE);
    let bianca = spawn(Cast::Bianca, Texture::Bianca, Vec2::new(110.0, 180.0), BIANCA_SIZE);
    let megabyte = spawn(
        Cast::Megabyte,
        Texture::Megabyte,
        Vec2::new(90.0, 180.0),
        MEGABYTE_SIZE,
    );
    let kira = spawn(Cast::Kira, Texture::Kira, Vec2::new(100.0, 180.0), KIRA_SIZE);

    commands.entity(jon).insert(Pusher);
    commands
        .entity(bianca)
        .insert((Pusher, Follow::new(jon, 120.0, 26.0)));
    commands.entity(megabyte).insert((
        Pet::default(),
        Follow::new(jon, 100.0, 30.0),
        Dormant,
        Visibility::Hidden,
    ));
    commands.entity(kira).insert((Dormant, Visibility::Hidden));

    commands.insert_resource(Party {
        jon,
        bianca,
        megabyte,
        kira,
    });
    commands.insert_resource(ControlTarget(jon));
}

pub fn wake(commands: &mut Commands, entity: Entity) {
    commands
        .entity(entity)
        .remove::<Dormant>()
        .insert(Visibility::Inherited);
}

pub fn put_to_sleep(commands: &mut Commands, entity: Entity) {
    commands.entity(entity).insert((Dormant, Visibility::Hidden));
}

/// Swaps a character's texture and resizes both sprite and body to match.
pub fn dress(
    assets: &GameAssets,
    texture: Texture,
    size: Vec2,
    sprite: &mut Sprite,
    body: &mut Body,
) {
    sprite.image = assets.texture(texture);
    sprite.custom_size = Some(size);
    body.size = size;
}

pub fn set_sitting(assets: &GameAssets, pet: &mut Pet, sprite: &mut Sprite, sitting: bool) {
    pet.sitting = sitting;
    sprite.image = assets.texture(if sitting {
        Texture::MegabyteSitting
    } else {
        Texture::Megabyte
    });
}

/// Normalised input scaled to `speed`. No input gives exactly zero.
pub fn steer(raw: Vec2, speed: f32) -> Vec2 {
    raw.normalize_or_zero() * speed
}

pub fn stage_speed(stage: Stage, jon: Vec2, bianca: Vec2) -> f32 {
    match stage {
        Stage::Health => HEALTH_SPEED,
        Stage::MoveIn if jon.distance(bianca) < TOGETHER_DISTANCE => MOVE_IN_TOGETHER_SPEED,
        Stage::MoveIn => MOVE_IN_SPEED,
        _ => BASE_SPEED,
    }
}

fn read_input(keyboard: &ButtonInput<KeyCode>, touch: &TouchInput) -> Vec2 {
    let mut raw = Vec2::new(touch.x, touch.y);
    if keyboard.any_pressed([KeyCode::ArrowLeft, KeyCode::KeyA]) {
        raw.x -= 1.0;
    }
    if keyboard.any_pressed([KeyCode::ArrowRight, KeyCode::KeyD]) {
        raw.x += 1.0;
    }
    // Stage space points down.
    if keyboard.any_pressed([KeyCode::ArrowUp, KeyCode::KeyW]) {
        raw.y -= 1.0;
    }
    if keyboard.any_pressed([KeyCode::ArrowDown, KeyCode::KeyS]) {
        raw.y += 1.0;
    }
    raw
}

#[allow(clippy::too_many_arguments)]
fn steer_controlled(
    keyboard: Res<ButtonInput<KeyCode>>,
    touch: Res<TouchInput>,
    control: Res<ControlTarget>,
    party: Res<Party>,
    stage: Res<State<Stage>>,
    time: Res<Time>,
    mut footsteps: ResMut<FootstepClock>,
    mut log: ResMut<MovementLog>,
    mut sounds: ResMut<SoundSystem>,
    mut movers: Query<(&Position, &mut Velocity)>,
) {
    let positions = [party.jon, party.bianca].map(|e| movers.get(e).map(|(p, _)| p.0));
    let (Ok(jon), Ok(bianca)) = (positions[0], positions[1]) else {
        return;
    };
    let speed = stage_speed(*stage.get(), jon, bianca);
    let velocity = steer(read_input(&keyboard, &touch), speed);

    let Ok((position, mut current)) = movers.get_mut(control.0) else {
        return;
    };
    current.0 = velocity;
    if velocity == Vec2::ZERO {
        return;
    }

    let rounded = position.0.round().as_ivec2();
    if log.0 != Some((control.0, rounded)) {
        log.0 = Some((control.0, rounded));
        debug!("move {:?} to {rounded}", control.0);
    }
    if footsteps.ready(time.elapsed()) {
        sounds.play(SoundKey::Footstep, CueOptions::at_volume(FOOTSTEP_VOLUME));
    }
}

fn halt_party(party: Res<Party>, mut velocities: Query<&mut Velocity>) {
    for entity in [party.jon, party.bianca, party.megabyte, party.kira] {
        if let Ok(mut velocity) = velocities.get_mut(entity) {
            velocity.0 = Vec2::ZERO;
        }
    }
}

/// Facing for a horizontal velocity, or `None` while standing still.
fn facing(vx: f32) -> Option<bool> {
    (vx.abs() > FACING_THRESHOLD).then_some(vx > 0.0)
}

/// Moving characters face where they go. When Jon and Bianca both stand
/// still they turn towards each other.
fn face_each_other(party: Res<Party>, mut cast: Query<(&Position, &Velocity, &mut Sprite)>) {
    let Ok([(jon_pos, jon_vel, mut jon), (bianca_pos, bianca_vel, mut bianca)]) =
        cast.get_many_mut([party.jon, party.bianca])
    else {
        return;
    };

    let jon_facing = facing(jon_vel.0.x);
    let bianca_facing = facing(bianca_vel.0.x);
    if let Some(right) = jon_facing {
        jon.flip_x = right;
    }
    if let Some(right) = bianca_facing {
        bianca.flip_x = right;
    }
    if jon_facing.is_none() && bianca_facing.is_none() {
        let jon_on_left = jon_pos.0.x < bianca_pos.0.x;
        jon.flip_x = jon_on_left;
        bianca.flip_x = !jon_on_left;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_input_gives_zero_velocity() {
        let v = steer(Vec2::ZERO, BASE_SPEED);
        assert_eq!(v, Vec2::ZERO);
        assert!(!v.x.is_nan() && !v.y.is_nan());
    }

    #[test]
    fn diagonal_input_is_normalised() {
        let v = steer(Vec2::new(1.0, -1.0), BASE_SPEED);
        assert!((v.length() - BASE_SPEED).abs() < 1e-3);
        assert!(v.x > 0.0 && v.y < 0.0);

        // Keyboard plus d-pad on the same axis still moves at stage speed.
        let v = steer(Vec2::new(2.0, 0.0), BASE_SPEED);
        assert_eq!(v, Vec2::new(BASE_SPEED, 0.0));
    }

    #[test]
    fn speed_depends_on_stage() {
        let near = (Vec2::ZERO, Vec2::new(30.0, 0.0));
        let far = (Vec2::ZERO, Vec2::new(80.0, 0.0));
        assert_eq!(stage_speed(Stage::Health, near.0, near.1), 80.0);
        assert_eq!(stage_speed(Stage::MoveIn, near.0, near.1), 160.0);
        assert_eq!(stage_speed(Stage::MoveIn, far.0, far.1), 110.0);
        assert_eq!(stage_speed(Stage::Crossroad, far.0, far.1), 130.0);
    }

    #[test]
    fn footsteps_are_throttled() {
        let mut clock = FootstepClock::default();
        assert!(clock.ready(Duration::from_millis(1000)));
        assert!(!clock.ready(Duration::from_millis(1100)));
        assert!(!clock.ready(Duration::from_millis(1280)));
        assert!(clock.ready(Duration::from_millis(1281)));
    }

    #[test]
    fn facing_ignores_drift() {
        assert_eq!(facing(0.3), None);
        assert_eq!(facing(-40.0), Some(false));
        assert_eq!(facing(40.0), Some(true));
    }

    #[test]
    fn input_combines_keyboard_and_touch() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyW);
        let touch = TouchInput {
            x: 1.0,
            ..default()
        };
        assert_eq!(read_input(&keyboard, &touch), Vec2::new(1.0, -1.0));
    }
}
