// Moving in: push the boxes into the hallway together.
use bevy::prelude::*;

use super::{DEFAULT_DELAY, EnterSet, Stage, StageState, WorldSet, hex_color, hex_color_alpha};
use crate::content::StoryText;
use crate::events::{UiDialogue, UiMessage};
use crate::flags::Flags;
use crate::motion::{Body, BoundToWorld, Position, Pushable, Velocity, Zone};
use crate::player::{ControlsEnabled, Party};
use crate::preload::{Backdrop, GameAssets, Texture};
use crate::script::{CueFired, StageCue, Tween, TweenFinish};

pub struct MoveInPlugin;

impl Plugin for MoveInPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(Stage::MoveIn), setup_move_in.in_set(EnterSet::Script))
            .add_systems(
                Update,
                (
                    boxes_in_place.in_set(WorldSet::Script),
                    move_in_cues.in_set(WorldSet::Cues),
                )
                    .run_if(in_state(Stage::MoveIn)),
            );
    }
}

const CLEAR_COLOR: u32 = 0x242a36;
const JON_AT: Vec2 = Vec2::new(120.0, 180.0);
const BIANCA_AT: Vec2 = Vec2::new(90.0, 190.0);

const BOXES: [Vec2; 3] = [
    Vec2::new(360.0, 255.0),
    Vec2::new(380.0, 258.0),
    Vec2::new(395.0, 265.0),
];
const BOX_SIZE: f32 = 16.0;
const BOX_DRAG: f32 = 500.0;
const BOX_BOUNCE: f32 = 0.1;

/// Hallway the boxes go into, as a top-left corner and size.
const HALLWAY_CORNER: Vec2 = Vec2::new(35.0, 45.0);
const HALLWAY_SIZE: Vec2 = Vec2::new(213.0, 60.0);
const HALLWAY_COLOR: u32 = 0x6fb1a3;

const HEART_COLOR: u32 = 0xf5b5c8;
const HEART_LIFT: f32 = 28.0;

#[derive(Component)]
struct MovingBox;

#[derive(Component)]
struct Hallway;

fn setup_move_in(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut controls: ResMut<ControlsEnabled>,
    mut positions: Query<&mut Position>,
    mut dialogue: MessageWriter<UiDialogue>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::MoveIn, Backdrop::MovingIn);
    for (entity, at) in [(party.jon, JON_AT), (party.bianca, BIANCA_AT)] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }

    controls.0 = false;
    let heart_at = (JON_AT + BIANCA_AT) / 2.0 - Vec2::new(0.0, HEART_LIFT);
    let heart = super::spawn_label(
        &mut commands,
        Stage::MoveIn,
        "<3",
        heart_at,
        20.0,
        hex_color(HEART_COLOR),
    );
    Tween::new(heart, 1200)
        .move_to(heart_at - Vec2::new(0.0, 10.0))
        .fade_to(0.0)
        .then(TweenFinish::Despawn)
        .spawn(&mut commands, Stage::MoveIn);

    dialogue.write(UiDialogue {
        lines: story.move_in_together.clone(),
        on_complete: Some(StageCue::MoveInReady),
    });

    for at in BOXES {
        commands.spawn((
            MovingBox,
            Sprite {
                image: assets.texture(Texture::Box),
                custom_size: Some(Vec2::splat(BOX_SIZE)),
                ..default()
            },
            Transform::from_xyz(0.0, 0.0, 5.0),
            Position(at),
            Velocity::default(),
            Body {
                size: Vec2::splat(BOX_SIZE),
            },
            Pushable {
                drag: BOX_DRAG,
                bounce: BOX_BOUNCE,
            },
            BoundToWorld,
            DespawnOnExit(Stage::MoveIn),
        ));
    }

    let centre = HALLWAY_CORNER + HALLWAY_SIZE / 2.0;
    super::spawn_frame(
        &mut commands,
        Stage::MoveIn,
        centre,
        HALLWAY_SIZE,
        hex_color_alpha(HALLWAY_COLOR, 0.8),
        hex_color_alpha(HALLWAY_COLOR, 0.1),
    );
    let zone = super::spawn_zone(&mut commands, Stage::MoveIn, centre, HALLWAY_SIZE);
    commands.entity(zone).insert(Hallway);
}

fn boxes_in_place(
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    boxes: Query<&Position, With<MovingBox>>,
    hallway: Query<(&Position, &Zone), With<Hallway>>,
) {
    if state.is_completed() || boxes.is_empty() {
        return;
    }
    let Ok((at, zone)) = hallway.single() else {
        return;
    };
    if boxes.iter().all(|b| zone.contains(at.0, b.0)) {
        flags.set("moved_in");
        state.transition_to_next(DEFAULT_DELAY);
    }
}

fn move_in_cues(
    mut cues: MessageReader<CueFired>,
    story: Res<StoryText>,
    mut controls: ResMut<ControlsEnabled>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        if cue == StageCue::MoveInReady {
            controls.0 = true;
            messages.write(UiMessage::new(story.move_in_hint.clone()));
        }
    }
}
