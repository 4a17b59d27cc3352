// Megabyte joins the family: he trots in, comes over and waits for a pat.
use bevy::prelude::*;

use super::{EnterSet, Stage, StageState, WorldSet, hex_color};
use crate::content::StoryText;
use crate::events::{PointerTap, UiMessage};
use crate::flags::Flags;
use crate::follow::Follow;
use crate::motion::{Position, Velocity};
use crate::player::{Party, Pet, set_sitting, wake};
use crate::preload::{Backdrop, GameAssets};
use crate::script::{CueFired, Pulse, StageCue, Tween, TweenFinish};
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct MegabytePlugin;

impl Plugin for MegabytePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::MegabyteJoins),
            setup_megabyte_joins.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                greet_jon.in_set(WorldSet::Script),
                (megabyte_cues, pat_heart).in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::MegabyteJoins)),
        );
    }
}

const CLEAR_COLOR: u32 = 0x2b2a2f;
const JON_AT: Vec2 = Vec2::new(160.0, 180.0);
const BIANCA_AT: Vec2 = Vec2::new(130.0, 194.0);
const MEGABYTE_FROM: Vec2 = Vec2::new(486.0, 93.0);
const MEGABYTE_TO: Vec2 = Vec2::new(508.0, 265.0);
const ENTRANCE_MS: u64 = 3000;

const GREET_DISTANCE: f32 = 50.0;
const HEART_LIFT: f32 = 30.0;
const HEART_HIT: Vec2 = Vec2::splat(32.0);
const HEART_COLOR: u32 = 0xe25a6e;
const LEAVE_DELAY: u64 = 800;

#[derive(Component)]
struct PetHeart;

#[allow(clippy::too_many_arguments)]
fn setup_megabyte_joins(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut sounds: ResMut<SoundSystem>,
    mut positions: Query<&mut Position>,
    mut follows: Query<&mut Follow>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(
        &mut commands,
        &assets,
        Stage::MegabyteJoins,
        Backdrop::MegabyteJoins,
    );
    for (entity, at) in [
        (party.jon, JON_AT),
        (party.bianca, BIANCA_AT),
        (party.megabyte, MEGABYTE_FROM),
    ] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }

    messages.write(UiMessage::lasting(story.megabyte_join_hint.clone(), 5000));

    wake(&mut commands, party.megabyte);
    if let Ok(mut follow) = follows.get_mut(party.megabyte) {
        follow.enabled = false;
    }
    sounds.play(SoundKey::MegabyteJoin, CueOptions::default());

    Tween::new(party.megabyte, ENTRANCE_MS)
        .move_to(MEGABYTE_TO)
        .then(TweenFinish::Cue(StageCue::MegabyteArrived))
        .spawn(&mut commands, Stage::MegabyteJoins);
}

#[allow(clippy::too_many_arguments)]
fn megabyte_cues(
    mut cues: MessageReader<CueFired>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut flags: ResMut<Flags>,
    mut state: ResMut<StageState>,
    mut sounds: ResMut<SoundSystem>,
    mut follows: Query<&mut Follow>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        if cue != StageCue::MegabyteArrived {
            continue;
        }
        if let Ok(mut follow) = follows.get_mut(party.megabyte) {
            follow.enabled = true;
        }
        flags.set("megabyte_joined");
        sounds.play(SoundKey::MegabyteBark, CueOptions::default());
        messages.write(UiMessage::lasting(story.megabyte_welcome.clone(), 3500));
        state.triggered = true;
    }
}

/// Once he reaches Jon he sits, and a heart appears to be tapped.
fn greet_jon(
    mut commands: Commands,
    party: Res<Party>,
    assets: Res<GameAssets>,
    state: Res<StageState>,
    positions: Query<&Position>,
    mut pet: Query<(&mut Pet, &mut Sprite, &mut Follow, &mut Velocity)>,
) {
    if !state.triggered || state.is_completed() {
        return;
    }
    let (Ok(jon), Ok(megabyte)) = (positions.get(party.jon), positions.get(party.megabyte)) else {
        return;
    };
    let Ok((mut pet, mut sprite, mut follow, mut velocity)) = pet.get_mut(party.megabyte) else {
        return;
    };
    if pet.sitting || jon.0.distance(megabyte.0) >= GREET_DISTANCE {
        return;
    }

    follow.enabled = false;
    velocity.0 = Vec2::ZERO;
    set_sitting(&assets, &mut pet, &mut sprite, true);

    let heart = super::spawn_label(
        &mut commands,
        Stage::MegabyteJoins,
        "<3",
        megabyte.0 - Vec2::new(0.0, HEART_LIFT),
        24.0,
        hex_color(HEART_COLOR),
    );
    commands.entity(heart).insert((PetHeart, Pulse::new(1.2, 600)));
}

fn pat_heart(
    mut commands: Commands,
    mut taps: MessageReader<PointerTap>,
    mut state: ResMut<StageState>,
    mut sounds: ResMut<SoundSystem>,
    hearts: Query<(Entity, &Position), With<PetHeart>>,
) {
    for &PointerTap(at) in taps.read() {
        if state.is_completed() {
            return;
        }
        for (heart, position) in &hearts {
            if !Rect::from_center_size(position.0, HEART_HIT).contains(at) {
                continue;
            }
            sounds.play(SoundKey::MegabyteBark, CueOptions::default());
            commands.entity(heart).despawn();
            state.transition_to_next(LEAVE_DELAY);
            return;
        }
    }
}
