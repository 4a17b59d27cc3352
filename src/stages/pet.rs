// Telling Megabyte to sit or stand, in the stages that ask for it.
use bevy::prelude::*;

use super::{Stage, WorldSet};
use crate::events::{MobileActionPressed, UiMessage};
use crate::follow::Follow;
use crate::motion::{Position, Velocity};
use crate::player::{Party, Pet, set_sitting};
use crate::preload::GameAssets;
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct PetCommandPlugin;

impl Plugin for PetCommandPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            toggle_sit
                .in_set(WorldSet::Cues)
                .run_if(in_state(Stage::Health).or(in_state(Stage::Crossroad))),
        );
    }
}

/// How close Jon has to be for Megabyte to hear him.
pub const COMMAND_RANGE: f32 = 60.0;

const SIT_MESSAGE: &str = "Megabyte sits and waits.";
const STAND_MESSAGE: &str = "Megabyte is ready to move.";
const TOO_FAR_MESSAGE: &str = "Too far from Megabyte. Get closer and press E.";

#[allow(clippy::too_many_arguments)]
fn toggle_sit(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut mobile: MessageReader<MobileActionPressed>,
    party: Res<Party>,
    assets: Res<GameAssets>,
    mut sounds: ResMut<SoundSystem>,
    positions: Query<&Position>,
    mut pet: Query<(&mut Pet, &mut Sprite, &mut Follow, &mut Velocity)>,
    mut messages: MessageWriter<UiMessage>,
) {
    let tapped = mobile.read().count() > 0;
    if !tapped && !keyboard.just_pressed(KeyCode::KeyE) {
        return;
    }
    let (Ok(jon), Ok(megabyte)) = (positions.get(party.jon), positions.get(party.megabyte)) else {
        return;
    };
    if jon.0.distance(megabyte.0) >= COMMAND_RANGE {
        messages.write(UiMessage::lasting(TOO_FAR_MESSAGE, 3000));
        return;
    }
    let Ok((mut pet, mut sprite, mut follow, mut velocity)) = pet.get_mut(party.megabyte) else {
        return;
    };

    let sitting = !pet.sitting;
    set_sitting(&assets, &mut pet, &mut sprite, sitting);
    follow.enabled = !sitting;
    if sitting {
        velocity.0 = Vec2::ZERO;
        messages.write(UiMessage::lasting(SIT_MESSAGE, 4500));
    } else {
        sounds.play(SoundKey::MegabyteBark, CueOptions::default());
        messages.write(UiMessage::lasting(STAND_MESSAGE, 4500));
    }
    debug!("megabyte sitting: {sitting}");
}
