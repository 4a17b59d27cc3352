// Prologue: Bianca walks up the boardwalk to meet Jon.
use bevy::prelude::*;

use super::{DEFAULT_DELAY, EnterSet, Stage, StageState, WorldSet};
use crate::content::StoryText;
use crate::events::{UiDialogue, UiMessage};
use crate::flags::Flags;
use crate::follow::Follow;
use crate::motion::{Body, Position, Zone};
use crate::player::{ControlTarget, Party};
use crate::preload::{Backdrop, GameAssets};
use crate::script::{CueFired, StageCue, after};

pub struct ProloguePlugin;

impl Plugin for ProloguePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::Prologue),
            setup_prologue.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                meet_jon.in_set(WorldSet::Script),
                prologue_cues.in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::Prologue)),
        );
    }
}

const CLEAR_COLOR: u32 = 0x2b2430;
const JON_AT: Vec2 = Vec2::new(221.0, 210.0);
const BIANCA_AT: Vec2 = Vec2::new(398.0, 217.0);
const MEETING_SIZE: f32 = 48.0;

const FRIENDSHIP_UNLOCKED: &str = "FRIENDSHIP UNLOCKED";

#[derive(Component)]
struct MeetingSpot;

fn setup_prologue(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut control: ResMut<ControlTarget>,
    mut positions: Query<&mut Position>,
    mut follows: Query<&mut Follow>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::Prologue, Backdrop::Coronado);

    for (entity, at) in [(party.jon, JON_AT), (party.bianca, BIANCA_AT)] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }
    if let Ok(mut follow) = follows.get_mut(party.bianca) {
        follow.enabled = false;
    }
    control.0 = party.bianca;

    messages.write(UiMessage::new(story.prologue_instruction.clone()));

    let spot = super::spawn_zone(
        &mut commands,
        Stage::Prologue,
        JON_AT,
        Vec2::splat(MEETING_SIZE),
    );
    commands.entity(spot).insert(MeetingSpot);
}

fn meet_jon(
    party: Res<Party>,
    story: Res<StoryText>,
    mut state: ResMut<StageState>,
    bodies: Query<(&Position, &Body)>,
    spot: Query<(&Position, &Zone), With<MeetingSpot>>,
    mut dialogue: MessageWriter<UiDialogue>,
) {
    if state.triggered {
        return;
    }
    let Ok((bianca, body)) = bodies.get(party.bianca) else {
        return;
    };
    let Ok((at, zone)) = spot.single() else {
        return;
    };
    if !zone.overlaps(at.0, body.rect(bianca.0)) {
        return;
    }

    state.triggered = true;
    dialogue.write(UiDialogue {
        lines: story.prologue.clone(),
        on_complete: Some(StageCue::PrologueMet),
    });
}

#[allow(clippy::too_many_arguments)]
fn prologue_cues(
    mut commands: Commands,
    mut cues: MessageReader<CueFired>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut flags: ResMut<Flags>,
    mut state: ResMut<StageState>,
    mut follows: Query<&mut Follow>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        match cue {
            StageCue::PrologueMet => {
                flags.set("met_bianca");
                flags.set("friendship_unlocked");
                if let Ok(mut follow) = follows.get_mut(party.bianca) {
                    follow.enabled = true;
                }
                messages.write(UiMessage::lasting(FRIENDSHIP_UNLOCKED, 2400));
                after(&mut commands, Stage::Prologue, 3000, StageCue::PrologueHint);
            }
            StageCue::PrologueHint => {
                messages.write(UiMessage::lasting(story.prologue_hint.clone(), 3600));
                after(&mut commands, Stage::Prologue, 4200, StageCue::PrologueDone);
            }
            StageCue::PrologueDone => {
                state.transition_to_next(DEFAULT_DELAY);
            }
            _ => {}
        }
    }
}
