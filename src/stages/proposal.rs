// The proposal: Jon walks to the picnic blanket and goes down on one knee.
use bevy::prelude::*;

use super::{DEFAULT_DELAY, EnterSet, Stage, StageState, WorldSet, hex_color_alpha};
use crate::content::StoryText;
use crate::events::{UiDialogue, UiMessage};
use crate::flags::Flags;
use crate::follow::Follow;
use crate::motion::{Body, Position, Velocity, Zone};
use crate::player::{Party, dress, put_to_sleep};
use crate::preload::{Backdrop, GameAssets, Texture};
use crate::script::{CueFired, StageCue, after};

pub struct ProposalPlugin;

impl Plugin for ProposalPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::Proposal),
            setup_proposal.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                kneel.in_set(WorldSet::Script),
                proposal_cues.in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::Proposal)),
        );
    }
}

const CLEAR_COLOR: u32 = 0x2f3a2f;
const JON_AT: Vec2 = Vec2::new(180.0, 280.0);
const BIANCA_AT: Vec2 = Vec2::new(320.0, 180.0);
const JON_STANDING: Vec2 = Vec2::new(34.0, 66.0);
const JON_KNEELING: Vec2 = Vec2::new(40.0, 58.0);
const BIANCA_SIZE: Vec2 = Vec2::new(29.0, 60.0);

const BLANKET_AT: Vec2 = Vec2::new(320.0, 220.0);
const BLANKET_SIZE: Vec2 = Vec2::new(120.0, 80.0);
const BLANKET_STROKE: u32 = 0xf4e3b5;
const BLANKET_FILL: u32 = 0xd9b46b;
const KNEEL_AT: Vec2 = Vec2::new(320.0, 180.0);
const KNEEL_SIZE: Vec2 = Vec2::new(50.0, 80.0);

const PICNIC: &str = "A quiet picnic before forever.";
const SHE_SAID_YES: &str = "She said YES! <3";

#[derive(Component)]
struct KneelSpot;

fn setup_proposal(
    mut commands: Commands,
    assets: Res<GameAssets>,
    party: Res<Party>,
    mut cast: Query<(&mut Position, &mut Sprite, &mut Body)>,
    mut follows: Query<&mut Follow>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::Proposal, Backdrop::Proposal);

    for (entity, at, texture, size) in [
        (party.jon, JON_AT, Texture::JonProposalStanding, JON_STANDING),
        (party.bianca, BIANCA_AT, Texture::Bianca, BIANCA_SIZE),
    ] {
        if let Ok((mut position, mut sprite, mut body)) = cast.get_mut(entity) {
            position.0 = at;
            dress(&assets, texture, size, &mut sprite, &mut body);
        }
    }
    put_to_sleep(&mut commands, party.megabyte);
    if let Ok(mut follow) = follows.get_mut(party.bianca) {
        follow.enabled = false;
    }
    messages.write(UiMessage::lasting(PICNIC, 4800));

    super::spawn_frame(
        &mut commands,
        Stage::Proposal,
        BLANKET_AT,
        BLANKET_SIZE,
        hex_color_alpha(BLANKET_STROKE, 0.4),
        hex_color_alpha(BLANKET_FILL, 0.12),
    );
    let spot = super::spawn_zone(&mut commands, Stage::Proposal, KNEEL_AT, KNEEL_SIZE);
    commands.entity(spot).insert(KneelSpot);
}

fn kneel(
    party: Res<Party>,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    mut state: ResMut<StageState>,
    mut cast: Query<(&Position, &mut Velocity, &mut Sprite, &mut Body)>,
    spot: Query<(&Position, &Zone), With<KneelSpot>>,
    mut dialogue: MessageWriter<UiDialogue>,
) {
    if state.triggered {
        return;
    }
    let Ok((at, zone)) = spot.single() else {
        return;
    };
    let Ok([jon, bianca]) = cast.get_many_mut([party.jon, party.bianca]) else {
        return;
    };
    let (jon_at, mut velocity, mut sprite, mut body) = jon;
    let (bianca_at, ..) = bianca;
    if !zone.overlaps(at.0, body.rect(jon_at.0)) {
        return;
    }

    state.triggered = true;
    velocity.0 = Vec2::ZERO;
    dress(
        &assets,
        Texture::JonProposalKnee,
        JON_KNEELING,
        &mut sprite,
        &mut body,
    );
    sprite.flip_x = jon_at.0.x < bianca_at.0.x;
    dialogue.write(UiDialogue {
        lines: story.proposal.clone(),
        on_complete: Some(StageCue::ProposalAccepted),
    });
}

fn proposal_cues(
    mut commands: Commands,
    mut cues: MessageReader<CueFired>,
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        match cue {
            StageCue::ProposalAccepted => {
                flags.set("engaged");
                messages.write(UiMessage::lasting(SHE_SAID_YES, 4000));
                after(&mut commands, Stage::Proposal, 4500, StageCue::ProposalDone);
            }
            StageCue::ProposalDone => {
                state.transition_to_next(DEFAULT_DELAY);
            }
            _ => {}
        }
    }
}
