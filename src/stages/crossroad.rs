// The crossroad: Kira turns up, Megabyte gets nervous, and Kira goes her own way.
use bevy::prelude::*;

use super::{EnterSet, Nudge, Stage, StageState, WorldSet, hex_color_alpha};
use crate::content::StoryText;
use crate::events::UiMessage;
use crate::flags::Flags;
use crate::follow::Follow;
use crate::motion::{Body, Dormant, Position, Zone};
use crate::player::{Party, Pet, put_to_sleep, set_sitting, wake};
use crate::preload::{Backdrop, GameAssets};
use crate::script::{CueFired, StageCue, Tween, TweenFinish, after};
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct CrossroadPlugin;

impl Plugin for CrossroadPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::Crossroad),
            setup_crossroad.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                (comfort_megabyte, take_exit).in_set(WorldSet::Script),
                crossroad_cues.in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::Crossroad)),
        );
    }
}

const CLEAR_COLOR: u32 = 0x1f2433;
const JON_AT: Vec2 = Vec2::new(120.0, 180.0);
const BIANCA_AT: Vec2 = Vec2::new(90.0, 200.0);
const MEGABYTE_AT: Vec2 = Vec2::new(80.0, 160.0);

const KIRA_FROM: Vec2 = Vec2::new(186.0, 354.0);
const KIRA_TO: Vec2 = Vec2::new(180.0, 233.0);
const KIRA_ENTRANCE_MS: u64 = 2500;
const KIRA_ENTRANCE_DELAY: u64 = 1000;
const KIRA_SETTLE_MS: u64 = 1500;
const KIRA_SPEED: f32 = 80.0;
const KIRA_FADE_MS: u64 = 600;
/// Kira's way out, walked in order before she fades.
const KIRA_PATH: [Vec2; 5] = [
    Vec2::new(175.0, 298.0),
    Vec2::new(248.0, 154.0),
    Vec2::new(206.0, 121.0),
    Vec2::new(108.0, 103.0),
    Vec2::new(180.0, 149.0),
];

const EXIT_AT: Vec2 = Vec2::new(580.0, 220.0);
const EXIT_SIZE: Vec2 = Vec2::new(60.0, 70.0);
const EXIT_COLOR: u32 = 0x6fb1a3;
const CATCH_UP_DISTANCE: f32 = 80.0;
const FAREWELL_DELAY: u64 = 5200;

const ANXIOUS_MESSAGE: &str = "Megabyte looks anxious. Press E to comfort her.";
const KIRA_LEAVES_MESSAGE: &str = "Kira found her own path. Time to move forward.";
const STILL_SITTING_MESSAGE: &str = "Megabyte needs you. Help her feel safe first.";
const CATCH_UP_MESSAGE: &str = "Wait for Megabyte to catch up.";

#[derive(Component)]
struct CrossroadExit;

#[allow(clippy::too_many_arguments)]
fn setup_crossroad(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut positions: Query<&mut Position>,
    mut pet: Query<(&mut Pet, &mut Sprite, &mut Follow)>,
    mut sprites: Query<&mut Sprite, Without<Pet>>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::Crossroad, Backdrop::Crossroad);
    for (entity, at) in [
        (party.jon, JON_AT),
        (party.bianca, BIANCA_AT),
        (party.megabyte, MEGABYTE_AT),
        (party.kira, KIRA_FROM),
    ] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }
    if let Ok((mut pet, mut sprite, mut follow)) = pet.get_mut(party.megabyte) {
        set_sitting(&assets, &mut pet, &mut sprite, true);
        follow.enabled = false;
    }
    messages.write(UiMessage::new(story.crossroad_hint.clone()));

    wake(&mut commands, party.kira);
    if let Ok(mut kira) = sprites.get_mut(party.kira) {
        kira.color.set_alpha(0.0);
    }
    Tween::new(party.kira, KIRA_ENTRANCE_MS)
        .move_to(KIRA_TO)
        .fade_to(1.0)
        .delayed(KIRA_ENTRANCE_DELAY)
        .then(TweenFinish::Cue(StageCue::KiraEntered))
        .spawn(&mut commands, Stage::Crossroad);

    super::spawn_frame(
        &mut commands,
        Stage::Crossroad,
        EXIT_AT,
        EXIT_SIZE,
        hex_color_alpha(EXIT_COLOR, 0.6),
        hex_color_alpha(EXIT_COLOR, 0.08),
    );
    let exit = super::spawn_zone(&mut commands, Stage::Crossroad, EXIT_AT, EXIT_SIZE);
    commands.entity(exit).insert(CrossroadExit);
}

/// Once Megabyte is back on her feet, Kira sets off.
fn comfort_megabyte(
    mut commands: Commands,
    party: Res<Party>,
    mut state: ResMut<StageState>,
    pets: Query<&Pet>,
    awake: Query<(), Without<Dormant>>,
    mut messages: MessageWriter<UiMessage>,
) {
    if !state.triggered || state.is_completed() {
        return;
    }
    let standing = pets.get(party.megabyte).is_ok_and(|pet| !pet.sitting);
    if !standing || !awake.contains(party.kira) {
        return;
    }
    state.triggered = false;
    messages.write(UiMessage::lasting(KIRA_LEAVES_MESSAGE, 4500));
    after(&mut commands, Stage::Crossroad, 500, StageCue::KiraLeave);
}

#[allow(clippy::too_many_arguments)]
fn take_exit(
    party: Res<Party>,
    story: Res<StoryText>,
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    bodies: Query<(&Position, &Body)>,
    pets: Query<&Pet>,
    mut exit: Query<(&Position, &Zone, &mut Nudge), With<CrossroadExit>>,
    mut messages: MessageWriter<UiMessage>,
) {
    if state.is_completed() {
        return;
    }
    let (Ok((jon, body)), Ok((megabyte, _))) = (bodies.get(party.jon), bodies.get(party.megabyte))
    else {
        return;
    };
    let Ok((at, zone, mut nudge)) = exit.single_mut() else {
        return;
    };
    let inside = zone.overlaps(at.0, body.rect(jon.0));
    let entered = nudge.entered(inside);
    if !inside {
        return;
    }

    let sitting = pets.get(party.megabyte).is_ok_and(|pet| pet.sitting);
    if sitting {
        if entered {
            messages.write(UiMessage::lasting(STILL_SITTING_MESSAGE, 4000));
        }
        return;
    }
    if jon.0.distance(megabyte.0) >= CATCH_UP_DISTANCE {
        if entered {
            messages.write(UiMessage::lasting(CATCH_UP_MESSAGE, 3000));
        }
        return;
    }

    flags.set("kira_crossroad_complete");
    messages.write(UiMessage::lasting(story.crossroad_farewell.clone(), 4800));
    state.transition_to_next(FAREWELL_DELAY);
}

/// Tween for Kira's next leg, or her fade-out after the last one.
fn kira_leg(kira: Entity, from: Vec2, leg: usize) -> Tween {
    match KIRA_PATH.get(leg) {
        Some(&to) => {
            let ms = (from.distance(to) / KIRA_SPEED * 1000.0).round() as u64;
            Tween::new(kira, ms)
                .move_to(to)
                .then(TweenFinish::Cue(StageCue::KiraWaypoint(leg + 1)))
        }
        None => Tween::new(kira, KIRA_FADE_MS)
            .fade_to(0.0)
            .then(TweenFinish::Cue(StageCue::KiraGone)),
    }
}

fn crossroad_cues(
    mut commands: Commands,
    mut cues: MessageReader<CueFired>,
    party: Res<Party>,
    mut state: ResMut<StageState>,
    mut sounds: ResMut<SoundSystem>,
    positions: Query<&Position>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        let leg = match cue {
            StageCue::KiraEntered => {
                after(&mut commands, Stage::Crossroad, KIRA_SETTLE_MS, StageCue::KiraSettled);
                continue;
            }
            StageCue::KiraSettled => {
                sounds.play(SoundKey::MegabyteAnxious, CueOptions::default());
                messages.write(UiMessage::lasting(ANXIOUS_MESSAGE, 5000));
                state.triggered = true;
                continue;
            }
            StageCue::KiraGone => {
                put_to_sleep(&mut commands, party.kira);
                continue;
            }
            StageCue::KiraLeave => 0,
            StageCue::KiraWaypoint(leg) => leg,
            _ => continue,
        };
        let from = positions.get(party.kira).map_or(KIRA_TO, |p| p.0);
        kira_leg(party.kira, from, leg).spawn(&mut commands, Stage::Crossroad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::{completed, flag, party, place, shown, story_app_at};

    #[test]
    fn kira_walks_her_path_then_fades() {
        let kira = Entity::PLACEHOLDER;
        let first = kira_leg(kira, KIRA_TO, 0);
        assert_eq!(first.duration_ms(), 815);
        assert_eq!(first.finish(), TweenFinish::Cue(StageCue::KiraWaypoint(1)));

        let last = kira_leg(kira, KIRA_PATH[3], 4);
        assert_eq!(last.finish(), TweenFinish::Cue(StageCue::KiraWaypoint(5)));

        let fade = kira_leg(kira, KIRA_PATH[4], 5);
        assert_eq!(fade.duration_ms(), KIRA_FADE_MS);
        assert_eq!(fade.finish(), TweenFinish::Cue(StageCue::KiraGone));
    }

    #[test]
    fn exit_waits_for_megabyte_standing_and_close() {
        let mut app = story_app_at(Stage::Crossroad);
        let party = party(&app);
        assert!(app.world().get::<Pet>(party.megabyte).unwrap().sitting);

        place(&mut app, party.jon, EXIT_AT);
        app.update();
        assert!(!completed(&app));
        assert!(shown(&app).iter().any(|m| m == STILL_SITTING_MESSAGE));

        app.world_mut().get_mut::<Pet>(party.megabyte).unwrap().sitting = false;
        place(&mut app, party.jon, Vec2::new(300.0, 180.0));
        app.update();
        place(&mut app, party.jon, EXIT_AT);
        app.update();
        assert!(!completed(&app));
        assert!(shown(&app).iter().any(|m| m == CATCH_UP_MESSAGE));

        place(&mut app, party.megabyte, EXIT_AT - Vec2::new(30.0, 0.0));
        app.update();
        assert!(completed(&app));
        assert!(flag(&app, "kira_crossroad_complete"));
    }
}
