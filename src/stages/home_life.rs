// Home life: fetch the ham, feed Megabyte, then settle in for a game.
use bevy::prelude::*;

use super::{EnterSet, Nudge, Stage, StageState, WorldSet, hex_color, hex_color_alpha};
use crate::events::UiMessage;
use crate::follow::Follow;
use crate::motion::{Body, Position, Velocity, Zone};
use crate::player::{Party, Pet, set_sitting};
use crate::preload::{Backdrop, GameAssets};
use crate::script::{CueFired, StageCue, Tween, TweenFinish};
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct HomeLifePlugin;

impl Plugin for HomeLifePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::HomeLife),
            setup_home_life.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                (pick_up_ham, feed_megabyte, play_together)
                    .chain()
                    .in_set(WorldSet::Script),
                home_life_cues.in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::HomeLife)),
        )
        .add_systems(OnExit(Stage::HomeLife), |mut commands: Commands| {
            commands.remove_resource::<Pantry>();
        });
    }
}

const CLEAR_COLOR: u32 = 0x2d3436;
const JON_AT: Vec2 = Vec2::new(140.0, 220.0);
const BIANCA_AT: Vec2 = Vec2::new(110.0, 230.0);
const MEGABYTE_AT: Vec2 = Vec2::new(400.0, 240.0);

const BOWL_AT: Vec2 = Vec2::new(413.0, 129.0);
const BOWL_SIZE: f32 = 24.0;
const BOWL_STROKE: u32 = 0x654321;
const BOWL_FILL: u32 = 0x8b4513;
const BOWL_FULL: u32 = 0xd2691e;
const FEED_SIZE: f32 = 60.0;
const FEED_RANGE: f32 = 100.0;
const EATING_SPOT: Vec2 = Vec2::new(443.0, 129.0);
const TO_BOWL_MS: u64 = 1500;

const HAM_AT: Vec2 = Vec2::new(530.0, 57.0);
const HAM_SIZE: f32 = 50.0;

const CORNER_AT: Vec2 = Vec2::new(174.0, 177.0);
const CORNER_SIZE: Vec2 = Vec2::new(80.0, 60.0);
const CORNER_STROKE: u32 = 0x3498db;
const CORNER_FILL: u32 = 0x2c3e50;
const LABEL_COLOR: u32 = 0xf4f1e8;
const PLAY_DELAY: u64 = 5500;

const WELCOME: &str = "Home sweet home. Grab the ham and bring it to Megabyte's bowl.";
const GOT_HAM: &str = "You grabbed the ham. Bring it to the bowl.";
const NO_HAM: &str = "Find the ham first.";
const FED: &str = "Ham delivered. Megabyte is fed and happy.";
const CALL_MEGABYTE: &str = "Call Megabyte over to the bowl.";
const NOT_FED: &str = "Bring the ham to Megabyte first.";
const PLAYER_TWO: &str = "Player 2 has joined! This is the life. <3";

/// Whether Jon is carrying the ham.
#[derive(Resource, Debug, Default)]
struct Pantry {
    ham: bool,
}

#[derive(Component)]
struct Bowl;

#[derive(Component)]
struct FeedZone;

#[derive(Component)]
struct HamZone;

#[derive(Component)]
struct HamLabel;

#[derive(Component)]
struct GameCorner;

#[derive(Component)]
struct PlayZone;

fn setup_home_life(
    mut commands: Commands,
    assets: Res<GameAssets>,
    party: Res<Party>,
    mut positions: Query<&mut Position>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::HomeLife, Backdrop::HomeLife);
    for (entity, at) in [
        (party.jon, JON_AT),
        (party.bianca, BIANCA_AT),
        (party.megabyte, MEGABYTE_AT),
    ] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }
    commands.insert_resource(Pantry::default());
    messages.write(UiMessage::lasting(WELCOME, 5400));

    let bowl = super::spawn_frame(
        &mut commands,
        Stage::HomeLife,
        BOWL_AT,
        Vec2::splat(BOWL_SIZE),
        hex_color_alpha(BOWL_STROKE, 0.15),
        hex_color_alpha(BOWL_FILL, 0.08),
    );
    commands.entity(bowl).insert(Bowl);

    let corner = super::spawn_frame(
        &mut commands,
        Stage::HomeLife,
        CORNER_AT,
        CORNER_SIZE,
        hex_color_alpha(CORNER_STROKE, 0.8),
        hex_color_alpha(CORNER_FILL, 0.2),
    );
    commands.entity(corner).insert(GameCorner);

    let ham = super::spawn_label(
        &mut commands,
        Stage::HomeLife,
        "HAM",
        HAM_AT,
        12.0,
        hex_color(LABEL_COLOR),
    );
    commands.entity(ham).insert(HamLabel);
    super::spawn_label(
        &mut commands,
        Stage::HomeLife,
        "GAME",
        CORNER_AT - Vec2::new(0.0, 40.0),
        12.0,
        hex_color(LABEL_COLOR),
    );

    let zones = [
        (BOWL_AT, Vec2::splat(FEED_SIZE)),
        (HAM_AT, Vec2::splat(HAM_SIZE)),
        (CORNER_AT, CORNER_SIZE),
    ];
    let [feed, ham, play] =
        zones.map(|(at, size)| super::spawn_zone(&mut commands, Stage::HomeLife, at, size));
    commands.entity(feed).insert(FeedZone);
    commands.entity(ham).insert(HamZone);
    commands.entity(play).insert(PlayZone);
}

fn jon_rect(party: &Party, bodies: &Query<(&Position, &Body)>) -> Option<Rect> {
    bodies
        .get(party.jon)
        .ok()
        .map(|(at, body)| body.rect(at.0))
}

fn pick_up_ham(
    party: Res<Party>,
    pantry: Option<ResMut<Pantry>>,
    mut sounds: ResMut<SoundSystem>,
    bodies: Query<(&Position, &Body)>,
    mut zone: Query<(&Position, &mut Zone), With<HamZone>>,
    mut label: Query<&mut Visibility, With<HamLabel>>,
    mut messages: MessageWriter<UiMessage>,
) {
    let (Some(mut pantry), Some(jon)) = (pantry, jon_rect(&party, &bodies)) else {
        return;
    };
    let Ok((at, mut zone)) = zone.single_mut() else {
        return;
    };
    if pantry.ham || !zone.overlaps(at.0, jon) {
        return;
    }

    pantry.ham = true;
    zone.enabled = false;
    sounds.play(SoundKey::ItemCollect, CueOptions::default());
    if let Ok(mut visibility) = label.single_mut() {
        *visibility = Visibility::Hidden;
    }
    messages.write(UiMessage::lasting(GOT_HAM, 3200));
}

#[allow(clippy::too_many_arguments)]
fn feed_megabyte(
    mut commands: Commands,
    party: Res<Party>,
    pantry: Option<Res<Pantry>>,
    mut state: ResMut<StageState>,
    mut sounds: ResMut<SoundSystem>,
    bodies: Query<(&Position, &Body)>,
    mut zone: Query<(&Position, &Zone, &mut Nudge), With<FeedZone>>,
    mut pet: Query<(&mut Follow, &mut Velocity), With<Pet>>,
    mut bowl: Query<&mut Sprite, With<Bowl>>,
    mut messages: MessageWriter<UiMessage>,
) {
    if state.triggered {
        return;
    }
    let (Some(pantry), Some(jon)) = (pantry, jon_rect(&party, &bodies)) else {
        return;
    };
    let Ok((at, zone, mut nudge)) = zone.single_mut() else {
        return;
    };
    let inside = zone.overlaps(at.0, jon);
    let entered = nudge.entered(inside);
    if !inside {
        return;
    }

    if !pantry.ham {
        if entered {
            messages.write(UiMessage::lasting(NO_HAM, 3000));
        }
        return;
    }
    let megabyte_near = match (bodies.get(party.jon), bodies.get(party.megabyte)) {
        (Ok((jon_at, _)), Ok((pet_at, _))) => jon_at.0.distance(pet_at.0) < FEED_RANGE,
        _ => false,
    };
    if !megabyte_near {
        if entered {
            messages.write(UiMessage::lasting(CALL_MEGABYTE, 3000));
        }
        return;
    }

    state.triggered = true;
    sounds.play(SoundKey::BowlFill, CueOptions::default());
    if let Ok(mut sprite) = bowl.single_mut() {
        sprite.color = hex_color_alpha(BOWL_FULL, 0.2);
    }
    messages.write(UiMessage::lasting(FED, 4000));
    if let Ok((mut follow, mut velocity)) = pet.get_mut(party.megabyte) {
        follow.enabled = false;
        velocity.0 = Vec2::ZERO;
    }
    Tween::new(party.megabyte, TO_BOWL_MS)
        .move_to(EATING_SPOT)
        .then(TweenFinish::Cue(StageCue::PetAtBowl))
        .spawn(&mut commands, Stage::HomeLife);
}

fn play_together(
    party: Res<Party>,
    mut state: ResMut<StageState>,
    bodies: Query<(&Position, &Body)>,
    mut zone: Query<(&Position, &Zone, &mut Nudge), With<PlayZone>>,
    mut corner: Query<&mut Sprite, With<GameCorner>>,
    mut messages: MessageWriter<UiMessage>,
) {
    if state.is_completed() {
        return;
    }
    let Some(jon) = jon_rect(&party, &bodies) else {
        return;
    };
    let Ok((at, zone, mut nudge)) = zone.single_mut() else {
        return;
    };
    let inside = zone.overlaps(at.0, jon);
    let entered = nudge.entered(inside);
    if !inside {
        return;
    }

    if !state.triggered {
        if entered {
            messages.write(UiMessage::lasting(NOT_FED, 3000));
        }
        return;
    }
    if let Ok(mut sprite) = corner.single_mut() {
        sprite.color = hex_color_alpha(CORNER_STROKE, 0.2);
    }
    messages.write(UiMessage::lasting(PLAYER_TWO, 5000));
    state.transition_to_next(PLAY_DELAY);
}

fn home_life_cues(
    mut cues: MessageReader<CueFired>,
    party: Res<Party>,
    assets: Res<GameAssets>,
    mut pet: Query<(&mut Pet, &mut Sprite)>,
) {
    for &CueFired(cue) in cues.read() {
        if cue != StageCue::PetAtBowl {
            continue;
        }
        if let Ok((mut pet, mut sprite)) = pet.get_mut(party.megabyte) {
            set_sitting(&assets, &mut pet, &mut sprite, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::{completed, party, place, shown, story_app_at};

    fn saw(app: &App, text: &str) -> bool {
        shown(app).iter().any(|m| m == text)
    }

    fn fed(app: &App) -> bool {
        app.world().resource::<StageState>().triggered
    }

    #[test]
    fn ham_then_bowl_then_game() {
        let mut app = story_app_at(Stage::HomeLife);
        let party = party(&app);
        let away = Vec2::new(300.0, 300.0);

        place(&mut app, party.jon, away);
        app.update();
        place(&mut app, party.jon, CORNER_AT);
        app.update();
        assert!(saw(&app, NOT_FED));
        assert!(!completed(&app));

        place(&mut app, party.jon, BOWL_AT);
        app.update();
        assert!(saw(&app, NO_HAM));
        assert!(!fed(&app));

        place(&mut app, party.jon, HAM_AT);
        app.update();
        assert!(saw(&app, GOT_HAM));
        assert!(app.world().resource::<Pantry>().ham);

        place(&mut app, party.megabyte, BOWL_AT + Vec2::new(20.0, 10.0));
        place(&mut app, party.jon, BOWL_AT);
        app.update();
        assert!(fed(&app));
        assert!(saw(&app, FED));

        place(&mut app, party.jon, CORNER_AT);
        app.update();
        assert!(completed(&app));
        assert!(saw(&app, PLAYER_TWO));
    }

    #[test]
    fn megabyte_has_to_be_near_jon_not_the_bowl() {
        let mut app = story_app_at(Stage::HomeLife);
        let party = party(&app);
        app.world_mut().resource_mut::<Pantry>().ham = true;

        // On the edge of the feed zone, 83 px from the bowl but 125 px from Jon.
        place(&mut app, party.megabyte, Vec2::new(330.0, 129.0));
        place(&mut app, party.jon, Vec2::new(455.0, 129.0));
        app.update();
        assert!(!fed(&app));
        assert!(saw(&app, CALL_MEGABYTE));

        place(&mut app, party.megabyte, Vec2::new(420.0, 140.0));
        app.update();
        assert!(fed(&app));
    }
}
