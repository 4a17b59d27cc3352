// Health challenge: reach the potion with Bianca close by and Megabyte sitting.
use bevy::prelude::*;

use super::{EnterSet, Nudge, Stage, StageState, WorldSet, hex_color, hex_color_alpha};
use crate::content::StoryText;
use crate::events::UiMessage;
use crate::flags::Flags;
use crate::motion::{Body, Position, Zone};
use crate::player::{Party, Pet};
use crate::preload::{Backdrop, GameAssets, Texture};
use crate::script::Pulse;
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct HealthPlugin;

impl Plugin for HealthPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(Stage::Health), setup_health.in_set(EnterSet::Script))
            .add_systems(
                Update,
                reach_potion
                    .in_set(WorldSet::Script)
                    .run_if(in_state(Stage::Health)),
            );
    }
}

const CLEAR_COLOR: u32 = 0x26222c;
const JON_AT: Vec2 = Vec2::new(130.0, 180.0);
const BIANCA_AT: Vec2 = Vec2::new(100.0, 200.0);
const MEGABYTE_AT: Vec2 = Vec2::new(90.0, 160.0);

const GROUND_AT: Vec2 = Vec2::new(320.0, 180.0);
const GROUND_SIZE: Vec2 = Vec2::new(540.0, 220.0);
const GROUND_STROKE: u32 = 0x705060;
const GROUND_FILL: u32 = 0x3d2f3a;
const HEALED_FILL: u32 = 0x35443f;

const POTION_AT: Vec2 = Vec2::new(320.0, 220.0);
const POTION_SIZE: f32 = 16.0;
const BIANCA_RANGE: f32 = 70.0;
const HEALED_DELAY: u64 = 1800;

const POTION_REMINDER: &str =
    "The potion needs Bianca nearby and Megabyte sitting. Press E near him.";

#[derive(Component)]
struct Ground;

#[derive(Component)]
struct Potion;

fn setup_health(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut positions: Query<&mut Position>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::Health, Backdrop::Health);
    for (entity, at) in [
        (party.jon, JON_AT),
        (party.bianca, BIANCA_AT),
        (party.megabyte, MEGABYTE_AT),
    ] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }
    messages.write(UiMessage::new(story.health_hint.clone()));

    let ground = super::spawn_frame(
        &mut commands,
        Stage::Health,
        GROUND_AT,
        GROUND_SIZE,
        hex_color_alpha(GROUND_STROKE, 0.8),
        hex_color_alpha(GROUND_FILL, 0.15),
    );
    commands.entity(ground).insert(Ground);

    let size = Vec2::splat(POTION_SIZE);
    commands.spawn((
        Potion,
        Sprite {
            image: assets.texture(Texture::Potion),
            custom_size: Some(size),
            ..default()
        },
        Transform::from_xyz(0.0, 0.0, 5.0),
        Position(POTION_AT),
        Zone::new(size),
        Nudge::default(),
        Pulse::new(1.1, 900),
        DespawnOnExit(Stage::Health),
    ));
}

#[allow(clippy::too_many_arguments)]
fn reach_potion(
    party: Res<Party>,
    story: Res<StoryText>,
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    mut sounds: ResMut<SoundSystem>,
    bodies: Query<(&Position, &Body)>,
    pets: Query<&Pet>,
    mut potion: Query<(&Position, &Zone, &mut Nudge), With<Potion>>,
    mut ground: Query<&mut Sprite, With<Ground>>,
    mut messages: MessageWriter<UiMessage>,
) {
    if state.is_completed() {
        return;
    }
    let (Ok((jon, jon_body)), Ok((bianca, _))) = (bodies.get(party.jon), bodies.get(party.bianca))
    else {
        return;
    };
    let Ok((at, zone, mut nudge)) = potion.single_mut() else {
        return;
    };
    let touching = zone.overlaps(at.0, jon_body.rect(jon.0));
    let entered = nudge.entered(touching);
    if !touching {
        return;
    }

    let bianca_close = jon.0.distance(bianca.0) < BIANCA_RANGE;
    let pet_sitting = pets.get(party.megabyte).is_ok_and(|pet| pet.sitting);
    if !(bianca_close && pet_sitting) {
        if entered {
            messages.write(UiMessage::new(POTION_REMINDER));
        }
        return;
    }

    sounds.play(SoundKey::ItemCollect, CueOptions::default());
    flags.set("health_challenge_complete");
    if let Ok(mut sprite) = ground.single_mut() {
        sprite.color = hex_color(HEALED_FILL);
    }
    messages.write(UiMessage::lasting(story.health_complete.clone(), 5400));
    state.transition_to_next(HEALED_DELAY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::{completed, flag, party, place, shown, story_app_at};

    fn sit(app: &mut App, sitting: bool) {
        let megabyte = party(app).megabyte;
        app.world_mut().get_mut::<Pet>(megabyte).unwrap().sitting = sitting;
    }

    #[test]
    fn potion_needs_megabyte_sitting() {
        let mut app = story_app_at(Stage::Health);
        let party = party(&app);
        sit(&mut app, false);
        place(&mut app, party.jon, POTION_AT);
        place(&mut app, party.bianca, POTION_AT + Vec2::new(20.0, 0.0));
        app.update();
        assert!(!completed(&app));
        assert!(shown(&app).iter().any(|m| m == POTION_REMINDER));

        sit(&mut app, true);
        app.update();
        assert!(completed(&app));
        assert!(flag(&app, "health_challenge_complete"));
    }

    #[test]
    fn potion_needs_bianca_within_range() {
        let mut app = story_app_at(Stage::Health);
        let party = party(&app);
        sit(&mut app, true);
        place(&mut app, party.jon, POTION_AT);
        place(&mut app, party.bianca, POTION_AT + Vec2::new(BIANCA_RANGE, 0.0));
        app.update();
        assert!(!completed(&app));
        assert!(!flag(&app, "health_challenge_complete"));

        place(&mut app, party.bianca, POTION_AT + Vec2::new(BIANCA_RANGE - 1.0, 0.0));
        app.update();
        assert!(completed(&app));

        let world = app.world_mut();
        let mut ground = world.query_filtered::<&Sprite, With<Ground>>();
        assert_eq!(ground.single(world).unwrap().color, hex_color(HEALED_FILL));
    }
}
