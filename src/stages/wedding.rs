// The wedding: Bianca walks down the aisle to the altar where Jon waits.
use bevy::prelude::*;

use super::{EnterSet, Stage, StageState, WorldSet};
use crate::content::StoryText;
use crate::events::UiMessage;
use crate::flags::Flags;
use crate::follow::Follow;
use crate::motion::{Body, Position, Zone};
use crate::player::{ControlTarget, Party, Pet, dress, wake};
use crate::preload::{Backdrop, GameAssets, Texture};

pub struct WeddingPlugin;

impl Plugin for WeddingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::Wedding),
            setup_wedding.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            walk_the_aisle
                .in_set(WorldSet::Script)
                .run_if(in_state(Stage::Wedding)),
        );
    }
}

const CLEAR_COLOR: u32 = 0x2a2b24;
const JON_AT: Vec2 = Vec2::new(290.0, 82.0);
const BIANCA_AT: Vec2 = Vec2::new(243.0, 303.0);
const MEGABYTE_AT: Vec2 = Vec2::new(184.0, 131.0);
const JON_SIZE: Vec2 = Vec2::new(40.0, 78.0);
const BIANCA_SIZE: Vec2 = Vec2::new(55.0, 72.0);
const MEGABYTE_SIZE: Vec2 = Vec2::new(32.0, 36.0);

const ALTAR_AT: Vec2 = Vec2::new(346.0, 106.0);
const ALTAR_SIZE: Vec2 = Vec2::new(26.0, 18.0);
const ALTAR_ZONE: f32 = 60.0;
const VOWS_DELAY: u64 = 700;

#[derive(Component)]
struct Altar;

#[allow(clippy::too_many_arguments)]
fn setup_wedding(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut control: ResMut<ControlTarget>,
    mut cast: Query<(&mut Position, &mut Sprite, &mut Body, Option<&mut Follow>)>,
    mut pets: Query<&mut Pet>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(&mut commands, &assets, Stage::Wedding, Backdrop::Wedding);

    for (entity, at, texture, size) in [
        (party.jon, JON_AT, Texture::JonWedding, JON_SIZE),
        (party.bianca, BIANCA_AT, Texture::BiancaWedding, BIANCA_SIZE),
        (party.megabyte, MEGABYTE_AT, Texture::MegabyteSitting, MEGABYTE_SIZE),
    ] {
        let Ok((mut position, mut sprite, mut body, follow)) = cast.get_mut(entity) else {
            continue;
        };
        position.0 = at;
        dress(&assets, texture, size, &mut sprite, &mut body);
        if let Some(mut follow) = follow {
            follow.enabled = false;
        }
    }
    wake(&mut commands, party.megabyte);
    if let Ok(mut pet) = pets.get_mut(party.megabyte) {
        pet.sitting = true;
    }
    control.0 = party.bianca;

    messages.write(UiMessage::new(story.last_tile_instruction.clone()));

    commands.spawn((
        Altar,
        Sprite {
            image: assets.texture(Texture::Altar),
            custom_size: Some(ALTAR_SIZE),
            ..default()
        },
        Transform::from_xyz(0.0, 0.0, 5.0),
        Position(ALTAR_AT),
        Zone::new(Vec2::splat(ALTAR_ZONE)),
        DespawnOnExit(Stage::Wedding),
    ));
}

fn walk_the_aisle(
    party: Res<Party>,
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    bodies: Query<(&Position, &Body)>,
    altar: Query<(&Position, &Zone), With<Altar>>,
) {
    if state.is_completed() {
        return;
    }
    let (Ok((bianca, body)), Ok((at, zone))) = (bodies.get(party.bianca), altar.single()) else {
        return;
    };
    if zone.overlaps(at.0, body.rect(bianca.0)) {
        flags.set("at_altar");
        state.transition_to_next(VOWS_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::{completed, flag, party, place, story_app_at};

    #[test]
    fn bianca_reaching_the_altar_ends_the_stage() {
        let mut app = story_app_at(Stage::Wedding);
        let party = party(&app);
        assert_eq!(app.world().resource::<ControlTarget>().0, party.bianca);

        place(&mut app, party.jon, ALTAR_AT);
        app.update();
        assert!(!completed(&app));

        place(&mut app, party.jon, JON_AT);
        place(&mut app, party.bianca, ALTAR_AT + Vec2::new(0.0, 20.0));
        app.update();
        assert!(completed(&app));
        assert!(flag(&app, "at_altar"));
    }
}
