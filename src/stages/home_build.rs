// Building the house: stand on the site together until it is done, then
// walk through the front door.
use std::time::Duration;

use bevy::prelude::*;

use super::{EnterSet, Stage, StageBackdrop, StageState, WorldSet, hex_color_alpha};
use crate::content::StoryText;
use crate::events::UiMessage;
use crate::flags::Flags;
use crate::motion::{Position, Zone};
use crate::player::Party;
use crate::preload::{Backdrop, GameAssets};
use crate::script::{CueFired, StageCue, after};
use crate::sound::{CueOptions, SoundKey, SoundSystem};

pub struct HomeBuildPlugin;

impl Plugin for HomeBuildPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::HomeBuild),
            setup_home_build.in_set(EnterSet::Script),
        )
        .add_systems(
            Update,
            (
                build_house.in_set(WorldSet::Script),
                home_build_cues.in_set(WorldSet::Cues),
            )
                .run_if(in_state(Stage::HomeBuild)),
        )
        .add_systems(OnExit(Stage::HomeBuild), |mut commands: Commands| {
            commands.remove_resource::<BuildSite>();
        });
    }
}

const CLEAR_COLOR: u32 = 0x1f2b2b;
const JON_AT: Vec2 = Vec2::new(140.0, 140.0);
const BIANCA_AT: Vec2 = Vec2::new(110.0, 160.0);

const SITE_AT: Vec2 = Vec2::new(320.0, 180.0);
const SITE_SIZE: Vec2 = Vec2::new(140.0, 120.0);
const BLUEPRINT_COLOR: u32 = 0x6fb1a3;
const DOOR_AT: Vec2 = Vec2::new(514.0, 124.0);
const DOOR_SIZE: f32 = 56.0;

/// Progress per millisecond spent on site together.
const BUILD_RATE: f32 = 0.00035;
const BUILDING_VOLUME: f32 = 0.25;
const BUILDING_SEEK: Duration = Duration::from_secs(2);
const DOOR_DELAY: u64 = 800;

#[derive(Resource, Debug, Default)]
pub struct BuildSite {
    pub progress: f32,
    sound_started: bool,
    completed: bool,
}

impl BuildSite {
    /// Adds `delta_ms` of work, capped at done.
    pub fn work(&mut self, delta_ms: f32) {
        self.progress = (self.progress + delta_ms * BUILD_RATE).min(1.0);
    }

    pub fn percent(&self) -> u32 {
        (self.progress * 100.0).floor() as u32
    }
}

#[derive(Component)]
struct SiteZone;

#[derive(Component)]
struct DoorZone;

/// Blueprint outline and percentage label, hidden once the house stands.
#[derive(Component)]
struct Scaffold;

#[derive(Component)]
struct ProgressLabel;

fn setup_home_build(
    mut commands: Commands,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    party: Res<Party>,
    mut positions: Query<&mut Position>,
    mut messages: MessageWriter<UiMessage>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    super::spawn_backdrop(
        &mut commands,
        &assets,
        Stage::HomeBuild,
        Backdrop::ConstructionBefore,
    );
    for (entity, at) in [(party.jon, JON_AT), (party.bianca, BIANCA_AT)] {
        if let Ok(mut position) = positions.get_mut(entity) {
            position.0 = at;
        }
    }
    commands.insert_resource(BuildSite::default());

    messages.write(UiMessage::new(story.home_build_hint.clone()));

    let site = super::spawn_zone(&mut commands, Stage::HomeBuild, SITE_AT, SITE_SIZE);
    commands.entity(site).insert(SiteZone);

    let blueprint = super::spawn_frame(
        &mut commands,
        Stage::HomeBuild,
        SITE_AT,
        SITE_SIZE,
        hex_color_alpha(BLUEPRINT_COLOR, 0.8),
        Color::NONE,
    );
    commands.entity(blueprint).insert(Scaffold);

    let label = super::spawn_label(
        &mut commands,
        Stage::HomeBuild,
        "0%",
        SITE_AT - Vec2::new(30.0, 0.0),
        14.0,
        Color::WHITE,
    );
    commands.entity(label).insert((Scaffold, ProgressLabel));

    let door = super::spawn_zone(
        &mut commands,
        Stage::HomeBuild,
        DOOR_AT,
        Vec2::splat(DOOR_SIZE),
    );
    commands.entity(door).insert(DoorZone);
}

#[allow(clippy::too_many_arguments)]
fn build_house(
    mut commands: Commands,
    time: Res<Time>,
    party: Res<Party>,
    assets: Res<GameAssets>,
    story: Res<StoryText>,
    site: Option<ResMut<BuildSite>>,
    mut state: ResMut<StageState>,
    mut flags: ResMut<Flags>,
    mut sounds: ResMut<SoundSystem>,
    positions: Query<&Position>,
    zones: Query<(&Position, &Zone, Has<DoorZone>), Or<(With<SiteZone>, With<DoorZone>)>>,
    mut label: Query<&mut Text2d, With<ProgressLabel>>,
    mut scaffold: Query<&mut Visibility, With<Scaffold>>,
    mut backdrop: Query<&mut Sprite, With<StageBackdrop>>,
    mut messages: MessageWriter<UiMessage>,
) {
    let Some(mut site) = site else {
        return;
    };
    if state.is_completed() {
        return;
    }
    let (Ok(jon), Ok(bianca)) = (positions.get(party.jon), positions.get(party.bianca)) else {
        return;
    };
    let both_inside = |door: bool| {
        zones
            .iter()
            .filter(|(_, _, is_door)| *is_door == door)
            .any(|(at, zone, _)| zone.contains(at.0, jon.0) && zone.contains(at.0, bianca.0))
    };

    if both_inside(false) {
        site.work(time.delta_secs() * 1000.0);
        if !site.sound_started {
            site.sound_started = true;
            sounds.play(
                SoundKey::Building,
                CueOptions::at_volume(BUILDING_VOLUME).seek(BUILDING_SEEK),
            );
        }
    } else if site.sound_started && sounds.is_playing(SoundKey::Building) {
        sounds.stop(SoundKey::Building);
        site.sound_started = false;
    }

    if let Ok(mut text) = label.single_mut() {
        text.0 = format!("{}%", site.percent());
    }

    if site.progress >= 1.0 && !site.completed {
        site.completed = true;
        state.triggered = true;
        sounds.stop(SoundKey::Building);
        if let Ok(mut sprite) = backdrop.single_mut() {
            sprite.image = assets.backdrop(Backdrop::ConstructionAfter);
        }
        flags.set("home_built");
        messages.write(UiMessage::lasting(story.home_build_complete.clone(), 6000));
        after(&mut commands, Stage::HomeBuild, 6600, StageCue::HomeBuildEnterHint);
        for mut visibility in &mut scaffold {
            *visibility = Visibility::Hidden;
        }
    }

    if state.triggered && both_inside(true) {
        sounds.play(SoundKey::Door, CueOptions::default());
        state.transition_to_next(DOOR_DELAY);
    }
}

fn home_build_cues(
    mut cues: MessageReader<CueFired>,
    story: Res<StoryText>,
    mut messages: MessageWriter<UiMessage>,
) {
    for &CueFired(cue) in cues.read() {
        if cue == StageCue::HomeBuildEnterHint {
            messages.write(UiMessage::lasting(story.home_build_enter.clone(), 6000));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::{completed, flag, party, place, shown, story_app_at};

    #[test]
    fn building_takes_about_three_seconds_together() {
        let mut site = BuildSite::default();
        site.work(1000.0);
        assert!((34..=35).contains(&site.percent()));
        site.work(1000.0);
        assert!(site.progress < 1.0);
        site.work(1000.0);
        assert_eq!(site.progress, 1.0);
        assert_eq!(site.percent(), 100);
    }

    #[test]
    fn door_only_opens_once_the_house_stands() {
        let mut app = story_app_at(Stage::HomeBuild);
        let party = party(&app);
        let at_door = |app: &mut App| {
            place(app, party.jon, DOOR_AT - Vec2::new(10.0, 0.0));
            place(app, party.bianca, DOOR_AT + Vec2::new(10.0, 0.0));
        };

        at_door(&mut app);
        for _ in 0..5 {
            app.update();
        }
        assert!(!completed(&app));

        place(&mut app, party.jon, SITE_AT - Vec2::new(10.0, 0.0));
        place(&mut app, party.bianca, SITE_AT + Vec2::new(10.0, 0.0));
        for _ in 0..80 {
            app.update();
        }
        assert!(app.world().resource::<StageState>().triggered);
        assert!(flag(&app, "home_built"));
        assert_eq!(app.world().resource::<BuildSite>().percent(), 100);
        assert!(!completed(&app));

        at_door(&mut app);
        app.update();
        assert!(completed(&app));
    }

    #[test]
    fn building_alone_makes_no_progress() {
        let mut app = story_app_at(Stage::HomeBuild);
        let party = party(&app);
        place(&mut app, party.jon, SITE_AT);
        for _ in 0..20 {
            app.update();
        }
        assert_eq!(app.world().resource::<BuildSite>().progress, 0.0);
        let story = app.world().resource::<StoryText>().home_build_complete.clone();
        assert!(!shown(&app).contains(&story));
    }
}
