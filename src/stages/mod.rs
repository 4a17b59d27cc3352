//! The story as a linear sequence of hand-scripted stages.
//!
//! Each stage module adds an `OnEnter` setup, `Update` systems gated on its
//! state, and a handler for the cues it scheduled. Everything a stage spawns
//! is tagged `DespawnOnExit`, so moving to the next stage tears it down.
mod crossroad;
mod finale;
mod health;
mod home_build;
mod home_life;
mod megabyte;
mod move_in;
mod pet;
mod prologue;
mod proposal;
mod wedding;

use std::time::Duration;

use bevy::prelude::*;
use strum::IntoStaticStr;

use crate::events::HeartProgress;
use crate::follow::Follow;
use crate::motion::{Dormant, GAME_HEIGHT, GAME_WIDTH, Position, Velocity, Zone};
use crate::player::{Cast, ControlTarget, ControlsEnabled, Party, Pet, controls_enabled};
use crate::preload::{Backdrop, GameAssets, Texture};
use crate::sound::SoundSystem;
use crate::transition::Fade;

pub struct StagesPlugin;

impl Plugin for StagesPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<Stage>()
            .init_resource::<StageState>()
            .configure_sets(
                Update,
                (
                    WorldSet::Steer,
                    WorldSet::Physics,
                    WorldSet::Animate,
                    WorldSet::Face,
                    WorldSet::Script,
                    WorldSet::Cues,
                    WorldSet::Transition,
                    WorldSet::Sync,
                )
                    .chain(),
            )
            .configure_sets(
                Update,
                (WorldSet::Steer, WorldSet::Face, WorldSet::Script).run_if(controls_enabled),
            )
            .add_systems(
                Update,
                (
                    skip_stage.before(WorldSet::Transition),
                    advance_transition.in_set(WorldSet::Transition),
                )
                    .run_if(not(in_state(Stage::Preload))),
            );

        for stage in STORY {
            app.configure_sets(
                OnEnter(stage),
                (EnterSet::Reset, EnterSet::Script, EnterSet::Report).chain(),
            )
            .add_systems(
                OnEnter(stage),
                (
                    begin_stage.in_set(EnterSet::Reset),
                    log_positions.in_set(EnterSet::Report),
                ),
            );
        }

        app.add_plugins((
            prologue::ProloguePlugin,
            move_in::MoveInPlugin,
            home_build::HomeBuildPlugin,
            megabyte::MegabytePlugin,
            health::HealthPlugin,
            crossroad::CrossroadPlugin,
            home_life::HomeLifePlugin,
            proposal::ProposalPlugin,
            wedding::WeddingPlugin,
            finale::FinalePlugin,
            pet::PetCommandPlugin,
        ));
    }
}

#[derive(States, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    #[default]
    Preload,
    Prologue,
    MoveIn,
    HomeBuild,
    MegabyteJoins,
    Health,
    Crossroad,
    HomeLife,
    Proposal,
    Wedding,
    QuestComplete,
}

/// Story order. The heart meter fills by position in this list.
pub const STORY: [Stage; 10] = [
    Stage::Prologue,
    Stage::MoveIn,
    Stage::HomeBuild,
    Stage::MegabyteJoins,
    Stage::Health,
    Stage::Crossroad,
    Stage::HomeLife,
    Stage::Proposal,
    Stage::Wedding,
    Stage::QuestComplete,
];

impl Stage {
    pub fn index(self) -> Option<usize> {
        STORY.iter().position(|stage| *stage == self)
    }

    pub fn next(self) -> Option<Stage> {
        match self.index() {
            Some(index) => STORY.get(index + 1).copied(),
            None => Some(STORY[0]),
        }
    }

    pub fn progress(self) -> f32 {
        let last = (STORY.len() - 1) as f32;
        self.index().map_or(0.0, |index| (index as f32 / last).min(1.0))
    }

    pub fn label(self) -> &'static str {
        self.into()
    }
}

/// Ordering inside `Update`. Steering, facing and stage scripts pause while
/// controls are disabled; physics, tweens and cue handling keep running.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorldSet {
    Steer,
    Physics,
    Animate,
    Face,
    Script,
    Cues,
    Transition,
    Sync,
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnterSet {
    Reset,
    Script,
    Report,
}

pub const DEFAULT_DELAY: u64 = 300;

#[derive(Debug, Default)]
enum StagePhase {
    #[default]
    Playing,
    Leaving(Timer),
    Left,
}

/// Per-stage latches, reset on every stage entry.
#[derive(Resource, Debug, Default)]
pub struct StageState {
    /// One-shot latch each stage uses for its own purpose.
    pub triggered: bool,
    phase: StagePhase,
    fade_pending: bool,
    skipped: bool,
}

impl StageState {
    /// Schedules the next stage after `delay_ms`. Only the first call in a
    /// stage counts; later ones return false.
    pub fn transition_to_next(&mut self, delay_ms: u64) -> bool {
        if self.is_completed() {
            return false;
        }
        self.phase = StagePhase::Leaving(Timer::new(
            Duration::from_millis(delay_ms),
            TimerMode::Once,
        ));
        self.fade_pending = true;
        true
    }

    /// Leaves right away and marks the stage as skipped, so the next one
    /// resets companions instead of carrying them over.
    pub fn skip(&mut self) -> bool {
        let leaving = self.transition_to_next(0);
        self.skipped |= leaving;
        leaving
    }

    pub fn is_completed(&self) -> bool {
        !matches!(self.phase, StagePhase::Playing)
    }

    fn take_fade_request(&mut self) -> bool {
        std::mem::take(&mut self.fade_pending)
    }

    /// True on the one tick the delay runs out.
    fn tick(&mut self, delta: Duration) -> bool {
        let StagePhase::Leaving(timer) = &mut self.phase else {
            return false;
        };
        timer.tick(delta);
        if !timer.is_finished() {
            return false;
        }
        self.phase = StagePhase::Left;
        true
    }
}

fn advance_transition(
    time: Res<Time>,
    stage: Res<State<Stage>>,
    mut state: ResMut<StageState>,
    mut fade: ResMut<Fade>,
    mut next_stage: ResMut<NextState<Stage>>,
) {
    let next = stage.get().next();
    if state.take_fade_request() && next.is_some() {
        fade.fade_out();
    }
    if !state.tick(time.delta()) {
        return;
    }
    match next {
        Some(next) => {
            info!("stage {} -> {}", stage.get().label(), next.label());
            next_stage.set(next);
        }
        None => info!("{} is the last stage", stage.get().label()),
    }
}

fn skip_stage(
    keyboard: Res<ButtonInput<KeyCode>>,
    stage: Res<State<Stage>>,
    mut state: ResMut<StageState>,
) {
    if !keyboard.just_pressed(KeyCode::KeyN) || stage.get().next().is_none() {
        return;
    }
    info!("skip stage {}", stage.get().label());
    state.skip();
}

/// Common reset before a stage's own setup runs. Companion state carries
/// over from the previous stage unless that stage was skipped.
#[allow(clippy::too_many_arguments)]
fn begin_stage(
    mut commands: Commands,
    stage: Res<State<Stage>>,
    party: Res<Party>,
    assets: Res<GameAssets>,
    mut control: ResMut<ControlTarget>,
    mut controls: ResMut<ControlsEnabled>,
    mut state: ResMut<StageState>,
    mut sounds: ResMut<SoundSystem>,
    mut fade: ResMut<Fade>,
    mut heart: MessageWriter<HeartProgress>,
    mut cast: Query<(&mut Velocity, &mut Sprite, Option<&mut Pet>, Option<&mut Follow>)>,
) {
    control.0 = party.jon;
    controls.0 = true;
    let skipped = state.skipped;
    *state = StageState::default();
    sounds.stop_all();

    for (mut velocity, mut sprite, pet, follow) in &mut cast {
        velocity.0 = Vec2::ZERO;
        if !skipped {
            continue;
        }
        if let Some(mut follow) = follow {
            follow.enabled = true;
        }
        if let Some(mut pet) = pet {
            pet.sitting = false;
            sprite.image = assets.texture(Texture::Megabyte);
            sprite.color = Color::WHITE;
        }
    }
    if let Ok((_, mut kira, _, _)) = cast.get_mut(party.kira) {
        kira.color.set_alpha(1.0);
    }
    commands
        .entity(party.kira)
        .insert((Dormant, Visibility::Hidden));

    heart.write(HeartProgress(stage.get().progress()));
    fade.fade_in();
}

fn log_positions(
    stage: Res<State<Stage>>,
    cast: Query<(&Cast, &Position, Has<Dormant>)>,
) {
    let mut report = Vec::new();
    for (who, position, dormant) in &cast {
        let name: &'static str = (*who).into();
        if dormant {
            report.push(format!("{name} -"));
        } else {
            let at = position.0.round();
            report.push(format!("{name} ({}, {})", at.x, at.y));
        }
    }
    info!("[{}] {}", stage.get().label(), report.join(", "));
}

/// Full-screen background image for a stage.
pub fn spawn_backdrop(
    commands: &mut Commands,
    assets: &GameAssets,
    stage: Stage,
    backdrop: Backdrop,
) -> Entity {
    commands
        .spawn((
            StageBackdrop,
            Sprite {
                image: assets.backdrop(backdrop),
                custom_size: Some(Vec2::new(GAME_WIDTH, GAME_HEIGHT)),
                ..default()
            },
            Position(Vec2::new(GAME_WIDTH / 2.0, GAME_HEIGHT / 2.0)),
            Transform::from_xyz(0.0, 0.0, -100.0),
            DespawnOnExit(stage),
        ))
        .id()
}

#[derive(Component, Debug)]
pub struct StageBackdrop;

const FRAME_DEPTH: f32 = -10.0;

/// A filled rectangle with a stroked border, centred at `at`.
pub fn spawn_frame(
    commands: &mut Commands,
    stage: Stage,
    at: Vec2,
    size: Vec2,
    stroke: Color,
    fill: Color,
) -> Entity {
    const EDGE: f32 = 2.0;
    let half = size / 2.0;
    commands
        .spawn((
            Sprite::from_color(fill, size),
            Position(at),
            Transform::from_xyz(0.0, 0.0, FRAME_DEPTH),
            DespawnOnExit(stage),
        ))
        .with_children(|frame| {
            let edges = [
                (Vec2::new(0.0, half.y - EDGE / 2.0), Vec2::new(size.x, EDGE)),
                (Vec2::new(0.0, EDGE / 2.0 - half.y), Vec2::new(size.x, EDGE)),
                (Vec2::new(EDGE / 2.0 - half.x, 0.0), Vec2::new(EDGE, size.y)),
                (Vec2::new(half.x - EDGE / 2.0, 0.0), Vec2::new(EDGE, size.y)),
            ];
            for (offset, edge) in edges {
                frame.spawn((
                    Sprite::from_color(stroke, edge),
                    Transform::from_xyz(offset.x, offset.y, 0.1),
                ));
            }
        })
        .id()
}

pub fn spawn_zone(commands: &mut Commands, stage: Stage, at: Vec2, size: Vec2) -> Entity {
    commands
        .spawn((
            Zone::new(size),
            Position(at),
            Nudge::default(),
            DespawnOnExit(stage),
        ))
        .id()
}

const LABEL_DEPTH: f32 = 20.0;

pub fn spawn_label(
    commands: &mut Commands,
    stage: Stage,
    text: &str,
    at: Vec2,
    font_size: f32,
    color: Color,
) -> Entity {
    commands
        .spawn((
            Text2d::new(text),
            TextFont {
                font_size,
                ..default()
            },
            TextColor(color),
            Position(at),
            Transform::from_xyz(0.0, 0.0, LABEL_DEPTH),
            DespawnOnExit(stage),
        ))
        .id()
}

/// Remembers whether something was overlapping last frame, so reminders
/// show once per entry instead of every frame.
#[derive(Component, Debug, Default)]
pub struct Nudge {
    inside: bool,
}

impl Nudge {
    pub fn entered(&mut self, overlapping: bool) -> bool {
        let rising = overlapping && !self.inside;
        self.inside = overlapping;
        rising
    }
}

pub fn set_clear_color(commands: &mut Commands, hex: u32) {
    commands.insert_resource(ClearColor(hex_color(hex)));
}

pub fn hex_color(hex: u32) -> Color {
    Color::srgb_u8((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

pub fn hex_color_alpha(hex: u32, alpha: f32) -> Color {
    hex_color(hex).with_alpha(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentPlugin;
    use crate::events::{EventsPlugin, UiMessage};
    use crate::flags::Flags;
    use crate::motion::MotionPlugin;
    use crate::player::PlayerPlugin;
    use crate::preload::GameAssets;
    use crate::script::{Delay, ScriptPlugin, Tween};
    use crate::sound::SoundPlugin;
    use crate::transition::TransitionPlugin;
    use bevy::state::app::StatesPlugin;
    use bevy::time::TimeUpdateStrategy;

    #[test]
    fn second_transition_request_is_ignored() {
        let mut state = StageState::default();
        assert!(state.transition_to_next(300));
        assert!(!state.transition_to_next(0));
        assert!(state.take_fade_request());
        assert!(!state.take_fade_request());

        assert!(!state.tick(Duration::from_millis(200)));
        assert!(state.tick(Duration::from_millis(200)));
        assert!(!state.tick(Duration::from_millis(200)));
        assert!(state.is_completed());
    }

    #[test]
    fn story_order_and_progress() {
        assert_eq!(Stage::Preload.next(), Some(Stage::Prologue));
        assert_eq!(Stage::Wedding.next(), Some(Stage::QuestComplete));
        assert_eq!(Stage::QuestComplete.next(), None);
        assert_eq!(Stage::Prologue.progress(), 0.0);
        assert!((Stage::Health.progress() - 4.0 / 9.0).abs() < 1e-6);
        assert_eq!(Stage::QuestComplete.progress(), 1.0);
        assert_eq!(Stage::MegabyteJoins.label(), "megabyte_joins");
    }

    #[test]
    fn nudge_fires_on_entry_only() {
        let mut nudge = Nudge::default();
        assert!(nudge.entered(true));
        assert!(!nudge.entered(true));
        assert!(!nudge.entered(false));
        assert!(nudge.entered(true));
    }

    pub(super) fn story_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(
                50,
            )))
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<GameAssets>()
            .add_plugins((
                EventsPlugin,
                ContentPlugin,
                SoundPlugin,
                ScriptPlugin,
                MotionPlugin,
                PlayerPlugin,
                TransitionPlugin,
                StagesPlugin,
            ));
        app
    }

    pub(super) fn current(app: &App) -> Stage {
        *app.world().resource::<State<Stage>>().get()
    }

    /// A fresh story app sitting in `stage`, with its setup applied.
    pub(super) fn story_app_at(stage: Stage) -> App {
        let mut app = story_app();
        app.update();
        app.world_mut().resource_mut::<NextState<Stage>>().set(stage);
        app.update();
        assert_eq!(current(&app), stage);
        app
    }

    pub(super) fn party(app: &App) -> Party {
        *app.world().resource::<Party>()
    }

    pub(super) fn place(app: &mut App, entity: Entity, at: Vec2) {
        if let Some(mut position) = app.world_mut().get_mut::<Position>(entity) {
            position.0 = at;
        }
    }

    /// Overlay messages written during the last two updates.
    pub(super) fn shown(app: &App) -> Vec<String> {
        let messages = app.world().resource::<Messages<UiMessage>>();
        let mut cursor = messages.get_cursor();
        cursor.read(messages).map(|m| m.text.clone()).collect()
    }

    pub(super) fn completed(app: &App) -> bool {
        app.world().resource::<StageState>().is_completed()
    }

    pub(super) fn flag(app: &App, key: &str) -> bool {
        app.world().resource::<Flags>().get(key)
    }

    fn scoped(app: &mut App) -> usize {
        let world = app.world_mut();
        let stage_scoped = world
            .query_filtered::<Entity, With<DespawnOnExit<Stage>>>()
            .iter(world)
            .count();
        let delays = world.query::<&Delay>().iter(world).count();
        let tweens = world.query::<&Tween>().iter(world).count();
        let zones = world.query::<&Zone>().iter(world).count();
        stage_scoped + delays + tweens + zones
    }

    #[test]
    fn every_stage_cleans_up_after_itself() {
        let mut app = story_app();
        app.update();

        for stage in STORY {
            app.world_mut()
                .resource_mut::<NextState<Stage>>()
                .set(stage);
            app.update();
            assert_eq!(current(&app), stage);
            app.update();
        }
        app.world_mut()
            .resource_mut::<NextState<Stage>>()
            .set(Stage::Preload);
        app.update();
        assert_eq!(current(&app), Stage::Preload);
        assert_eq!(scoped(&mut app), 0);
        assert!(!app.world().resource::<Flags>().all().is_empty());
    }

    #[test]
    fn double_request_advances_one_stage() {
        let mut app = story_app();
        app.update();
        app.world_mut()
            .resource_mut::<NextState<Stage>>()
            .set(Stage::Prologue);
        app.update();
        assert_eq!(current(&app), Stage::Prologue);

        {
            let mut state = app.world_mut().resource_mut::<StageState>();
            assert!(state.transition_to_next(DEFAULT_DELAY));
            assert!(!state.transition_to_next(0));
        }
        for _ in 0..30 {
            app.update();
        }
        assert_eq!(current(&app), Stage::MoveIn);
    }

    #[test]
    fn entering_a_stage_reports_heart_progress() {
        let mut app = story_app();
        app.update();
        app.world_mut()
            .resource_mut::<NextState<Stage>>()
            .set(Stage::Health);
        app.update();

        let messages = app.world().resource::<Messages<HeartProgress>>();
        let mut cursor = messages.get_cursor();
        let values: Vec<f32> = cursor.read(messages).map(|m| m.0).collect();
        assert_eq!(values.len(), 1);
        assert!((values[0] - 4.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn companions_carry_over_unless_the_stage_was_skipped() {
        let mut app = story_app_at(Stage::MegabyteJoins);
        let megabyte = party(&app).megabyte;
        app.world_mut().get_mut::<Pet>(megabyte).unwrap().sitting = true;
        app.world_mut().resource_mut::<StageState>().transition_to_next(0);
        app.update();
        app.update();
        assert_eq!(current(&app), Stage::Health);
        assert!(app.world().get::<Pet>(megabyte).unwrap().sitting);
        assert!(!app.world().get::<Follow>(megabyte).unwrap().enabled);

        app.world_mut().resource_mut::<StageState>().skip();
        app.update();
        app.update();
        assert_eq!(current(&app), Stage::Crossroad);
        // Crossroad sits him down again in its own setup.
        assert!(app.world().get::<Pet>(megabyte).unwrap().sitting);
        assert!(app.world().get::<Follow>(party(&app).bianca).unwrap().enabled);
    }
}
