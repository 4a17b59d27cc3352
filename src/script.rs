// Stage-scoped timers and tweens.
//
// Both live as entities tagged `DespawnOnExit(stage)`, so leaving a stage
// cancels anything still pending without firing it.
use std::time::Duration;

use bevy::prelude::*;

use crate::motion::Position;
use crate::stages::{Stage, WorldSet};

pub struct ScriptPlugin;

impl Plugin for ScriptPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (tick_delays, run_tweens, pulse).in_set(WorldSet::Animate),
        );
    }
}

/// Completion tokens handed back to the stage that scheduled them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageCue {
    PrologueMet,
    PrologueHint,
    PrologueDone,
    MoveInReady,
    HomeBuildEnterHint,
    MegabyteArrived,
    KiraEntered,
    KiraSettled,
    KiraWaypoint(usize),
    KiraGone,
    KiraLeave,
    PetAtBowl,
    ProposalAccepted,
    ProposalDone,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueFired(pub StageCue);

#[derive(Component, Debug)]
pub struct Delay {
    timer: Timer,
    cue: StageCue,
}

impl Delay {
    pub fn new(ms: u64, cue: StageCue) -> Self {
        Self {
            timer: Timer::new(Duration::from_millis(ms), TimerMode::Once),
            cue,
        }
    }
}

/// Fires `cue` after `ms` unless `stage` is left first.
pub fn after(commands: &mut Commands, stage: Stage, ms: u64, cue: StageCue) {
    commands.spawn((Delay::new(ms, cue), DespawnOnExit(stage)));
}

fn tick_delays(
    mut commands: Commands,
    time: Res<Time>,
    mut delays: Query<(Entity, &mut Delay)>,
    mut cues: MessageWriter<CueFired>,
) {
    for (entity, mut delay) in &mut delays {
        delay.timer.tick(time.delta());
        if delay.timer.just_finished() {
            cues.write(CueFired(delay.cue));
            commands.entity(entity).despawn();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenFinish {
    Nothing,
    /// Remove the animated entity along with the driver.
    Despawn,
    Cue(StageCue),
}

/// Drives a linear move and/or fade of `target`. Start values are captured
/// when the delay runs out.
#[derive(Component, Debug)]
pub struct Tween {
    pub target: Entity,
    delay: Timer,
    timer: Timer,
    move_to: Option<Vec2>,
    move_from: Option<Vec2>,
    alpha_to: Option<f32>,
    alpha_from: Option<f32>,
    finish: TweenFinish,
}

impl Tween {
    pub fn new(target: Entity, ms: u64) -> Self {
        Self {
            target,
            delay: Timer::new(Duration::ZERO, TimerMode::Once),
            timer: Timer::new(Duration::from_millis(ms), TimerMode::Once),
            move_to: None,
            move_from: None,
            alpha_to: None,
            alpha_from: None,
            finish: TweenFinish::Nothing,
        }
    }

    pub fn move_to(mut self, to: Vec2) -> Self {
        self.move_to = Some(to);
        self
    }

    pub fn fade_to(mut self, alpha: f32) -> Self {
        self.alpha_to = Some(alpha);
        self
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Timer::new(Duration::from_millis(ms), TimerMode::Once);
        self
    }

    pub fn then(mut self, finish: TweenFinish) -> Self {
        self.finish = finish;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.timer.duration().as_millis() as u64
    }

    pub fn finish(&self) -> TweenFinish {
        self.finish
    }

    pub fn spawn(self, commands: &mut Commands, stage: Stage) {
        commands.spawn((self, DespawnOnExit(stage)));
    }
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

fn alpha_of(sprite: Option<&Sprite>, text: Option<&TextColor>) -> f32 {
    sprite
        .map(|s| s.color.alpha())
        .or_else(|| text.map(|t| t.0.alpha()))
        .unwrap_or(1.0)
}

fn run_tweens(
    mut commands: Commands,
    time: Res<Time>,
    mut tweens: Query<(Entity, &mut Tween)>,
    mut targets: Query<(
        Option<&mut Position>,
        Option<&mut Sprite>,
        Option<&mut TextColor>,
    )>,
    mut cues: MessageWriter<CueFired>,
) {
    for (driver, mut tween) in &mut tweens {
        let Ok((position, sprite, text)) = targets.get_mut(tween.target) else {
            commands.entity(driver).despawn();
            continue;
        };

        if !tween.delay.is_finished() {
            tween.delay.tick(time.delta());
            if !tween.delay.is_finished() {
                continue;
            }
        }

        if tween.move_from.is_none() {
            tween.move_from = position.as_deref().map(|p| p.0);
        }
        if tween.alpha_from.is_none() {
            tween.alpha_from = Some(alpha_of(sprite.as_deref(), text.as_deref()));
        }

        tween.timer.tick(time.delta());
        let t = tween.timer.fraction();

        if let (Some(mut position), Some(from), Some(to)) =
            (position, tween.move_from, tween.move_to)
        {
            position.0 = from.lerp(to, t);
        }
        if let (Some(from), Some(to)) = (tween.alpha_from, tween.alpha_to) {
            let alpha = lerp(from, to, t);
            if let Some(mut sprite) = sprite {
                sprite.color.set_alpha(alpha);
            }
            if let Some(mut text) = text {
                text.0.set_alpha(alpha);
            }
        }

        if tween.timer.just_finished() {
            commands.entity(driver).despawn();
            match tween.finish {
                TweenFinish::Nothing => {}
                TweenFinish::Despawn => commands.entity(tween.target).despawn(),
                TweenFinish::Cue(cue) => {
                    cues.write(CueFired(cue));
                }
            }
        }
    }
}

/// Endless yoyo scale between 1 and `scale`, `half_period_ms` each way.
#[derive(Component, Debug)]
pub struct Pulse {
    pub scale: f32,
    pub half_period_ms: u64,
    elapsed: Duration,
}

impl Pulse {
    pub fn new(scale: f32, half_period_ms: u64) -> Self {
        Self {
            scale,
            half_period_ms,
            elapsed: Duration::ZERO,
        }
    }

    pub fn factor(&self) -> f32 {
        let half = self.half_period_ms.max(1) as f32;
        let phase = (self.elapsed.as_millis() as f32 / half) % 2.0;
        let t = if phase <= 1.0 { phase } else { 2.0 - phase };
        lerp(1.0, self.scale, t)
    }
}

fn pulse(time: Res<Time>, mut pulses: Query<(&mut Pulse, &mut Transform)>) {
    for (mut pulse, mut transform) in &mut pulses {
        pulse.elapsed += time.delta();
        transform.scale = Vec3::splat(pulse.factor());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::time::TimeUpdateStrategy;

    #[derive(Resource, Default)]
    struct Seen(Vec<StageCue>);

    fn record(mut reader: MessageReader<CueFired>, mut seen: ResMut<Seen>) {
        seen.0.extend(reader.read().map(|fired| fired.0));
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(
                100,
            )))
            .init_resource::<Seen>()
            .add_message::<CueFired>()
            .add_systems(Update, (tick_delays, run_tweens, record).chain());
        app
    }

    #[test]
    fn delay_fires_once() {
        let mut app = app();
        app.world_mut().spawn(Delay::new(250, StageCue::PrologueHint));

        app.update();
        app.update();
        assert!(app.world().resource::<Seen>().0.is_empty());

        for _ in 0..10 {
            app.update();
        }
        assert_eq!(app.world().resource::<Seen>().0, vec![StageCue::PrologueHint]);
        let mut delays = app.world_mut().query::<&Delay>();
        assert_eq!(delays.iter(app.world()).count(), 0);
    }

    #[test]
    fn tween_interpolates_then_reports() {
        let mut app = app();
        let target = app.world_mut().spawn(Position(Vec2::ZERO)).id();
        app.world_mut().spawn(
            Tween::new(target, 1000)
                .move_to(Vec2::new(100.0, 0.0))
                .then(TweenFinish::Cue(StageCue::MegabyteArrived)),
        );

        // The first frame carries no time.
        for _ in 0..6 {
            app.update();
        }
        let x = app.world().get::<Position>(target).unwrap().0.x;
        assert!(x > 30.0 && x < 70.0, "x = {x}");
        assert!(app.world().resource::<Seen>().0.is_empty());

        for _ in 0..10 {
            app.update();
        }
        assert_eq!(app.world().get::<Position>(target).unwrap().0.x, 100.0);
        assert_eq!(
            app.world().resource::<Seen>().0,
            vec![StageCue::MegabyteArrived]
        );
    }

    #[test]
    fn orphaned_tween_is_dropped() {
        let mut app = app();
        let target = app.world_mut().spawn(Position(Vec2::ZERO)).id();
        app.world_mut()
            .spawn(Tween::new(target, 500).then(TweenFinish::Cue(StageCue::KiraGone)));
        app.world_mut().despawn(target);

        for _ in 0..10 {
            app.update();
        }
        let mut tweens = app.world_mut().query::<&Tween>();
        assert_eq!(tweens.iter(app.world()).count(), 0);
        assert!(app.world().resource::<Seen>().0.is_empty());
    }

    #[test]
    fn pulse_yoyos() {
        let mut pulse = Pulse::new(1.2, 600);
        assert_eq!(pulse.factor(), 1.0);
        pulse.elapsed = Duration::from_millis(600);
        assert!((pulse.factor() - 1.2).abs() < 1e-5);
        pulse.elapsed = Duration::from_millis(1200);
        assert!((pulse.factor() - 1.0).abs() < 1e-5);
    }
}
