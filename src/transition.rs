// Black curtain that fades the scene out and back in between stages.

use bevy::prelude::*;

pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Fade>()
            .add_systems(Startup, spawn_curtain)
            .add_systems(Update, fade_curtain);
    }
}

/// Seconds for a full fade either way.
pub const FADE_SECS: f32 = 0.3;

/// Sits under the overlay so messages stay readable while the scene is dark.
const CURTAIN_Z: i32 = 5;

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub alpha: f32,
    target: f32,
}

impl Default for Fade {
    // Start dark, the first stage fades in.
    fn default() -> Self {
        Self {
            alpha: 1.0,
            target: 1.0,
        }
    }
}

impl Fade {
    pub fn fade_out(&mut self) {
        self.target = 1.0;
    }

    pub fn fade_in(&mut self) {
        self.target = 0.0;
    }

    pub fn step(&mut self, dt: f32) {
        let max_step = dt / FADE_SECS;
        let delta = (self.target - self.alpha).clamp(-max_step, max_step);
        self.alpha = (self.alpha + delta).clamp(0.0, 1.0);
    }
}

#[derive(Component)]
struct Curtain;

fn spawn_curtain(mut commands: Commands, fade: Res<Fade>) {
    commands.spawn((
        Curtain,
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, fade.alpha)),
        GlobalZIndex(CURTAIN_Z),
        Pickable::IGNORE,
    ));
}

fn fade_curtain(
    time: Res<Time>,
    mut fade: ResMut<Fade>,
    mut curtains: Query<&mut BackgroundColor, With<Curtain>>,
) {
    if fade.alpha == fade.target {
        return;
    }
    fade.step(time.delta_secs());
    for mut bg in &mut curtains {
        bg.0 = Color::srgba(0.0, 0.0, 0.0, fade.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fades_take_three_tenths_of_a_second() {
        let mut fade = Fade::default();
        fade.fade_in();
        fade.step(0.15);
        assert!((fade.alpha - 0.5).abs() < 1e-4);
        fade.step(0.2);
        assert_eq!(fade.alpha, 0.0);

        fade.fade_out();
        fade.step(0.1);
        assert!((fade.alpha - 1.0 / 3.0).abs() < 1e-4);
        fade.step(1.0);
        assert!((fade.alpha - 1.0).abs() < 1e-5);
    }
}
