// Quest complete: everyone stops and the credits roll.
use bevy::prelude::*;

use super::{EnterSet, Stage, hex_color};
use crate::flags::Flags;
use crate::motion::{GAME_HEIGHT, GAME_WIDTH, Velocity};
use crate::player::{ControlsEnabled, Party, put_to_sleep};

pub struct FinalePlugin;

impl Plugin for FinalePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(Stage::QuestComplete),
            roll_credits.in_set(EnterSet::Script),
        );
    }
}

const CLEAR_COLOR: u32 = 0x1a1d22;
const CREDITS_COLOR: u32 = 0xf4f1e8;
const FONT_SIZE: f32 = 16.0;
const LINE_SPACING: f32 = 20.0;

const CREDITS: [&str; 10] = [
    "Quest Complete",
    "",
    "Bianca & Jon",
    "",
    "This adventure doesn't end here.",
    "It just unlocked co-op mode.",
    "",
    "With Megabyte",
    "",
    "Made with love by Eli & Cheska",
];

/// Stage-space centre of each credits line, stacked around the middle.
fn credit_positions() -> impl Iterator<Item = Vec2> {
    let top = GAME_HEIGHT / 2.0 - LINE_SPACING * (CREDITS.len() - 1) as f32 / 2.0;
    (0..CREDITS.len()).map(move |i| Vec2::new(GAME_WIDTH / 2.0, top + LINE_SPACING * i as f32))
}

fn roll_credits(
    mut commands: Commands,
    party: Res<Party>,
    mut controls: ResMut<ControlsEnabled>,
    mut flags: ResMut<Flags>,
    mut velocities: Query<&mut Velocity>,
) {
    super::set_clear_color(&mut commands, CLEAR_COLOR);
    controls.0 = false;
    for mut velocity in &mut velocities {
        velocity.0 = Vec2::ZERO;
    }
    for member in [party.jon, party.bianca, party.megabyte, party.kira] {
        put_to_sleep(&mut commands, member);
    }
    flags.set("quest_complete");

    for (line, at) in CREDITS.iter().zip(credit_positions()) {
        if line.is_empty() {
            continue;
        }
        super::spawn_label(
            &mut commands,
            Stage::QuestComplete,
            line,
            at,
            FONT_SIZE,
            hex_color(CREDITS_COLOR),
        );
    }
    info!("quest complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_are_centred() {
        let positions: Vec<Vec2> = credit_positions().collect();
        assert_eq!(positions.len(), CREDITS.len());
        assert!(positions.iter().all(|p| p.x == GAME_WIDTH / 2.0));
        let middle = (positions[0].y + positions[9].y) / 2.0;
        assert!((middle - GAME_HEIGHT / 2.0).abs() < 1e-3);
        assert_eq!(positions[1].y - positions[0].y, LINE_SPACING);
    }
}
