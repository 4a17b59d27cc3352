// Messages passed between the world stages and the overlay.
use bevy::prelude::*;

use crate::dialogue::DialogueLine;
use crate::script::{CueFired, StageCue};

pub struct EventsPlugin;

impl Plugin for EventsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<HeartProgress>()
            .add_message::<UiDialogue>()
            .add_message::<UiMessage>()
            .add_message::<MobileActionPressed>()
            .add_message::<PointerTap>()
            .add_message::<CueFired>();
    }
}

/// Heart meter fill in `[0, 1]`.
#[derive(Message, Debug, Clone, Copy)]
pub struct HeartProgress(pub f32);

/// Ask the overlay to run a dialogue. `on_complete` comes back as a `CueFired`.
#[derive(Message, Debug, Clone)]
pub struct UiDialogue {
    pub lines: Vec<DialogueLine>,
    pub on_complete: Option<StageCue>,
}

pub const MESSAGE_DURATION_MS: u64 = 6600;

/// A timed one-line message in the overlay panel.
#[derive(Message, Debug, Clone)]
pub struct UiMessage {
    pub text: String,
    pub duration_ms: u64,
}

impl UiMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self::lasting(text, MESSAGE_DURATION_MS)
    }

    pub fn lasting(text: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text: text.into(),
            duration_ms,
        }
    }
}

#[derive(Message, Debug, Clone, Copy)]
pub struct MobileActionPressed;

/// A click or tap that landed in the world, in stage coordinates.
#[derive(Message, Debug, Clone, Copy)]
pub struct PointerTap(pub Vec2);
