// Main
mod content;
mod dialogue;
mod events;
mod flags;
mod follow;
mod motion;
mod player;
mod preload;
mod script;
mod sound;
mod stages;
mod transition;
mod ui;

use bevy::prelude::*;
use content::ContentPlugin;
use events::EventsPlugin;
use motion::MotionPlugin;
use player::PlayerPlugin;
use preload::PreloadPlugin;
use script::ScriptPlugin;
use sound::SoundPlugin;
use stages::StagesPlugin;
use transition::TransitionPlugin;
use ui::UiPlugin;

fn main() {
    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Co-op Mode".into(),
                        canvas: Some("#app".into()),
                        fit_canvas_to_parent: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        )
        .add_plugins((
            EventsPlugin,
            ContentPlugin,
            SoundPlugin,
            PreloadPlugin,
            ScriptPlugin,
            MotionPlugin,
            PlayerPlugin,
            TransitionPlugin,
            UiPlugin,
            StagesPlugin,
        ))
        .run();
}
