// Overlay: camera, heart meter, dialogue/message panel and touch controls.

use std::time::Duration;

use bevy::camera::ScalingMode;
use bevy::prelude::*;

use crate::dialogue::{Advance, DialogueRunner, TextSurface};
use crate::events::{HeartProgress, MobileActionPressed, PointerTap, UiDialogue, UiMessage};
use crate::motion::{GAME_HEIGHT, GAME_WIDTH, to_stage};
use crate::player::TouchInput;
use crate::script::CueFired;
use crate::sound::{CueOptions, SoundKey, SoundSystem};
use crate::stages::{WorldSet, hex_color, hex_color_alpha};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DialogueRunner>()
            .init_resource::<TextSurface>()
            .init_resource::<Overlay>()
            .add_systems(Startup, (spawn_camera, spawn_overlay))
            .add_systems(
                Update,
                (
                    (
                        advance_dialogue,
                        receive_dialogue,
                        receive_messages,
                        expire_message,
                        update_heart,
                        show_panel,
                    )
                        .chain(),
                    (touch_buttons, show_touch_controls, emit_taps),
                )
                    .before(WorldSet::Cues),
            );
    }
}

const HEART_BAR_WIDTH: f32 = 120.0;
const HEART_BAR_HEIGHT: f32 = 10.0;
const HEART_MIN_FILL: f32 = 2.0;
const HEART_COLOR: u32 = 0xf5b5c8;
const HEART_TRACK: u32 = 0x1f2433;

const PANEL_HEIGHT: f32 = 68.0;
const PANEL_FILL: u32 = 0x0f1218;
const PANEL_BORDER: u32 = 0xefe7d7;
const PANEL_Z: i32 = 10;

/// Narrower windows get the on-screen d-pad from the start.
const TOUCH_LAYOUT_WIDTH: f32 = 768.0;
const TOUCH_BUTTON: f32 = 48.0;

#[derive(Resource, Debug, Default)]
pub struct Overlay {
    message_timer: Option<Timer>,
    touched: bool,
}

#[derive(Component)]
struct HeartFill;

#[derive(Component)]
struct Panel;

#[derive(Component)]
struct PanelText;

#[derive(Component)]
struct TouchControls;

#[derive(Component, Debug, Clone, Copy)]
enum TouchButton {
    Pad(Vec2),
    Action,
}

/// Width of the heart meter fill for a progress value.
pub fn heart_fill_width(progress: f32) -> f32 {
    (HEART_BAR_WIDTH * progress.clamp(0.0, 1.0)).max(HEART_MIN_FILL)
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        Projection::Orthographic(OrthographicProjection {
            scaling_mode: ScalingMode::AutoMin {
                min_width: GAME_WIDTH,
                min_height: GAME_HEIGHT,
            },
            ..OrthographicProjection::default_2d()
        }),
    ));
}

fn spawn_overlay(mut commands: Commands) {
    // Heart meter, top left.
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(10.0),
                column_gap: Val::Px(8.0),
                align_items: AlignItems::Center,
                ..default()
            },
            GlobalZIndex(PANEL_Z),
            Pickable::IGNORE,
        ))
        .with_children(|meter| {
            meter.spawn((
                Text::new("<3"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(hex_color(HEART_COLOR)),
            ));
            meter
                .spawn((
                    Node {
                        width: Val::Px(HEART_BAR_WIDTH),
                        height: Val::Px(HEART_BAR_HEIGHT),
                        ..default()
                    },
                    BackgroundColor(hex_color(HEART_TRACK)),
                ))
                .with_children(|track| {
                    track.spawn((
                        HeartFill,
                        Node {
                            width: Val::Px(heart_fill_width(0.0)),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        BackgroundColor(hex_color(HEART_COLOR)),
                    ));
                });
        });

    // Message and dialogue panel along the bottom.
    commands
        .spawn((
            Panel,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                right: Val::Px(12.0),
                bottom: Val::Px(12.0),
                height: Val::Px(PANEL_HEIGHT),
                padding: UiRect::axes(Val::Px(14.0), Val::Px(10.0)),
                border: UiRect::all(Val::Px(1.0)),
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(hex_color_alpha(PANEL_FILL, 0.72)),
            BorderColor::all(hex_color_alpha(PANEL_BORDER, 0.35)),
            GlobalZIndex(PANEL_Z),
            Visibility::Hidden,
            Pickable::IGNORE,
        ))
        .with_children(|panel| {
            panel.spawn((
                PanelText,
                Text::new(""),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(hex_color(PANEL_BORDER)),
            ));
        });

    // Touch controls, shown on small screens or after the first touch.
    commands
        .spawn((
            TouchControls,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                right: Val::Px(12.0),
                bottom: Val::Px(PANEL_HEIGHT + 24.0),
                justify_content: JustifyContent::SpaceBetween,
                align_items: AlignItems::End,
                ..default()
            },
            GlobalZIndex(PANEL_Z + 1),
            Visibility::Hidden,
        ))
        .with_children(|controls| {
            controls
                .spawn(Node {
                    display: Display::Grid,
                    grid_template_columns: RepeatedGridTrack::px(3, TOUCH_BUTTON),
                    grid_template_rows: RepeatedGridTrack::px(3, TOUCH_BUTTON),
                    ..default()
                })
                .with_children(|pad| {
                    // Stage space points down, so "up" is negative y.
                    let arrows = [
                        ("^", 2, 1, Vec2::new(0.0, -1.0)),
                        ("<", 1, 2, Vec2::new(-1.0, 0.0)),
                        (">", 3, 2, Vec2::new(1.0, 0.0)),
                        ("v", 2, 3, Vec2::new(0.0, 1.0)),
                    ];
                    for (label, column, row, direction) in arrows {
                        spawn_touch_button(pad, label, TouchButton::Pad(direction), column, row);
                    }
                });
            spawn_touch_button(controls, "E", TouchButton::Action, 1, 1);
        });
}

fn spawn_touch_button(
    parent: &mut ChildSpawnerCommands,
    label: &str,
    button: TouchButton,
    column: i16,
    row: i16,
) {
    parent
        .spawn((
            button,
            Button,
            Node {
                width: Val::Px(TOUCH_BUTTON),
                height: Val::Px(TOUCH_BUTTON),
                grid_column: GridPlacement::start(column),
                grid_row: GridPlacement::start(row),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(hex_color_alpha(PANEL_FILL, 0.6)),
            BorderColor::all(hex_color_alpha(PANEL_BORDER, 0.35)),
        ))
        .with_children(|button| {
            button.spawn((
                Text::new(label),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(hex_color(PANEL_BORDER)),
            ));
        });
}

fn receive_dialogue(
    mut requests: MessageReader<UiDialogue>,
    mut runner: ResMut<DialogueRunner>,
    mut surface: ResMut<TextSurface>,
    mut overlay: ResMut<Overlay>,
    mut sounds: ResMut<SoundSystem>,
) {
    for request in requests.read() {
        if runner.is_active() {
            debug!("dialogue already running, request dropped");
            continue;
        }
        runner.start(request.lines.clone(), request.on_complete, &mut surface);
        overlay.message_timer = None;
        sounds.play(SoundKey::MessageAppear, CueOptions::default());
    }
}

fn receive_messages(
    mut requests: MessageReader<UiMessage>,
    runner: Res<DialogueRunner>,
    mut surface: ResMut<TextSurface>,
    mut overlay: ResMut<Overlay>,
    mut sounds: ResMut<SoundSystem>,
) {
    for message in requests.read() {
        // Dialogue owns the panel until it ends.
        if runner.is_active() {
            continue;
        }
        surface.show(message.text.clone());
        overlay.message_timer = Some(Timer::new(
            Duration::from_millis(message.duration_ms),
            TimerMode::Once,
        ));
        sounds.play(SoundKey::MessageAppear, CueOptions::default());
    }
}

fn expire_message(
    time: Res<Time>,
    runner: Res<DialogueRunner>,
    mut surface: ResMut<TextSurface>,
    mut overlay: ResMut<Overlay>,
) {
    let Some(timer) = overlay.message_timer.as_mut() else {
        return;
    };
    timer.tick(time.delta());
    if !timer.is_finished() {
        return;
    }
    overlay.message_timer = None;
    if !runner.is_active() {
        surface.hide();
    }
}

fn advance_dialogue(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    mut runner: ResMut<DialogueRunner>,
    mut surface: ResMut<TextSurface>,
    mut sounds: ResMut<SoundSystem>,
    mut cues: MessageWriter<CueFired>,
) {
    if !runner.is_active() {
        return;
    }
    let pressed = keyboard.any_just_pressed([KeyCode::Space, KeyCode::Enter])
        || mouse.just_pressed(MouseButton::Left)
        || touches.any_just_pressed();
    if !pressed {
        return;
    }
    sounds.play(SoundKey::DialogueAdvance, CueOptions::default());
    if let Advance::Finished(Some(cue)) = runner.advance(&mut surface) {
        cues.write(CueFired(cue));
    }
}

fn update_heart(
    mut progress: MessageReader<HeartProgress>,
    mut sounds: ResMut<SoundSystem>,
    mut fill: Query<&mut Node, With<HeartFill>>,
) {
    let Some(&HeartProgress(value)) = progress.read().last() else {
        return;
    };
    if let Ok(mut node) = fill.single_mut() {
        node.width = Val::Px(heart_fill_width(value));
    }
    sounds.play(SoundKey::HeartProgress, CueOptions::default());
}

fn show_panel(
    surface: Res<TextSurface>,
    mut panel: Query<&mut Visibility, With<Panel>>,
    mut text: Query<&mut Text, With<PanelText>>,
) {
    if !surface.is_changed() {
        return;
    }
    if let Ok(mut text) = text.single_mut() {
        text.0 = surface.text().to_string();
    }
    if let Ok(mut visibility) = panel.single_mut() {
        *visibility = if surface.is_visible() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

fn touch_buttons(
    buttons: Query<(Ref<Interaction>, &TouchButton)>,
    mut touch: ResMut<TouchInput>,
    mut actions: MessageWriter<MobileActionPressed>,
) {
    let mut direction = Vec2::ZERO;
    for (interaction, button) in &buttons {
        let pressed = *interaction == Interaction::Pressed;
        match button {
            TouchButton::Pad(towards) if pressed => direction += *towards,
            TouchButton::Action if pressed && interaction.is_changed() => {
                actions.write(MobileActionPressed);
            }
            _ => {}
        }
    }
    touch.x = direction.x;
    touch.y = direction.y;
}

fn show_touch_controls(
    windows: Query<&Window>,
    touches: Res<Touches>,
    mut overlay: ResMut<Overlay>,
    mut controls: Query<&mut Visibility, With<TouchControls>>,
) {
    if touches.any_just_pressed() && !overlay.touched {
        overlay.touched = true;
        info!("touch input detected");
    }
    let narrow = windows
        .iter()
        .next()
        .is_some_and(|window| window.width() < TOUCH_LAYOUT_WIDTH);
    let show = narrow || overlay.touched;
    for mut visibility in &mut controls {
        visibility.set_if_neq(if show {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        });
    }
}

/// Clicks and taps in the world, converted to stage space.
fn emit_taps(
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    mut taps: MessageWriter<PointerTap>,
) {
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let mut screen: Vec<Vec2> = touches.iter_just_pressed().map(|t| t.position()).collect();
    if mouse.just_pressed(MouseButton::Left) {
        screen.extend(windows.iter().filter_map(Window::cursor_position));
    }
    for at in screen {
        if let Ok(world) = camera.viewport_to_world_2d(camera_transform, at) {
            taps.write(PointerTap(to_stage(world)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::DialogueLine;
    use crate::events::EventsPlugin;
    use crate::script::StageCue;
    use crate::sound::SoundPlugin;
    use bevy::time::TimeUpdateStrategy;

    #[test]
    fn heart_fill_has_a_sliver_at_zero() {
        assert_eq!(heart_fill_width(0.0), HEART_MIN_FILL);
        assert_eq!(heart_fill_width(0.5), 60.0);
        assert_eq!(heart_fill_width(3.0), HEART_BAR_WIDTH);
        assert_eq!(heart_fill_width(-1.0), HEART_MIN_FILL);
    }

    fn overlay_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, EventsPlugin, SoundPlugin))
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(
                100,
            )))
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<ButtonInput<MouseButton>>()
            .init_resource::<Touches>()
            .init_resource::<DialogueRunner>()
            .init_resource::<TextSurface>()
            .init_resource::<Overlay>()
            .add_systems(
                Update,
                (
                    advance_dialogue,
                    receive_dialogue,
                    receive_messages,
                    expire_message,
                )
                    .chain(),
            );
        app
    }

    fn press(app: &mut App, key: KeyCode) {
        let mut keyboard = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        keyboard.clear();
        keyboard.press(key);
    }

    fn release(app: &mut App, key: KeyCode) {
        let mut keyboard = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        keyboard.release(key);
        keyboard.clear();
    }

    #[test]
    fn message_hides_after_its_duration() {
        let mut app = overlay_app();
        app.world_mut().write_message(UiMessage::lasting("hello", 250));
        app.update();
        let surface = app.world().resource::<TextSurface>();
        assert!(surface.is_visible());
        assert_eq!(surface.text(), "hello");

        for _ in 0..4 {
            app.update();
        }
        assert!(!app.world().resource::<TextSurface>().is_visible());
    }

    #[test]
    fn dialogue_blocks_messages_and_reports_completion() {
        let mut app = overlay_app();
        app.world_mut().write_message(UiDialogue {
            lines: vec![DialogueLine::said("Jon", "Hi"), DialogueLine::said("Bianca", "Hey")],
            on_complete: Some(StageCue::PrologueMet),
        });
        app.update();
        assert_eq!(app.world().resource::<TextSurface>().text(), "Jon: Hi");

        app.world_mut().write_message(UiMessage::new("ignored"));
        app.update();
        assert_eq!(app.world().resource::<TextSurface>().text(), "Jon: Hi");

        press(&mut app, KeyCode::Space);
        app.update();
        release(&mut app, KeyCode::Space);
        assert_eq!(app.world().resource::<TextSurface>().text(), "Bianca: Hey");

        press(&mut app, KeyCode::Enter);
        app.update();
        release(&mut app, KeyCode::Enter);
        assert!(!app.world().resource::<TextSurface>().is_visible());
        assert!(!app.world().resource::<DialogueRunner>().is_active());

        let messages = app.world().resource::<Messages<CueFired>>();
        let mut cursor = messages.get_cursor();
        let fired: Vec<CueFired> = cursor.read(messages).copied().collect();
        assert_eq!(fired, vec![CueFired(StageCue::PrologueMet)]);
    }

    #[test]
    fn held_action_button_fires_once() {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, EventsPlugin))
            .init_resource::<TouchInput>()
            .add_systems(Update, touch_buttons);
        app.world_mut()
            .spawn((TouchButton::Action, Interaction::Pressed));
        app.world_mut()
            .spawn((TouchButton::Pad(Vec2::X), Interaction::Pressed));

        app.update();
        app.update();

        let touch = *app.world().resource::<TouchInput>();
        assert_eq!((touch.x, touch.y), (1.0, 0.0));
        let messages = app.world().resource::<Messages<MobileActionPressed>>();
        let mut cursor = messages.get_cursor();
        assert_eq!(cursor.read(messages).count(), 1);
    }
}
