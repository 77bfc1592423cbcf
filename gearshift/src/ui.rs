use bevy::prelude::*;
use gearshift_core::{Control, Telemetry};

use crate::input::ControlButton;
use crate::{FrameSystems, LatestTelemetry};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_hud).add_systems(
            Update,
            (update_telemetry_text, update_game_over_banner, update_sound_label)
                .in_set(FrameSystems::Present),
        );
    }
}

#[derive(Component)]
struct TelemetryText;
#[derive(Component)]
struct GameOverBanner;
#[derive(Component)]
struct SoundButtonLabel;

const PANEL_BG: Color = Color::srgba(0.08, 0.08, 0.12, 0.85);
const BTN_BG: Color = Color::srgb(0.25, 0.25, 0.35);
const GAS_BG: Color = Color::srgb(0.15, 0.55, 0.2);
const BRAKE_BG: Color = Color::srgb(0.55, 0.15, 0.15);
const TEXT_COLOR: Color = Color::srgb(0.9, 0.9, 0.9);
const WARN_COLOR: Color = Color::srgb(1.0, 0.42, 0.42);

fn px(val: f32) -> Val {
    Val::Px(val)
}

fn text_font(size: f32) -> TextFont {
    TextFont {
        font_size: size,
        ..default()
    }
}

fn button_style() -> Node {
    Node {
        padding: UiRect::axes(px(12.0), px(10.0)),
        margin: UiRect::all(px(2.0)),
        justify_content: JustifyContent::Center,
        align_items: AlignItems::Center,
        flex_grow: 1.0,
        ..default()
    }
}

fn telemetry_line(telemetry: &Telemetry) -> String {
    format!(
        "Score {:.0}\nSpeed {:.0}\nGear {}/{}\nRPM {:.0}",
        telemetry.score, telemetry.speed, telemetry.gear, telemetry.max_gear, telemetry.rpm
    )
}

fn sound_label(enabled: bool) -> &'static str {
    if enabled { "Sound: on" } else { "Sound: off" }
}

fn setup_hud(mut commands: Commands, telemetry: Option<Res<LatestTelemetry>>) {
    let initial = telemetry.map(|telemetry| telemetry.0);

    commands.spawn((
        TelemetryText,
        Node {
            position_type: PositionType::Absolute,
            top: px(8.0),
            left: px(8.0),
            padding: UiRect::axes(px(8.0), px(4.0)),
            ..default()
        },
        BackgroundColor(PANEL_BG),
        Text::new(initial.as_ref().map(telemetry_line).unwrap_or_default()),
        text_font(16.0),
        TextColor(TEXT_COLOR),
    ));

    commands
        .spawn((
            GameOverBanner,
            Node {
                position_type: PositionType::Absolute,
                top: px(300.0),
                left: px(0.0),
                right: px(0.0),
                flex_direction: FlexDirection::Column,
                align_items: AlignItems::Center,
                padding: UiRect::all(px(12.0)),
                row_gap: px(6.0),
                ..default()
            },
            BackgroundColor(PANEL_BG),
            Visibility::Hidden,
        ))
        .with_children(|banner| {
            banner.spawn((Text::new("Game over"), text_font(32.0), TextColor(WARN_COLOR)));
            banner.spawn((
                Text::new("Press R or Enter to drive again"),
                text_font(16.0),
                TextColor(TEXT_COLOR),
            ));
        });

    let sound_on = initial.is_none_or(|telemetry| telemetry.sound_enabled);
    commands
        .spawn(Node {
            position_type: PositionType::Absolute,
            bottom: px(8.0),
            left: px(8.0),
            right: px(8.0),
            flex_direction: FlexDirection::Row,
            column_gap: px(6.0),
            ..default()
        })
        .with_children(|row| {
            let buttons = [
                (Control::Brake, "Brake", BRAKE_BG),
                (Control::GearDown, "Gear -", BTN_BG),
                (Control::ToggleSound, sound_label(sound_on), BTN_BG),
                (Control::GearUp, "Gear +", BTN_BG),
                (Control::Gas, "Gas", GAS_BG),
            ];
            for (control, label, color) in buttons {
                row.spawn((
                    Button,
                    ControlButton::new(control),
                    button_style(),
                    BackgroundColor(color),
                ))
                .with_children(|btn| {
                    let mut text =
                        btn.spawn((Text::new(label), text_font(14.0), TextColor(TEXT_COLOR)));
                    if control == Control::ToggleSound {
                        text.insert(SoundButtonLabel);
                    }
                });
            }
        });
}

fn update_telemetry_text(
    telemetry: Res<LatestTelemetry>,
    mut query: Query<&mut Text, With<TelemetryText>>,
) {
    if !telemetry.is_changed() {
        return;
    }
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    text.0 = telemetry_line(&telemetry.0);
}

fn update_game_over_banner(
    telemetry: Res<LatestTelemetry>,
    mut query: Query<&mut Visibility, With<GameOverBanner>>,
) {
    let Ok(mut visibility) = query.single_mut() else {
        return;
    };
    let wanted = if telemetry.0.game_over {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };
    visibility.set_if_neq(wanted);
}

fn update_sound_label(
    telemetry: Res<LatestTelemetry>,
    mut query: Query<&mut Text, With<SoundButtonLabel>>,
) {
    let label = sound_label(telemetry.0.sound_enabled);
    for mut text in &mut query {
        if text.0 != label {
            text.0 = label.to_string();
        }
    }
}
