use bevy::{prelude::*, window::WindowFocused};
use gearshift_core::Control;

use crate::{FrameSystems, PlayerInput};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (release_on_focus_loss, read_keyboard, read_control_buttons)
                .chain()
                .in_set(FrameSystems::Input),
        );
    }
}

/// On-screen button bound to a control.
#[derive(Component)]
pub struct ControlButton {
    pub control: Control,
    held: bool,
}

impl ControlButton {
    pub fn new(control: Control) -> Self {
        Self {
            control,
            held: false,
        }
    }
}

fn control_for_key(key: KeyCode) -> Option<Control> {
    let control = match key {
        KeyCode::KeyW | KeyCode::ArrowUp => Control::Gas,
        KeyCode::KeyS | KeyCode::ArrowDown => Control::Brake,
        KeyCode::KeyA | KeyCode::ArrowLeft => Control::SteerLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => Control::SteerRight,
        KeyCode::KeyE => Control::GearUp,
        KeyCode::KeyQ => Control::GearDown,
        KeyCode::KeyM => Control::ToggleSound,
        KeyCode::KeyR | KeyCode::Enter | KeyCode::NumpadEnter => Control::Restart,
        _ => return None,
    };
    Some(control)
}

fn read_keyboard(keyboard: Res<ButtonInput<KeyCode>>, mut input: ResMut<PlayerInput>) {
    for key in keyboard.get_just_pressed() {
        if let Some(control) = control_for_key(*key) {
            input.0.press(control);
        }
    }
    for key in keyboard.get_just_released() {
        if let Some(control) = control_for_key(*key) {
            input.0.release(control);
        }
    }
}

fn read_control_buttons(
    mut query: Query<(&Interaction, &mut ControlButton), Changed<Interaction>>,
    mut input: ResMut<PlayerInput>,
) {
    for (interaction, mut button) in &mut query {
        let pressed = *interaction == Interaction::Pressed;
        if pressed && !button.held {
            input.0.press(button.control);
        } else if !pressed && button.held {
            input.0.release(button.control);
        }
        // Edge-triggered controls fire on press and never stay held.
        button.held = pressed && button.control.is_held();
    }
}

/// Keys released while the window is unfocused never report, so drop everything held.
fn release_on_focus_loss(
    mut focus_events: MessageReader<WindowFocused>,
    mut input: ResMut<PlayerInput>,
    mut buttons: Query<&mut ControlButton>,
) {
    if focus_events.read().any(|event| !event.focused) {
        input.0.release_all();
        for mut button in &mut buttons {
            button.held = false;
        }
    }
}
