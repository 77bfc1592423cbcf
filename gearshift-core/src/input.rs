//! Turns raw press/release events into one immutable [`Intent`] per tick.

/// Everything the player can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Gas,
    Brake,
    SteerLeft,
    SteerRight,
    GearUp,
    GearDown,
    ToggleSound,
    Restart,
}

impl Control {
    /// Held controls stay active between press and release; the rest fire once per press.
    pub fn is_held(self) -> bool {
        matches!(
            self,
            Control::Gas | Control::Brake | Control::SteerLeft | Control::SteerRight
        )
    }
}

/// Snapshot of player intent for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub gas: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub shift_up: bool,
    pub shift_down: bool,
    pub toggle_sound: bool,
    pub restart: bool,
}

impl Intent {
    /// Lateral direction: -1 left, 1 right, 0 when neither or both are held.
    pub fn steer_axis(&self) -> f32 {
        match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// Collects device events between ticks.
///
/// Held controls are tracked per source so a key and an on-screen button for the same
/// control do not release each other. Edge-triggered controls latch until the next
/// [`InputAdapter::snapshot`].
#[derive(Debug, Default)]
pub struct InputAdapter {
    held: [u8; 4],
    shift_up: u8,
    shift_down: u8,
    toggle_sound: bool,
    restart: bool,
}

impl InputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn held_slot(control: Control) -> Option<usize> {
        match control {
            Control::Gas => Some(0),
            Control::Brake => Some(1),
            Control::SteerLeft => Some(2),
            Control::SteerRight => Some(3),
            _ => None,
        }
    }

    pub fn press(&mut self, control: Control) {
        if let Some(slot) = Self::held_slot(control) {
            self.held[slot] = self.held[slot].saturating_add(1);
            return;
        }
        match control {
            Control::GearUp => self.shift_up = self.shift_up.saturating_add(1),
            Control::GearDown => self.shift_down = self.shift_down.saturating_add(1),
            // Two toggles in one frame cancel out.
            Control::ToggleSound => self.toggle_sound = !self.toggle_sound,
            Control::Restart => self.restart = true,
            _ => {}
        }
    }

    /// Releasing an edge-triggered control is a no-op.
    pub fn release(&mut self, control: Control) {
        if let Some(slot) = Self::held_slot(control) {
            self.held[slot] = self.held[slot].saturating_sub(1);
        }
    }

    /// Drop every held control, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held = [0; 4];
    }

    pub fn is_held(&self, control: Control) -> bool {
        Self::held_slot(control).is_some_and(|slot| self.held[slot] > 0)
    }

    /// Take the intent for this tick, consuming one pending shift in each direction.
    ///
    /// Shifts pressed faster than the frame rate are delivered on following ticks
    /// so every press still moves the gear by exactly one.
    pub fn snapshot(&mut self) -> Intent {
        let intent = Intent {
            gas: self.held[0] > 0,
            brake: self.held[1] > 0,
            left: self.held[2] > 0,
            right: self.held[3] > 0,
            shift_up: self.shift_up > 0,
            shift_down: self.shift_down > 0,
            toggle_sound: self.toggle_sound,
            restart: self.restart,
        };
        self.shift_up = self.shift_up.saturating_sub(1);
        self.shift_down = self.shift_down.saturating_sub(1);
        self.toggle_sound = false;
        self.restart = false;
        intent
    }
}
