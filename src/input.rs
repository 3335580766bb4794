//! Pointer and keyboard state for experiments.
//!
//! `Input` tracks instantaneous events (pressed this frame) and continuous
//! state (held), plus the normalized pointer used for all ray picking.
//!
//! # Pointer convention
//!
//! The pointer is normalized against the rendering surface's rectangle, not
//! the window, so it stays stable when the surface is offset:
//!
//! ```text
//! x = ((cx - ox) / W) * 2 - 1
//! y = -((cy - oy) / H) * 2 + 1
//! ```
//!
//! The surface's top-left corner maps to `(-1, 1)` and its bottom-right
//! corner to `(1, -1)`.

use glam::Vec2;
use std::collections::HashSet;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn from_winit(btn: WinitMouseButton) -> Option<Self> {
        match btn {
            WinitMouseButton::Left => Some(MouseButton::Left),
            WinitMouseButton::Right => Some(MouseButton::Right),
            WinitMouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Keys the experiments bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Up, Down, Left, Right,

    Space, Enter, Escape, Tab, Backspace,
    Shift, Control, Alt,

    Other(u32),
}

impl From<WinitKeyCode> for KeyCode {
    fn from(key: WinitKeyCode) -> Self {
        use WinitKeyCode as W;
        match key {
            W::KeyA => KeyCode::A,
            W::KeyB => KeyCode::B,
            W::KeyC => KeyCode::C,
            W::KeyD => KeyCode::D,
            W::KeyE => KeyCode::E,
            W::KeyF => KeyCode::F,
            W::KeyG => KeyCode::G,
            W::KeyH => KeyCode::H,
            W::KeyI => KeyCode::I,
            W::KeyJ => KeyCode::J,
            W::KeyK => KeyCode::K,
            W::KeyL => KeyCode::L,
            W::KeyM => KeyCode::M,
            W::KeyN => KeyCode::N,
            W::KeyO => KeyCode::O,
            W::KeyP => KeyCode::P,
            W::KeyQ => KeyCode::Q,
            W::KeyR => KeyCode::R,
            W::KeyS => KeyCode::S,
            W::KeyT => KeyCode::T,
            W::KeyU => KeyCode::U,
            W::KeyV => KeyCode::V,
            W::KeyW => KeyCode::W,
            W::KeyX => KeyCode::X,
            W::KeyY => KeyCode::Y,
            W::KeyZ => KeyCode::Z,

            W::ArrowUp => KeyCode::Up,
            W::ArrowDown => KeyCode::Down,
            W::ArrowLeft => KeyCode::Left,
            W::ArrowRight => KeyCode::Right,

            W::Space => KeyCode::Space,
            W::Enter => KeyCode::Enter,
            W::Escape => KeyCode::Escape,
            W::Tab => KeyCode::Tab,
            W::Backspace => KeyCode::Backspace,
            W::ShiftLeft | W::ShiftRight => KeyCode::Shift,
            W::ControlLeft | W::ControlRight => KeyCode::Control,
            W::AltLeft | W::AltRight => KeyCode::Alt,

            _ => KeyCode::Other(key as u32),
        }
    }
}

/// Bounding rectangle of the rendering surface in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalize a client-space position, or `None` for an empty rectangle.
    pub fn normalize(&self, client: Vec2) -> Option<Vec2> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(Vec2::new(
            ((client.x - self.x) / self.width) * 2.0 - 1.0,
            -((client.y - self.y) / self.height) * 2.0 + 1.0,
        ))
    }
}

/// Discrete input events an experiment reacts to, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { button: MouseButton, pointer: Vec2 },
    KeyDown(KeyCode),
}

/// Input state tracking for keyboard and mouse.
#[derive(Debug, Default)]
pub struct Input {
    keys_held: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,

    mouse_held: HashSet<MouseButton>,
    mouse_pressed: HashSet<MouseButton>,
    mouse_released: HashSet<MouseButton>,

    mouse_position: Option<Vec2>,
    mouse_delta: Vec2,
    pointer: Vec2,
    scroll_delta: f32,

    surface: SurfaceRect,
    events: Vec<InputEvent>,
}

impl Input {
    pub fn new(surface: SurfaceRect) -> Self {
        Self {
            surface,
            ..Default::default()
        }
    }

    // ========== Key Queries ==========

    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    // ========== Mouse Queries ==========

    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_pressed.contains(&button)
    }

    pub fn mouse_held(&self, button: MouseButton) -> bool {
        self.mouse_held.contains(&button)
    }

    pub fn mouse_released(&self, button: MouseButton) -> bool {
        self.mouse_released.contains(&button)
    }

    /// Last cursor position in client pixels.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position.unwrap_or_default()
    }

    /// Cursor movement this frame in pixels.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Pointer normalized to `[-1, 1]` on both axes, Y up.
    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    /// Wheel motion this frame. Positive is up/away from the user.
    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    pub fn surface(&self) -> SurfaceRect {
        self.surface
    }

    // ========== Updates ==========

    /// Replace the surface rectangle, re-normalizing the current pointer.
    pub fn set_surface_rect(&mut self, surface: SurfaceRect) {
        self.surface = surface;
        if let Some(pos) = self.mouse_position {
            self.move_pointer(pos);
        }
    }

    /// Record a cursor move to `client` pixel coordinates.
    pub fn move_pointer(&mut self, client: Vec2) {
        if let Some(last) = self.mouse_position {
            self.mouse_delta += client - last;
        }
        self.mouse_position = Some(client);
        if let Some(ndc) = self.surface.normalize(client) {
            self.pointer = ndc;
        }
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.mouse_pressed.insert(button);
        self.mouse_held.insert(button);
        self.events.push(InputEvent::PointerDown {
            button,
            pointer: self.pointer,
        });
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.mouse_held.remove(&button);
        self.mouse_released.insert(button);
    }

    pub fn press_key(&mut self, key: KeyCode) {
        // no repeat events while held
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
            self.events.push(InputEvent::KeyDown(key));
        }
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
        self.keys_released.insert(key);
    }

    pub fn scroll(&mut self, amount: f32) {
        self.scroll_delta += amount;
    }

    /// Take the discrete events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Clear per-frame state. Called after each rendered frame.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_pressed.clear();
        self.mouse_released.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    let key = KeyCode::from(code);
                    match event.state {
                        ElementState::Pressed => self.press_key(key),
                        ElementState::Released => self.release_key(key),
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(btn) = MouseButton::from_winit(*button) {
                    match state {
                        ElementState::Pressed => self.press_button(btn),
                        ElementState::Released => self.release_button(btn),
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.move_pointer(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.mouse_held.clear();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll(match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut input = Input::default();
        assert!(!input.key_held(KeyCode::Space));

        input.press_key(KeyCode::Space);
        assert!(input.key_held(KeyCode::Space));
        assert!(input.key_pressed(KeyCode::Space));

        // After end_frame, pressed is cleared but held remains
        input.end_frame();
        assert!(input.key_held(KeyCode::Space));
        assert!(!input.key_pressed(KeyCode::Space));

        // holding does not repeat
        input.press_key(KeyCode::Space);
        assert!(!input.key_pressed(KeyCode::Space));
        assert_eq!(input.drain_events(), vec![InputEvent::KeyDown(KeyCode::Space)]);
    }

    #[test]
    fn test_pointer_center_is_origin() {
        let mut input = Input::new(SurfaceRect::new(0.0, 0.0, 800.0, 600.0));
        input.move_pointer(Vec2::new(400.0, 300.0));
        assert!(input.pointer().length() < 1e-6);
    }

    #[test]
    fn test_mouse_delta_accumulates_within_frame() {
        let mut input = Input::new(SurfaceRect::new(0.0, 0.0, 100.0, 100.0));
        input.move_pointer(Vec2::new(10.0, 10.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        input.move_pointer(Vec2::new(15.0, 10.0));
        input.move_pointer(Vec2::new(20.0, 12.0));
        assert_eq!(input.mouse_delta(), Vec2::new(10.0, 2.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn test_empty_surface_keeps_pointer() {
        let mut input = Input::new(SurfaceRect::new(0.0, 0.0, 100.0, 100.0));
        input.move_pointer(Vec2::new(100.0, 0.0));
        input.set_surface_rect(SurfaceRect::default());
        input.move_pointer(Vec2::new(0.0, 100.0));
        assert_eq!(input.pointer(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_pointer_down_records_pointer() {
        let mut input = Input::new(SurfaceRect::new(0.0, 0.0, 200.0, 100.0));
        input.move_pointer(Vec2::new(200.0, 100.0));
        input.press_button(MouseButton::Right);
        assert_eq!(
            input.drain_events(),
            vec![InputEvent::PointerDown {
                button: MouseButton::Right,
                pointer: Vec2::new(1.0, -1.0),
            }]
        );
        assert!(input.drain_events().is_empty());
    }
}
