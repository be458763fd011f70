use std::collections::{HashMap, HashSet};
use std::fmt;

use glam::Vec2;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }

    pub const fn named(key: NamedKey) -> Self {
        Self::Named(key)
    }

    pub const fn character(ch: char) -> Self {
        Self::Character(ch)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(key) => write!(f, "{key:?}"),
            Self::Character(ch) => write!(f, "{ch}"),
            Self::Digit(digit) => write!(f, "{digit}"),
            Self::Function(index) => write!(f, "F{index}"),
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "Home" => Home,
        "End" => End,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        "LeftAlt" | "LAlt" => LeftAlt,
        "RightAlt" | "RAlt" => RightAlt,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-character keys the window reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    Home,
    End,
    PageUp,
    PageDown,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Window-system independent input delivered to the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    MousePressed(MouseButton),
    MouseReleased(MouseButton),
    /// Cursor position in window pixels.
    CursorMoved(Vec2),
    /// Vertical wheel offset; positive is away from the user.
    Scrolled(f32),
    Resized { width: u32, height: u32 },
}

/// Held keys, held buttons and the cursor.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    mouse_buttons: HashSet<MouseButton>,
    mouse_position: Vec2,
    clicked_point: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn set_mouse_button_down(&mut self, button: MouseButton) {
        self.mouse_buttons.insert(button);
    }

    pub fn set_mouse_button_up(&mut self, button: MouseButton) {
        self.mouse_buttons.remove(&button);
    }

    pub fn set_mouse_position(&mut self, position: Vec2) {
        self.mouse_position = position;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    pub fn is_ctrl_down(&self) -> bool {
        self.is_key_down(KeyCode::Named(NamedKey::LeftCtrl))
            || self.is_key_down(KeyCode::Named(NamedKey::RightCtrl))
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Reference point of the current drag, in whole pixels.
    pub fn clicked_point(&self) -> Vec2 {
        self.clicked_point
    }

    pub fn set_clicked_point(&mut self, point: Vec2) {
        self.clicked_point = point.round();
    }
}

/// Action triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    ResetCameras,
    ReplayVideo,
    ToggleLight,
    ToggleSlideMode,
    Quit,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::MoveForward,
        Command::MoveBackward,
        Command::MoveLeft,
        Command::MoveRight,
        Command::MoveUp,
        Command::MoveDown,
        Command::ResetCameras,
        Command::ReplayVideo,
        Command::ToggleLight,
        Command::ToggleSlideMode,
        Command::Quit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MoveForward => "move_forward",
            Self::MoveBackward => "move_backward",
            Self::MoveLeft => "move_left",
            Self::MoveRight => "move_right",
            Self::MoveUp => "move_up",
            Self::MoveDown => "move_down",
            Self::ResetCameras => "reset_cameras",
            Self::ReplayVideo => "replay_video",
            Self::ToggleLight => "toggle_light",
            Self::ToggleSlideMode => "toggle_slide_mode",
            Self::Quit => "quit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

/// Mapping from keys to commands. Several keys may share a command.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, Command>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use NamedKey::*;
        let bindings = [
            (KeyCode::Named(Up), Command::MoveForward),
            (KeyCode::Named(Down), Command::MoveBackward),
            (KeyCode::Named(Left), Command::MoveLeft),
            (KeyCode::Named(Right), Command::MoveRight),
            (KeyCode::Character('W'), Command::MoveUp),
            (KeyCode::Character('S'), Command::MoveDown),
            (KeyCode::Character('I'), Command::ResetCameras),
            (KeyCode::Character('R'), Command::ReplayVideo),
            (KeyCode::Character('L'), Command::ToggleLight),
            (KeyCode::Named(Enter), Command::ToggleSlideMode),
            (KeyCode::Character('Q'), Command::Quit),
            (KeyCode::Named(Escape), Command::Quit),
        ];
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }
}

impl KeyBindings {
    /// Binds `key` to `command`, replacing any previous binding of that key.
    pub fn bind(&mut self, key: KeyCode, command: Command) {
        self.bindings.insert(key, command);
    }

    pub fn command_for(&self, key: KeyCode) -> Option<Command> {
        self.bindings.get(&key).copied()
    }

    pub fn keys_for(&self, command: Command) -> Vec<KeyCode> {
        let mut keys: Vec<KeyCode> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == command)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Enter"),
            Some(KeyCode::Named(NamedKey::Enter))
        );
        assert_eq!(KeyCode::from_name("l"), Some(KeyCode::Character('L')));
        assert_eq!(KeyCode::from_name("F12"), Some(KeyCode::Function(12)));
        assert_eq!(KeyCode::from_name("7"), Some(KeyCode::Digit(7)));
        assert_eq!(KeyCode::from_name("Hyper"), None);
    }

    #[test]
    fn input_state_tracks_keys_and_buttons() {
        let mut state = InputState::new();
        state.set_key_down(KeyCode::Named(NamedKey::LeftCtrl));
        assert!(state.is_ctrl_down());
        state.set_key_up(KeyCode::Named(NamedKey::LeftCtrl));
        assert!(!state.is_ctrl_down());

        state.set_mouse_button_down(MouseButton::RIGHT);
        assert!(state.is_mouse_button_down(MouseButton::RIGHT));
        assert!(!state.is_mouse_button_down(MouseButton::LEFT));
    }

    #[test]
    fn clicked_point_is_rounded() {
        let mut state = InputState::new();
        state.set_clicked_point(Vec2::new(10.4, 20.6));
        assert_eq!(state.clicked_point(), Vec2::new(10.0, 21.0));
    }

    #[test]
    fn default_bindings_cover_the_control_table() {
        let bindings = KeyBindings::default();
        assert_eq!(
            bindings.command_for(KeyCode::Named(NamedKey::Up)),
            Some(Command::MoveForward)
        );
        assert_eq!(
            bindings.command_for(KeyCode::Character('L')),
            Some(Command::ToggleLight)
        );
        assert_eq!(
            bindings.keys_for(Command::Quit),
            vec![KeyCode::Named(NamedKey::Escape), KeyCode::Character('Q')]
        );
        assert_eq!(bindings.command_for(KeyCode::Character('Z')), None);
    }

    #[test]
    fn binding_a_key_overrides_only_that_key() {
        let mut bindings = KeyBindings::default();
        bindings.bind(KeyCode::Character('Q'), Command::ToggleLight);
        assert_eq!(
            bindings.command_for(KeyCode::Character('Q')),
            Some(Command::ToggleLight)
        );
        assert_eq!(
            bindings.keys_for(Command::Quit),
            vec![KeyCode::Named(NamedKey::Escape)]
        );
    }

    #[test]
    fn command_names_round_trip() {
        for command in Command::ALL {
            assert_eq!(Command::from_name(command.name()), Some(command));
        }
        assert_eq!(Command::from_name("fly"), None);
    }
}
