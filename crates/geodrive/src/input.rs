//! Keyboard input mapped to logical actions.
//!
//! Keys are identified by their physical key code string (`"KeyW"`,
//! `"ArrowUp"`, `"Space"`, ...). Held actions stay pressed while any bound key
//! is down. One-shot actions pulse `true` on the first key-down of a press and
//! are cleared by [`InputManager::end_frame`], so each physical press yields
//! exactly one pulse regardless of auto-repeat or how long the key is held.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Logical actions the simulation reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Throttle,
    Brake,
    TurnLeft,
    TurnRight,
    Climb,
    Descend,
    RollLeft,
    RollRight,
    /// Swap between the ground vehicle and the aircraft.
    ToggleRoverMode,
    /// Switch the ground vehicle between ground-following and free mode.
    ToggleGroundFollowing,
    SwitchCamera,
    ToggleCollision,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::Throttle,
        Action::Brake,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Climb,
        Action::Descend,
        Action::RollLeft,
        Action::RollRight,
        Action::ToggleRoverMode,
        Action::ToggleGroundFollowing,
        Action::SwitchCamera,
        Action::ToggleCollision,
    ];

    /// Stable camelCase name.
    pub fn name(self) -> &'static str {
        match self {
            Action::Throttle => "throttle",
            Action::Brake => "brake",
            Action::TurnLeft => "turnLeft",
            Action::TurnRight => "turnRight",
            Action::Climb => "climb",
            Action::Descend => "descend",
            Action::RollLeft => "rollLeft",
            Action::RollRight => "rollRight",
            Action::ToggleRoverMode => "toggleRoverMode",
            Action::ToggleGroundFollowing => "toggleGroundFollowing",
            Action::SwitchCamera => "switchCamera",
            Action::ToggleCollision => "toggleCollision",
        }
    }

    /// Whether the action fires once per press instead of while held.
    pub fn is_one_shot(self) -> bool {
        matches!(
            self,
            Action::ToggleRoverMode
                | Action::ToggleGroundFollowing
                | Action::SwitchCamera
                | Action::ToggleCollision
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default key bindings.
pub fn default_bindings() -> BTreeMap<String, Action> {
    [
        ("KeyW", Action::Throttle),
        ("ArrowUp", Action::Throttle),
        ("KeyS", Action::Brake),
        ("ArrowDown", Action::Brake),
        ("KeyA", Action::TurnLeft),
        ("ArrowLeft", Action::TurnLeft),
        ("KeyD", Action::TurnRight),
        ("ArrowRight", Action::TurnRight),
        ("Space", Action::Climb),
        ("ShiftLeft", Action::Descend),
        ("KeyQ", Action::RollLeft),
        ("KeyE", Action::RollRight),
        ("KeyM", Action::ToggleRoverMode),
        ("KeyN", Action::ToggleGroundFollowing),
        ("KeyC", Action::SwitchCamera),
        ("KeyB", Action::ToggleCollision),
    ]
    .into_iter()
    .map(|(key, action)| (key.to_string(), action))
    .collect()
}

/// Snapshot of which actions are active.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    pressed: BTreeSet<Action>,
}

impl InputState {
    pub fn is_pressed(&self, action: Action) -> bool {
        self.pressed.contains(&action)
    }

    pub fn set(&mut self, action: Action, pressed: bool) {
        if pressed {
            self.pressed.insert(action);
        } else {
            self.pressed.remove(&action);
        }
    }

    /// Builder-style helper for constructing states.
    #[must_use]
    pub fn with(mut self, action: Action) -> Self {
        self.set(action, true);
        self
    }

    /// `1.0` for positive only, `-1.0` for negative only, `0.0` otherwise.
    pub fn axis(&self, positive: Action, negative: Action) -> f64 {
        f64::from(u8::from(self.is_pressed(positive))) - f64::from(u8::from(self.is_pressed(negative)))
    }

    /// `1.0` when pressed, `0.0` otherwise.
    pub fn value(&self, action: Action) -> f64 {
        f64::from(u8::from(self.is_pressed(action)))
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}

/// Callback invoked with the new pressed state of an action.
pub type InputCallback = Box<dyn FnMut(bool) + Send + Sync>;

/// Identifies a registered input listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Maps key events to actions and notifies listeners.
pub struct InputManager {
    bindings: BTreeMap<String, Action>,
    state: InputState,
    held_keys: HashSet<String>,
    pulsed: Vec<Action>,
    listeners: HashMap<Action, Vec<(ListenerId, InputCallback)>>,
    next_listener: u64,
    text_focus: bool,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new(default_bindings())
    }
}

impl InputManager {
    pub fn new(bindings: BTreeMap<String, Action>) -> Self {
        Self {
            bindings,
            state: InputState::default(),
            held_keys: HashSet::new(),
            pulsed: Vec::new(),
            listeners: HashMap::new(),
            next_listener: 0,
            text_focus: false,
        }
    }

    /// Register a callback for an action.
    pub fn on_input(&mut self, action: Action, callback: InputCallback) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(action)
            .or_default()
            .push((id, callback));
        id
    }

    /// Remove a previously registered callback. Returns false if unknown.
    pub fn off_input(&mut self, id: ListenerId) -> bool {
        for callbacks in self.listeners.values_mut() {
            if let Some(index) = callbacks.iter().position(|(listener, _)| *listener == id) {
                callbacks.remove(index);
                return true;
            }
        }
        false
    }

    pub fn is_pressed(&self, action: Action) -> bool {
        self.state.is_pressed(action)
    }

    /// Current action state, frozen by the caller for the duration of a tick.
    pub fn snapshot(&self) -> InputState {
        self.state.clone()
    }

    /// Handle a key press. Returns true when the key is bound and the host
    /// should suppress its default handling.
    pub fn key_down(&mut self, key: &str) -> bool {
        if self.text_focus {
            return false;
        }
        let Some(&action) = self.bindings.get(key) else {
            return false;
        };

        // Auto-repeat: the key is already down.
        if !self.held_keys.insert(key.to_string()) {
            return true;
        }

        if action.is_one_shot() {
            self.pulsed.push(action);
            self.set_action(action, true);
        } else if !self.state.is_pressed(action) {
            self.set_action(action, true);
        }
        true
    }

    /// Handle a key release. Returns true when the key is bound.
    pub fn key_up(&mut self, key: &str) -> bool {
        if self.text_focus {
            return false;
        }
        let Some(&action) = self.bindings.get(key) else {
            return false;
        };
        if !self.held_keys.remove(key) {
            return true;
        }

        // One-shot actions are cleared at the end of the frame instead.
        if !action.is_one_shot() && !self.any_key_held_for(action) {
            self.set_action(action, false);
        }
        true
    }

    /// Clear one-shot pulses. Call once after every tick.
    pub fn end_frame(&mut self) {
        let pulsed = std::mem::take(&mut self.pulsed);
        for action in pulsed {
            if self.state.is_pressed(action) {
                self.set_action(action, false);
            }
        }
    }

    /// While a text field has focus, all game input is ignored. Gaining focus
    /// releases every held action.
    pub fn set_text_input_focus(&mut self, focused: bool) {
        if focused == self.text_focus {
            return;
        }
        self.text_focus = focused;
        if focused {
            self.release_all();
        }
    }

    pub fn has_text_input_focus(&self) -> bool {
        self.text_focus
    }

    pub fn key_bindings(&self) -> &BTreeMap<String, Action> {
        &self.bindings
    }

    /// Keys currently bound to an action.
    pub fn keys_for(&self, action: Action) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Bind a key to an action. Fails without changing anything if the key
    /// already drives a different action.
    pub fn bind(&mut self, key: &str, action: Action) -> Result<()> {
        match self.bindings.get(key) {
            Some(&existing) if existing != action => {
                return Err(Error::KeyInUse {
                    key: key.to_string(),
                    action: existing,
                });
            }
            _ => {}
        }
        self.bindings.insert(key.to_string(), action);
        Ok(())
    }

    /// Remove a key binding, returning the action it drove.
    pub fn unbind(&mut self, key: &str) -> Result<Action> {
        let action = self
            .bindings
            .remove(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
        if self.held_keys.remove(key) && !action.is_one_shot() && !self.any_key_held_for(action) {
            self.set_action(action, false);
        }
        Ok(action)
    }

    /// Move the binding of `old_key` to `new_key`.
    pub fn rebind(&mut self, old_key: &str, new_key: &str) -> Result<()> {
        let action = *self
            .bindings
            .get(old_key)
            .ok_or_else(|| Error::UnknownKey(old_key.to_string()))?;
        if old_key == new_key {
            return Ok(());
        }
        if let Some(&existing) = self.bindings.get(new_key) {
            return Err(Error::KeyInUse {
                key: new_key.to_string(),
                action: existing,
            });
        }
        self.unbind(old_key)?;
        self.bindings.insert(new_key.to_string(), action);
        Ok(())
    }

    fn any_key_held_for(&self, action: Action) -> bool {
        self.held_keys
            .iter()
            .any(|key| self.bindings.get(key) == Some(&action))
    }

    fn release_all(&mut self) {
        self.held_keys.clear();
        self.pulsed.clear();
        let pressed: Vec<Action> = self.state.pressed.iter().copied().collect();
        for action in pressed {
            self.set_action(action, false);
        }
    }

    fn set_action(&mut self, action: Action, pressed: bool) {
        self.state.set(action, pressed);
        if let Some(callbacks) = self.listeners.get_mut(&action) {
            for (_, callback) in callbacks {
                callback(pressed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder(manager: &mut InputManager, action: Action) -> Arc<Mutex<Vec<bool>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        manager.on_input(
            action,
            Box::new(move |pressed| sink.lock().unwrap().push(pressed)),
        );
        log
    }

    #[test]
    fn test_held_action() {
        let mut input = InputManager::default();
        assert!(input.key_down("KeyW"));
        assert!(input.is_pressed(Action::Throttle));
        input.end_frame();
        assert!(input.is_pressed(Action::Throttle));
        assert!(input.key_up("KeyW"));
        assert!(!input.is_pressed(Action::Throttle));
    }

    #[test]
    fn test_unbound_key_not_handled() {
        let mut input = InputManager::default();
        assert!(!input.key_down("KeyZ"));
        assert!(!input.key_up("KeyZ"));
        assert!(input.snapshot().is_empty());
    }

    #[test]
    fn test_two_keys_same_action() {
        let mut input = InputManager::default();
        input.key_down("KeyW");
        input.key_down("ArrowUp");
        input.key_up("KeyW");
        assert!(input.is_pressed(Action::Throttle));
        input.key_up("ArrowUp");
        assert!(!input.is_pressed(Action::Throttle));
    }

    #[test]
    fn test_one_shot_pulses_once_per_press() {
        let mut input = InputManager::default();
        let log = recorder(&mut input, Action::SwitchCamera);

        input.key_down("KeyC");
        assert!(input.is_pressed(Action::SwitchCamera));
        input.end_frame();
        assert!(!input.is_pressed(Action::SwitchCamera));

        // Held through several frames with auto-repeat.
        for _ in 0..5 {
            input.key_down("KeyC");
            input.end_frame();
            assert!(!input.is_pressed(Action::SwitchCamera));
        }
        input.key_up("KeyC");
        input.end_frame();

        assert_eq!(*log.lock().unwrap(), vec![true, false]);

        // A second physical press pulses again.
        input.key_down("KeyC");
        input.end_frame();
        assert_eq!(*log.lock().unwrap(), vec![true, false, true, false]);
    }

    #[test]
    fn test_one_shot_released_before_frame_end() {
        let mut input = InputManager::default();
        input.key_down("KeyB");
        input.key_up("KeyB");
        // Still visible to the tick that follows.
        assert!(input.snapshot().is_pressed(Action::ToggleCollision));
        input.end_frame();
        assert!(!input.is_pressed(Action::ToggleCollision));
    }

    #[test]
    fn test_off_input() {
        let mut input = InputManager::default();
        let log = Arc::new(Mutex::new(0));
        let sink = log.clone();
        let id = input.on_input(
            Action::Brake,
            Box::new(move |_| *sink.lock().unwrap() += 1),
        );
        input.key_down("KeyS");
        assert!(input.off_input(id));
        assert!(!input.off_input(id));
        input.key_up("KeyS");
        assert_eq!(*log.lock().unwrap(), 1);
    }

    #[test]
    fn test_bind_conflict_leaves_bindings_untouched() {
        let mut input = InputManager::default();
        let before = input.key_bindings().clone();

        let err = input.bind("KeyW", Action::Brake).unwrap_err();
        assert_eq!(
            err,
            Error::KeyInUse {
                key: "KeyW".to_string(),
                action: Action::Throttle,
            }
        );
        assert_eq!(input.key_bindings(), &before);

        // Rebinding onto an occupied key fails the same way.
        assert!(matches!(
            input.rebind("KeyS", "KeyW"),
            Err(Error::KeyInUse {
                action: Action::Throttle,
                ..
            })
        ));
        assert_eq!(input.key_bindings(), &before);
    }

    #[test]
    fn test_rebind_moves_binding() {
        let mut input = InputManager::default();
        input.rebind("KeyW", "KeyI").unwrap();
        assert!(!input.key_down("KeyW"));
        assert!(input.key_down("KeyI"));
        assert!(input.is_pressed(Action::Throttle));
        assert_eq!(input.keys_for(Action::Throttle), vec!["ArrowUp", "KeyI"]);
    }

    #[test]
    fn test_bind_same_action_is_idempotent() {
        let mut input = InputManager::default();
        input.bind("KeyW", Action::Throttle).unwrap();
        input.bind("KeyK", Action::Throttle).unwrap();
        assert_eq!(input.unbind("KeyK").unwrap(), Action::Throttle);
        assert_eq!(
            input.unbind("KeyK").unwrap_err(),
            Error::UnknownKey("KeyK".to_string())
        );
    }

    #[test]
    fn test_text_focus_ignores_input() {
        let mut input = InputManager::default();
        input.key_down("KeyW");
        input.set_text_input_focus(true);
        assert!(!input.is_pressed(Action::Throttle));
        assert!(!input.key_down("KeyD"));
        assert!(!input.is_pressed(Action::TurnRight));

        input.set_text_input_focus(false);
        assert!(input.key_down("KeyD"));
        assert!(input.is_pressed(Action::TurnRight));
    }

    #[test]
    fn test_axis() {
        let state = InputState::default().with(Action::TurnRight);
        assert!((state.axis(Action::TurnRight, Action::TurnLeft) - 1.0).abs() < f64::EPSILON);
        let state = state.with(Action::TurnLeft);
        assert!(state.axis(Action::TurnRight, Action::TurnLeft).abs() < f64::EPSILON);
    }
}
