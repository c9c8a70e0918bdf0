//! Shortcut and edge-gesture recognition.
//!
//! Two matcher variants share the same contract: feed them controller
//! events, and when a configured gesture completes they fire their bound
//! action with a [`Fired`] describing which way focus should move.

use std::time::Instant;

use tracing::debug;

use scnp_types::{axis, key_state, ControllerEvent, ExitDirection, ShortcutStep, WILDCARD_CODE};

/// What a completed gesture tells the hand-off logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired {
    pub direction: ExitDirection,
    /// Key codes involved in the gesture; release events for these are sent
    /// to the old focus target so it does not retain stuck keys.
    pub codes: Vec<u16>,
    /// Vertical crossing position for edge gestures, as a fraction of the
    /// screen height.
    pub height: Option<f32>,
}

/// Callback invoked when a matcher completes.
pub type ComboAction = Box<dyn FnMut(Fired) + Send>;

/// Recognizes one ordered sequence of key events.
pub struct SequenceMatcher {
    name: String,
    description: String,
    direction: ExitDirection,
    steps: Vec<ShortcutStep>,
    cursor: usize,
    last_update: Option<Instant>,
    action: ComboAction,
}

impl SequenceMatcher {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        direction: ExitDirection,
        steps: Vec<ShortcutStep>,
        action: ComboAction,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            direction,
            steps,
            cursor: 0,
            last_update: None,
            action,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn direction(&self) -> ExitDirection {
        self.direction
    }

    #[must_use]
    pub fn steps(&self) -> &[ShortcutStep] {
        &self.steps
    }

    /// Append, for every existing step, a mirror step expecting the same key
    /// released with no timeout. Directional shortcuts get this so the keys
    /// physically held at firing time must come back up before the sequence
    /// can complete again.
    pub fn append_release_mirror(&mut self) {
        let mirrored: Vec<ShortcutStep> = self
            .steps
            .iter()
            .map(|s| ShortcutStep::new(s.code, key_state::RELEASED, None))
            .collect();
        self.steps.extend(mirrored);
    }

    /// Unique non-wildcard key codes pressed anywhere in the sequence.
    #[must_use]
    pub fn pressed_codes(&self) -> Vec<u16> {
        let mut codes = Vec::new();
        for step in &self.steps {
            if step.code != WILDCARD_CODE
                && step.state == key_state::PRESSED
                && !codes.contains(&step.code)
            {
                codes.push(step.code);
            }
        }
        codes
    }

    /// Feed one key event. Returns true exactly when this event completes
    /// the sequence.
    pub fn update(&mut self, code: u16, state: i32) -> bool {
        if self.steps.is_empty() {
            return false;
        }

        let now = Instant::now();
        if let Some(timeout) = self.steps[self.cursor].timeout {
            if let Some(last) = self.last_update {
                if now.duration_since(last) > timeout {
                    self.cursor = 0;
                }
            }
        }

        // Auto-repeat never advances or resets the cursor, but it did go
        // through the timeout check above.
        if state == key_state::REPEATED {
            return false;
        }
        self.last_update = Some(now);

        let step = self.steps[self.cursor];
        let matches = (step.code == code || step.code == WILDCARD_CODE) && step.state == state;
        if !matches {
            self.cursor = 0;
            return false;
        }

        self.cursor += 1;
        if self.cursor < self.steps.len() {
            return false;
        }
        self.cursor = 0;
        debug!(shortcut = %self.name, "sequence complete");
        let codes = self.pressed_codes();
        (self.action)(Fired {
            direction: self.direction,
            codes,
            height: None,
        });
        true
    }
}

/// Recognizes the mouse leaving the screen at a vertical edge.
///
/// Tracks a virtual cursor by integrating relative movement, clamped to the
/// local resolution. Firing recenters the cursor so one crossing produces
/// one event.
pub struct EdgeMatcher {
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    action: ComboAction,
}

impl EdgeMatcher {
    pub fn new(width: u32, height: u32, action: ComboAction) -> Self {
        // A degenerate resolution still gets a one-pixel screen rather than
        // an empty clamp range.
        let width = i32::try_from(width.max(1)).unwrap_or(i32::MAX);
        let height = i32::try_from(height.max(1)).unwrap_or(i32::MAX);
        Self {
            width,
            height,
            x: width / 2,
            y: height / 2,
            action,
        }
    }

    /// Current virtual cursor position.
    #[must_use]
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Place the virtual cursor, used when a hand-off warps the real one.
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x.clamp(0, self.width - 1);
        self.y = y.clamp(0, self.height - 1);
    }

    fn recenter(&mut self) {
        self.x = self.width / 2;
        self.y = self.height / 2;
    }

    /// Feed one movement event. Returns true when the cursor crossed a
    /// vertical edge.
    pub fn update(&mut self, code: u16, value: i32) -> bool {
        match code {
            axis::X => self.x = (self.x + value).clamp(0, self.width - 1),
            axis::Y => self.y = (self.y + value).clamp(0, self.height - 1),
            _ => return false,
        }

        let direction = if self.x <= 0 {
            ExitDirection::Left
        } else if self.x >= self.width - 1 {
            ExitDirection::Right
        } else {
            return false;
        };

        #[allow(clippy::cast_precision_loss)]
        let height = self.y as f32 / (self.height - 1).max(1) as f32;
        debug!(?direction, height, "edge crossed");
        self.recenter();
        (self.action)(Fired {
            direction,
            codes: Vec::new(),
            height: Some(height),
        });
        true
    }
}

/// One configured matcher, sequence or edge.
pub enum ComboMatcher {
    Sequence(SequenceMatcher),
    Edge(EdgeMatcher),
}

impl ComboMatcher {
    /// Feed one controller event to whichever variant consumes it.
    pub fn update(&mut self, event: &ControllerEvent) -> bool {
        match self {
            Self::Sequence(matcher) if event.is_key() => matcher.update(event.code, event.value),
            Self::Edge(matcher) if !event.is_key() => matcher.update(event.code, event.value),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn collector() -> (ComboAction, Arc<Mutex<Vec<Fired>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        (
            Box::new(move |f| sink.lock().unwrap().push(f)),
            fired,
        )
    }

    fn steps(codes: &[u16]) -> Vec<ShortcutStep> {
        codes
            .iter()
            .map(|&c| ShortcutStep::new(c, key_state::PRESSED, None))
            .collect()
    }

    #[test]
    fn sequence_fires_only_on_the_completing_update() {
        let (action, fired) = collector();
        let mut matcher = SequenceMatcher::new(
            "abc",
            "",
            ExitDirection::Right,
            steps(&[30, 48, 46]),
            action,
        );

        assert!(!matcher.update(30, key_state::PRESSED));
        assert!(!matcher.update(48, key_state::PRESSED));
        assert!(matcher.update(46, key_state::PRESSED));

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].direction, ExitDirection::Right);
        assert_eq!(fired[0].codes, vec![30, 48, 46]);
    }

    #[test]
    fn deviation_resets_and_matching_restarts_cleanly() {
        let (action, fired) = collector();
        let mut matcher =
            SequenceMatcher::new("abc", "", ExitDirection::None, steps(&[30, 48, 46]), action);

        assert!(!matcher.update(30, key_state::PRESSED));
        assert!(!matcher.update(99, key_state::PRESSED));
        assert!(!matcher.update(46, key_state::PRESSED));
        assert!(fired.lock().unwrap().is_empty());

        // Full correct run still works afterwards.
        assert!(!matcher.update(30, key_state::PRESSED));
        assert!(!matcher.update(48, key_state::PRESSED));
        assert!(matcher.update(46, key_state::PRESSED));
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn reset_on_mismatch_is_unconditional() {
        let (action, fired) = collector();
        let mut matcher =
            SequenceMatcher::new("ab", "", ExitDirection::None, steps(&[30, 48]), action);

        matcher.update(30, key_state::PRESSED);
        // Mismatch that happens to be the first step again: still a plain
        // reset, not a restart.
        matcher.update(30, key_state::PRESSED);
        assert!(!matcher.update(48, key_state::PRESSED));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn wildcard_matches_any_code_with_the_right_state() {
        let (action, fired) = collector();
        let mut matcher = SequenceMatcher::new(
            "any",
            "",
            ExitDirection::None,
            vec![
                ShortcutStep::new(30, key_state::PRESSED, None),
                ShortcutStep::new(WILDCARD_CODE, key_state::PRESSED, None),
            ],
            action,
        );

        matcher.update(30, key_state::PRESSED);
        assert!(matcher.update(77, key_state::PRESSED));
        // Wildcard does not match the wrong state.
        matcher.update(30, key_state::PRESSED);
        assert!(!matcher.update(31, key_state::RELEASED));
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn repeats_are_ignored_for_matching() {
        let (action, fired) = collector();
        let mut matcher =
            SequenceMatcher::new("ab", "", ExitDirection::None, steps(&[30, 48]), action);

        matcher.update(30, key_state::PRESSED);
        assert!(!matcher.update(30, key_state::REPEATED));
        assert!(matcher.update(48, key_state::PRESSED));
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn step_timeout_resets_the_cursor() {
        let (action, fired) = collector();
        let mut matcher = SequenceMatcher::new(
            "timed",
            "",
            ExitDirection::None,
            vec![
                ShortcutStep::new(30, key_state::PRESSED, None),
                ShortcutStep::new(48, key_state::PRESSED, Some(Duration::from_millis(10))),
            ],
            action,
        );

        matcher.update(30, key_state::PRESSED);
        std::thread::sleep(Duration::from_millis(20));
        // Too late: this becomes a fresh attempt at step one, which it
        // does not match.
        assert!(!matcher.update(48, key_state::PRESSED));
        assert!(fired.lock().unwrap().is_empty());

        matcher.update(30, key_state::PRESSED);
        assert!(matcher.update(48, key_state::PRESSED));
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn release_mirror_doubles_the_steps() {
        let (action, _fired) = collector();
        let mut matcher =
            SequenceMatcher::new("ab", "", ExitDirection::Right, steps(&[30, 48]), action);
        matcher.append_release_mirror();

        assert_eq!(matcher.steps().len(), 4);
        assert_eq!(matcher.steps()[2].code, 30);
        assert_eq!(matcher.steps()[2].state, key_state::RELEASED);
        assert_eq!(matcher.steps()[2].timeout, None);
        assert_eq!(matcher.steps()[3].code, 48);
        assert_eq!(matcher.steps()[3].state, key_state::RELEASED);
    }

    #[test]
    fn mirrored_sequence_requires_releases_to_complete() {
        let (action, fired) = collector();
        let mut matcher =
            SequenceMatcher::new("ab", "", ExitDirection::Right, steps(&[30, 48]), action);
        matcher.append_release_mirror();

        matcher.update(30, key_state::PRESSED);
        matcher.update(48, key_state::PRESSED);
        assert!(fired.lock().unwrap().is_empty());
        matcher.update(30, key_state::RELEASED);
        assert!(matcher.update(48, key_state::RELEASED));

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        // Pressed codes stay deduplicated despite the mirror.
        assert_eq!(fired[0].codes, vec![30, 48]);
    }

    #[test]
    fn edge_fires_left_and_right_with_height() {
        let (action, fired) = collector();
        let mut matcher = EdgeMatcher::new(1920, 1080, action);

        // Walk to the right edge.
        assert!(!matcher.update(axis::X, 500));
        assert!(matcher.update(axis::X, 5000));
        // Recentered after firing.
        assert_eq!(matcher.position(), (960, 540));

        // And to the left edge, lower on the screen.
        matcher.update(axis::Y, 400);
        assert!(matcher.update(axis::X, -5000));

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].direction, ExitDirection::Right);
        assert!((fired[0].height.unwrap() - 0.5).abs() < 0.01);
        assert_eq!(fired[1].direction, ExitDirection::Left);
        assert!((fired[1].height.unwrap() - 940.0 / 1079.0).abs() < 0.001);
    }

    #[test]
    fn edge_survives_a_zero_resolution() {
        let (action, _fired) = collector();
        let mut matcher = EdgeMatcher::new(0, 0, action);
        matcher.set_position(10, 10);
        assert_eq!(matcher.position(), (0, 0));
        matcher.update(axis::X, 5);
        matcher.update(axis::Y, -5);
    }

    #[test]
    fn edge_ignores_unknown_axes() {
        let (action, fired) = collector();
        let mut matcher = EdgeMatcher::new(100, 100, action);
        assert!(!matcher.update(8, -5000));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn combo_matcher_routes_by_event_class() {
        let (action, fired) = collector();
        let mut sequence = ComboMatcher::Sequence(SequenceMatcher::new(
            "a",
            "",
            ExitDirection::None,
            steps(&[30]),
            action,
        ));

        // Mouse events never reach a sequence matcher.
        assert!(!sequence.update(&ControllerEvent::movement(axis::X, -5000)));
        assert!(sequence.update(&ControllerEvent::key(30, key_state::PRESSED)));
        assert_eq!(fired.lock().unwrap().len(), 1);
    }
}
