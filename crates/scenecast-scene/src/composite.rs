//! Scene orchestration: priority order, continuation, preemption.
//!
//! The composite holds scenes sorted by ascending priority plus at most one
//! active scene. Per snapshot ([`CompositeScene::process`]):
//!
//! 1. An active scene gets to continue. A firm result returns directly.
//! 2. A tentative result triggers a preemption scan: `detect` on every
//!    *other* scene in priority order; the first match replaces the active
//!    scene and the transition is firm (decisive within this snapshot).
//! 3. A released (or absent) active scene triggers a clean-detect scan over
//!    all scenes.
//!
//! Given a snapshot and fixed scene states, `process` is a pure function of
//! those inputs; nothing here consults clocks or ambient state.

use scenecast_core::{SceneEvent, SceneInput, Snapshot};

use crate::{Continuation, Scene};

/// Priority-ordered scene orchestrator. Implements [`Scene`] itself so
/// composites can nest.
pub struct CompositeScene {
    scenes: Vec<Box<dyn Scene>>,
    active: Option<usize>,
    priority: i32,
}

impl CompositeScene {
    /// Build from an unordered scene list; scenes are sorted by ascending
    /// priority (stable, so insertion order breaks ties).
    #[must_use]
    pub fn new(mut scenes: Vec<Box<dyn Scene>>) -> Self {
        scenes.sort_by_key(|s| s.priority());
        Self {
            scenes,
            active: None,
            priority: 0,
        }
    }

    /// Override the composite's own priority (for nesting).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the composite holds no scenes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// The active scene's diagnostic state, if any.
    #[must_use]
    pub fn active_state(&self) -> Option<String> {
        self.active.and_then(|i| self.scenes[i].state())
    }

    /// Top-level entry point: the full continuation / preemption / detect
    /// sequence for one snapshot.
    pub fn process(&mut self, snapshot: &Snapshot) -> Continuation {
        if let Some(active) = self.active {
            match self.scenes[active].continue_scene(snapshot) {
                Some(result) if result.firm => return result,
                Some(tentative) => {
                    if let Some(preempting) = self.preemption_scan(active, snapshot) {
                        return preempting;
                    }
                    return tentative;
                }
                None => self.active = None,
            }
        }
        self.clean_detect(snapshot)
            .unwrap_or_else(|| Continuation::tentative(Vec::new()))
    }

    /// `detect` on every scene but `held`, in priority order. The first match
    /// takes over, firmly.
    fn preemption_scan(&mut self, held: usize, snapshot: &Snapshot) -> Option<Continuation> {
        for index in 0..self.scenes.len() {
            if index == held {
                continue;
            }
            if let Some(events) = self.scenes[index].detect(snapshot) {
                tracing::debug!(state = ?self.scenes[index].state(), "scene preempted");
                self.active = Some(index);
                return Some(Continuation::firm(events));
            }
        }
        None
    }

    /// `detect` on every scene in priority order; the first match becomes
    /// active.
    fn clean_detect(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
        for index in 0..self.scenes.len() {
            if let Some(events) = self.scenes[index].detect(snapshot) {
                tracing::debug!(state = ?self.scenes[index].state(), "scene activated");
                self.active = Some(index);
                return Some(Continuation::firm(events));
            }
        }
        None
    }
}

impl Scene for CompositeScene {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn state(&self) -> Option<String> {
        self.active_state()
    }

    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
        self.clean_detect(snapshot).map(|c| c.events)
    }

    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
        let result = self.process(snapshot);
        if self.active.is_none() && result.events.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    fn encode_input(&mut self, input: &SceneInput) -> Option<Vec<u8>> {
        let active = self.active?;
        self.scenes[active].encode_input(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scenecast_core::{Cursor, Line};

    fn snapshot(lines: &[&str]) -> Snapshot {
        Snapshot {
            lines: lines.iter().map(|s| Line::plain(*s)).collect(),
            cursor: Cursor {
                x: 0,
                y: 0,
                visible: true,
            },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: 0,
        }
    }

    fn marker_event(text: &str) -> SceneEvent {
        SceneEvent::IndicatorChanged {
            active: true,
            text: text.to_string(),
        }
    }

    /// Accepts everything, always tentatively.
    struct Catchall {
        priority: i32,
        active: bool,
    }

    impl Catchall {
        fn new(priority: i32) -> Self {
            Self {
                priority,
                active: false,
            }
        }
    }

    impl Scene for Catchall {
        fn priority(&self) -> i32 {
            self.priority
        }
        fn state(&self) -> Option<String> {
            self.active.then(|| "catchall".to_string())
        }
        fn detect(&mut self, _snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
            self.active = true;
            Some(vec![marker_event("catchall")])
        }
        fn continue_scene(&mut self, _snapshot: &Snapshot) -> Option<Continuation> {
            Some(Continuation::tentative(Vec::new()))
        }
    }

    /// Detects snapshots whose first line starts with `~`.
    struct TildeScene {
        priority: i32,
        active: bool,
    }

    impl TildeScene {
        fn new(priority: i32) -> Self {
            Self {
                priority,
                active: false,
            }
        }

        fn matches(snapshot: &Snapshot) -> bool {
            snapshot
                .lines
                .first()
                .is_some_and(|l| l.text().starts_with('~'))
        }
    }

    impl Scene for TildeScene {
        fn priority(&self) -> i32 {
            self.priority
        }
        fn state(&self) -> Option<String> {
            self.active.then(|| "tilde".to_string())
        }
        fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
            if Self::matches(snapshot) {
                self.active = true;
                Some(Vec::new())
            } else {
                None
            }
        }
        fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
            if Self::matches(snapshot) {
                Some(Continuation::firm(Vec::new()))
            } else {
                self.active = false;
                None
            }
        }
    }

    // ---- Preemption (spec scenario: catch-all vs specific) ----

    #[test]
    fn tentative_continuation_invites_preemption() {
        let mut composite = CompositeScene::new(vec![
            Box::new(Catchall::new(10)),
            Box::new(TildeScene::new(0)),
        ]);

        // First snapshot: only the catch-all matches; it activates.
        let first = composite.process(&snapshot(&["anything"]));
        assert!(first.firm);
        assert_eq!(first.events, vec![marker_event("catchall")]);
        assert_eq!(composite.active_state(), Some("catchall".to_string()));

        // Second snapshot: catch-all continues tentatively, tilde preempts.
        let second = composite.process(&snapshot(&["~vim"]));
        assert!(second.firm);
        assert_eq!(second.events, Vec::new());
        assert_eq!(composite.active_state(), Some("tilde".to_string()));
    }

    #[test]
    fn firm_continuation_skips_preemption() {
        // Tilde is active and firm; the lower-priority catch-all never runs.
        let mut composite = CompositeScene::new(vec![
            Box::new(TildeScene::new(0)),
            Box::new(Catchall::new(10)),
        ]);
        composite.process(&snapshot(&["~vim"]));
        assert_eq!(composite.active_state(), Some("tilde".to_string()));

        let next = composite.process(&snapshot(&["~vim still"]));
        assert!(next.firm);
        assert_eq!(composite.active_state(), Some("tilde".to_string()));
    }

    #[test]
    fn release_falls_back_to_clean_detect() {
        let mut composite = CompositeScene::new(vec![
            Box::new(TildeScene::new(0)),
            Box::new(Catchall::new(10)),
        ]);
        composite.process(&snapshot(&["~vim"]));
        // Tilde releases; the catch-all picks up within the same call.
        let result = composite.process(&snapshot(&["plain"]));
        assert!(result.firm);
        assert_eq!(composite.active_state(), Some("catchall".to_string()));
    }

    #[test]
    fn no_match_returns_empty_tentative() {
        let mut composite = CompositeScene::new(vec![Box::new(TildeScene::new(0))]);
        let result = composite.process(&snapshot(&["plain"]));
        assert!(!result.firm);
        assert!(result.events.is_empty());
        assert_eq!(composite.active_state(), None);
    }

    #[test]
    fn scenes_are_tried_in_priority_order() {
        // Both match everything; the lower priority value wins despite
        // insertion order.
        let mut composite = CompositeScene::new(vec![
            Box::new(Catchall::new(5)),
            Box::new(Catchall::new(1)),
        ]);
        composite.process(&snapshot(&["x"]));
        // Active scene is the priority-1 instance (sorted first).
        assert_eq!(composite.active_state(), Some("catchall".to_string()));
        assert_eq!(composite.scenes[0].priority(), 1);
    }

    #[test]
    fn nested_composite_participates_as_a_scene() {
        let inner = CompositeScene::new(vec![Box::new(TildeScene::new(0))]).with_priority(0);
        let mut outer =
            CompositeScene::new(vec![Box::new(inner), Box::new(Catchall::new(10))]);

        outer.process(&snapshot(&["~nested"]));
        assert_eq!(outer.active_state(), Some("tilde".to_string()));
    }

    #[test]
    fn process_is_deterministic_for_fixed_states() {
        let build = || {
            CompositeScene::new(vec![
                Box::new(Catchall::new(10)),
                Box::new(TildeScene::new(0)),
            ])
        };
        let run = |mut c: CompositeScene| {
            let a = c.process(&snapshot(&["anything"]));
            let b = c.process(&snapshot(&["~vim"]));
            (a, b)
        };
        assert_eq!(run(build()), run(build()));
    }

    #[test]
    fn encode_input_delegates_to_active_scene_only() {
        struct Encoder;
        impl Scene for Encoder {
            fn priority(&self) -> i32 {
                0
            }
            fn state(&self) -> Option<String> {
                Some("encoder".to_string())
            }
            fn detect(&mut self, _snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
                Some(Vec::new())
            }
            fn continue_scene(&mut self, _snapshot: &Snapshot) -> Option<Continuation> {
                Some(Continuation::firm(Vec::new()))
            }
            fn encode_input(&mut self, _input: &SceneInput) -> Option<Vec<u8>> {
                Some(b"encoded".to_vec())
            }
        }

        let mut composite = CompositeScene::new(vec![Box::new(Encoder)]);
        let input = SceneInput::select(0);
        assert_eq!(composite.encode_input(&input), None);
        composite.process(&snapshot(&["x"]));
        assert_eq!(composite.encode_input(&input), Some(b"encoded".to_vec()));
    }
}
