//! A purpose-built scene exercising the question/permission event variants,
//! structured input encoding, and preemption against the shell scene: the
//! way an out-of-tree scene plugs into the composite.

use pretty_assertions::assert_eq;
use scenecast_core::{
    Cursor, Line, QuestionOption, SceneEvent, SceneInput, Snapshot,
};
use scenecast_scene::input_encode::select_with_arrows;
use scenecast_scene::{
    CompositeScene, Continuation, Scene, ShellScene, ShellSceneOptions,
};

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

/// Recognizes a two-option confirmation dialog:
///
/// ```text
/// Allow `rm -rf build`?
///  > yes
///    no
/// ```
struct PermissionScene {
    selected: Option<usize>,
}

impl PermissionScene {
    fn new() -> Self {
        Self { selected: None }
    }

    fn parse(snapshot: &Snapshot) -> Option<(String, usize)> {
        let texts: Vec<String> = snapshot.lines.iter().map(Line::text).collect();
        let question_row = texts
            .iter()
            .position(|l| l.starts_with("Allow `") && l.ends_with("`?"))?;
        let command = texts[question_row]
            .strip_prefix("Allow `")?
            .strip_suffix("`?")?
            .to_string();
        let selected = texts[question_row + 1..]
            .iter()
            .position(|l| l.trim_start().starts_with('>'))?;
        Some((command, selected))
    }

    fn options() -> Vec<QuestionOption> {
        vec![
            QuestionOption {
                label: "yes".to_string(),
                description: None,
            },
            QuestionOption {
                label: "no".to_string(),
                description: None,
            },
        ]
    }
}

impl Scene for PermissionScene {
    fn priority(&self) -> i32 {
        10 // ahead of the shell scene's 100
    }

    fn state(&self) -> Option<String> {
        self.selected.map(|_| "permission".to_string())
    }

    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
        let (command, selected) = Self::parse(snapshot)?;
        self.selected = Some(selected);
        Some(vec![SceneEvent::PermissionRequired {
            command,
            description: None,
            options: Self::options(),
            selected: Some(selected),
        }])
    }

    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
        match Self::parse(snapshot) {
            Some((_, selected)) => {
                let events = if self.selected == Some(selected) {
                    Vec::new()
                } else {
                    self.selected = Some(selected);
                    vec![SceneEvent::LastQuestionUpdated {
                        header: None,
                        question: "permission".to_string(),
                        options: Self::options(),
                        selected: Some(selected),
                    }]
                };
                Some(Continuation { events, firm: true })
            }
            None => {
                self.selected = None;
                None
            }
        }
    }

    fn encode_input(&mut self, input: &SceneInput) -> Option<Vec<u8>> {
        match (input, self.selected) {
            (SceneInput::Select { index }, Some(current)) if *index < 2 => {
                Some(select_with_arrows(current, *index))
            }
            _ => None,
        }
    }
}

fn composite() -> CompositeScene {
    CompositeScene::new(vec![
        Box::new(PermissionScene::new()),
        Box::new(ShellScene::new(ShellSceneOptions::default())),
    ])
}

#[test]
fn dialog_preempts_the_running_shell() {
    let mut scenes = composite();

    // Shell takes the prompt, then goes running.
    scenes.process(&snapshot(&["$"]));
    scenes.process(&snapshot(&["$ rm -rf build", "working..."]));
    assert_eq!(scenes.active_state(), Some("shell(running)".to_string()));

    // The dialog appears; the running shell is tentative, so the permission
    // scene preempts within the same snapshot.
    let result = scenes.process(&snapshot(&[
        "$ rm -rf build",
        "Allow `rm -rf build`?",
        " > yes",
        "   no",
    ]));
    assert!(result.firm);
    assert_eq!(scenes.active_state(), Some("permission".to_string()));
    assert_eq!(
        result.events,
        vec![SceneEvent::PermissionRequired {
            command: "rm -rf build".to_string(),
            description: None,
            options: vec![
                QuestionOption {
                    label: "yes".to_string(),
                    description: None
                },
                QuestionOption {
                    label: "no".to_string(),
                    description: None
                },
            ],
            selected: Some(0),
        }]
    );
}

#[test]
fn selection_movement_updates_the_question() {
    let mut scenes = composite();
    scenes.process(&snapshot(&[
        "Allow `make install`?",
        " > yes",
        "   no",
    ]));

    let moved = scenes.process(&snapshot(&[
        "Allow `make install`?",
        "   yes",
        " > no",
    ]));
    assert_eq!(
        moved.events,
        vec![SceneEvent::LastQuestionUpdated {
            header: None,
            question: "permission".to_string(),
            options: vec![
                QuestionOption {
                    label: "yes".to_string(),
                    description: None
                },
                QuestionOption {
                    label: "no".to_string(),
                    description: None
                },
            ],
            selected: Some(1),
        }]
    );
}

#[test]
fn select_input_encodes_arrow_navigation() {
    let mut scenes = composite();
    scenes.process(&snapshot(&[
        "Allow `make install`?",
        " > yes",
        "   no",
    ]));

    // Move from option 0 to option 1: one down-arrow plus confirm.
    assert_eq!(
        scenes.encode_input(&SceneInput::select(1)),
        Some(b"\x1b[B\r".to_vec())
    );
    // Out-of-range selections are declined.
    assert_eq!(scenes.encode_input(&SceneInput::select(7)), None);
    // Text input is not this scene's business.
    assert_eq!(scenes.encode_input(&SceneInput::text("y")), None);
}

#[test]
fn dismissed_dialog_releases_back_to_the_shell() {
    let mut scenes = composite();
    scenes.process(&snapshot(&["$"]));
    scenes.process(&snapshot(&[
        "$ rm -rf build",
        "Allow `rm -rf build`?",
        " > yes",
        "   no",
    ]));
    assert_eq!(scenes.active_state(), Some("permission".to_string()));

    // The dialog is gone and a fresh prompt is back: the permission scene
    // releases and the shell re-detects in the same update.
    let result = scenes.process(&snapshot(&["$ rm -rf build", "removed", "$"]));
    assert!(result.firm);
    assert_eq!(scenes.active_state(), Some("shell(idle)".to_string()));
    assert_eq!(
        result.events,
        vec![SceneEvent::InputChanged {
            active: true,
            text: String::new(),
        }]
    );
}
