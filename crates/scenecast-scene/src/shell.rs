//! Reference scene: an ordinary shell prompt.
//!
//! Two internal states, all coordinates absolute (virtual-buffer indices):
//!
//! - `Idle`: a prompt is visible on the cursor line (optionally with a
//!   matching prefix line right above it). Every snapshot re-emits the
//!   current post-prompt input text.
//! - `Running`: the prompt moved away; output accumulates and is emitted as
//!   text messages up to (but not including) any newly appeared prompt.
//!
//! The idle -> running transition emits the echoed command line as a block
//! message, provided its lines have not already scrolled out of the snapshot.
//! Content that scrolls out while running is unrecoverable and is skipped.
//!
//! On the alternate screen the scene holds its state and yields tentatively,
//! letting alternate-screen scenes preempt. On tracking loss the stored
//! positions are meaningless: the scene resets and re-detects within the
//! same snapshot.

use regex_lite::Regex;

use scenecast_core::{MessageStyle, SceneEvent, Snapshot};

use crate::{Continuation, Scene};

/// Configuration for [`ShellScene`].
#[derive(Debug, Clone)]
pub struct ShellSceneOptions {
    /// Prompt pattern, matched against the cursor line.
    pub prompt: Regex,
    /// When set, the line immediately above a matching prompt is checked
    /// against this pattern; a match extends the prompt to two lines.
    pub prompt_prefix: Option<Regex>,
    /// Ordering among scenes.
    pub priority: i32,
}

impl Default for ShellSceneOptions {
    fn default() -> Self {
        Self {
            prompt: Regex::new(r"^\$").expect("default prompt pattern compiles"),
            prompt_prefix: None,
            priority: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellState {
    Inactive,
    Idle { prompt_start: u64, prompt_end: u64 },
    Running { emitted_up_to: u64 },
}

/// A successful prompt match on the cursor line.
struct PromptMatch {
    start: u64,
    end: u64,
    input_text: String,
}

/// The reference shell scene.
pub struct ShellScene {
    options: ShellSceneOptions,
    state: ShellState,
}

impl ShellScene {
    #[must_use]
    pub fn new(options: ShellSceneOptions) -> Self {
        Self {
            options,
            state: ShellState::Inactive,
        }
    }

    /// Match the prompt on the cursor line; extend upward by one line when a
    /// configured prefix matches there.
    fn prompt_match(&self, snapshot: &Snapshot) -> Option<PromptMatch> {
        let cursor_line = snapshot.cursor_line_index()?;
        let text = snapshot.line_at(cursor_line)?.text();
        let m = self.options.prompt.find(&text)?;
        let input_text = text[m.end()..].trim_start().to_string();

        let start = match &self.options.prompt_prefix {
            Some(prefix)
                if cursor_line > snapshot.lines_start()
                    && snapshot
                        .line_at(cursor_line - 1)
                        .is_some_and(|line| prefix.is_match(&line.text())) =>
            {
                cursor_line - 1
            }
            _ => cursor_line,
        };

        Some(PromptMatch {
            start,
            end: cursor_line,
            input_text,
        })
    }

    /// Whether positions tracked by the current state are still addressable
    /// in this snapshot.
    fn positions_valid(&self, snapshot: &Snapshot) -> bool {
        if snapshot.lines_offset.is_none() {
            return false;
        }
        let end = snapshot.lines_end();
        match self.state {
            ShellState::Inactive => true,
            ShellState::Idle { prompt_end, .. } => prompt_end < end,
            ShellState::Running { emitted_up_to } => emitted_up_to <= end,
        }
    }

    /// Emit pending output and, when a prompt appeared, re-enter idle.
    /// Returns the firmness for this snapshot.
    fn running_step(
        &mut self,
        snapshot: &Snapshot,
        mut emitted_up_to: u64,
        events: &mut Vec<SceneEvent>,
    ) -> bool {
        let matched = self.prompt_match(snapshot);
        // Without a prompt, stop at the last non-blank line: trailing blanks
        // are usually the in-progress cursor line, whose content arrives in a
        // later snapshot and would otherwise be skipped forever.
        let boundary = matched.as_ref().map_or_else(
            || {
                snapshot
                    .lines
                    .iter()
                    .rposition(|l| !l.is_blank())
                    .map_or(snapshot.lines_start(), |i| {
                        snapshot.lines_start() + i as u64 + 1
                    })
            },
            |m| m.start,
        );

        // Content that scrolled out before we saw it is gone.
        emitted_up_to = emitted_up_to.max(snapshot.lines_start());

        if emitted_up_to < boundary {
            events.push(SceneEvent::MessageCreated {
                style: MessageStyle::Text,
                content: snapshot.collect_lines(emitted_up_to, boundary),
                echo: None,
            });
            emitted_up_to = boundary;
        }

        match matched {
            Some(m) => {
                self.state = ShellState::Idle {
                    prompt_start: m.start,
                    prompt_end: m.end,
                };
                events.push(SceneEvent::InputChanged {
                    active: true,
                    text: m.input_text,
                });
                snapshot.cursor.visible
            }
            None => {
                self.state = ShellState::Running { emitted_up_to };
                false
            }
        }
    }

    /// Reset and attempt re-detection within the same snapshot.
    fn reset_and_redetect(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
        self.state = ShellState::Inactive;
        self.detect(snapshot).map(Continuation::firm)
    }
}

impl Scene for ShellScene {
    fn priority(&self) -> i32 {
        self.options.priority
    }

    fn state(&self) -> Option<String> {
        match self.state {
            ShellState::Inactive => None,
            ShellState::Idle { .. } => Some("shell(idle)".to_string()),
            ShellState::Running { .. } => Some("shell(running)".to_string()),
        }
    }

    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
        if snapshot.alternate {
            return None;
        }
        let m = self.prompt_match(snapshot)?;
        self.state = ShellState::Idle {
            prompt_start: m.start,
            prompt_end: m.end,
        };
        Some(vec![SceneEvent::InputChanged {
            active: true,
            text: m.input_text,
        }])
    }

    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<Continuation> {
        // The normal buffer is frozen under the alternate screen: hold state,
        // yield to alternate-screen scenes.
        if snapshot.alternate {
            return Some(Continuation::tentative(Vec::new()));
        }

        if !self.positions_valid(snapshot) {
            return self.reset_and_redetect(snapshot);
        }

        match self.state {
            ShellState::Inactive => self.detect(snapshot).map(Continuation::firm),
            ShellState::Idle {
                prompt_start,
                prompt_end,
            } => {
                let current = self.prompt_match(snapshot);
                match current {
                    Some(m) if m.end == prompt_end => {
                        // Same prompt, possibly new input text.
                        self.state = ShellState::Idle {
                            prompt_start: m.start,
                            prompt_end: m.end,
                        };
                        let firm = snapshot.cursor.visible;
                        Some(Continuation {
                            events: vec![SceneEvent::InputChanged {
                                active: true,
                                text: m.input_text,
                            }],
                            firm,
                        })
                    }
                    _ => {
                        // The prompt moved or disappeared: the command line
                        // was submitted.
                        let mut events = vec![SceneEvent::InputChanged {
                            active: false,
                            text: String::new(),
                        }];
                        if prompt_start >= snapshot.lines_start() {
                            events.push(SceneEvent::MessageCreated {
                                style: MessageStyle::Block,
                                content: snapshot.collect_lines(prompt_start, prompt_end + 1),
                                echo: Some(true),
                            });
                        }
                        let firm = self.running_step(snapshot, prompt_end + 1, &mut events);
                        Some(Continuation { events, firm })
                    }
                }
            }
            ShellState::Running { emitted_up_to } => {
                let mut events = Vec::new();
                let firm = self.running_step(snapshot, emitted_up_to, &mut events);
                Some(Continuation { events, firm })
            }
        }
    }
}
