// Dialogue sequencing for the overlay panel.
use bevy::prelude::*;
use serde::Deserialize;

use crate::script::StageCue;

/// One line of scripted dialogue. A line without text is a stage direction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DialogueLine {
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl DialogueLine {
    pub fn said(speaker: &str, text: &str) -> Self {
        Self {
            speaker: Some(speaker.to_string()),
            text: Some(text.to_string()),
            action: None,
        }
    }

    pub fn action(action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ..default()
        }
    }

    /// `speaker: ` prefix when there is a speaker, then the text, or the
    /// action in parentheses when there is no text.
    pub fn render(&self) -> String {
        let mut out = present(&self.speaker)
            .map(|speaker| format!("{speaker}: "))
            .unwrap_or_default();
        if let Some(text) = present(&self.text) {
            out.push_str(text);
        } else if let Some(action) = present(&self.action) {
            out.push_str(&format!("({action})"));
        }
        out
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Text slot the panel reads from. The runner writes, the UI renders.
#[derive(Resource, Debug, Default)]
pub struct TextSurface {
    text: String,
    visible: bool,
}

impl TextSurface {
    pub fn show(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, PartialEq)]
pub enum Advance {
    /// No dialogue is running.
    Idle,
    /// The next line is now on the surface.
    Line,
    /// The last line was dismissed. Carries the completion cue, if any.
    Finished(Option<StageCue>),
}

#[derive(Resource, Debug, Default)]
pub struct DialogueRunner {
    lines: Vec<DialogueLine>,
    index: usize,
    active: bool,
    on_complete: Option<StageCue>,
}

impl DialogueRunner {
    /// Begins a new sequence, replacing any running one, and shows its first line.
    pub fn start(
        &mut self,
        lines: Vec<DialogueLine>,
        on_complete: Option<StageCue>,
        surface: &mut TextSurface,
    ) {
        self.lines = lines;
        self.index = 0;
        self.active = true;
        self.on_complete = on_complete;
        if let Some(line) = self.lines.first() {
            surface.show(line.render());
        }
    }

    pub fn advance(&mut self, surface: &mut TextSurface) -> Advance {
        if !self.active {
            return Advance::Idle;
        }
        self.index += 1;
        if let Some(line) = self.lines.get(self.index) {
            surface.show(line.render());
            return Advance::Line;
        }
        self.active = false;
        surface.hide();
        Advance::Finished(self.on_complete.take())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
