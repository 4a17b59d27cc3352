// Narrative tables: dialogue lines and the initial story flags.
//
// Both tables are compiled into the binary so the web build never has to
// fetch them before the first stage starts.
use std::collections::HashMap;

use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::dialogue::DialogueLine;
use crate::flags::Flags;

const DIALOGUE_JSON: &str = include_str!("../assets/data/dialogue.json");
const FLAGS_JSON: &str = include_str!("../assets/data/flags.json");

pub struct ContentPlugin;

impl Plugin for ContentPlugin {
    fn build(&self, app: &mut App) {
        // The story cannot run without its script, so a broken table is fatal at boot.
        let story = match parse_story(DIALOGUE_JSON) {
            Ok(story) => story,
            Err(err) => {
                error!("{err}");
                panic!("{err}");
            }
        };
        let seed = match parse_flags(FLAGS_JSON) {
            Ok(seed) => seed,
            Err(err) => {
                error!("{err}");
                panic!("{err}");
            }
        };
        app.insert_resource(story).insert_resource(Flags::new(&seed));
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("dialogue table is malformed: {0}")]
    Dialogue(#[source] serde_json::Error),
    #[error("initial flag table is malformed: {0}")]
    Flags(#[source] serde_json::Error),
}

/// Every line and hint the stages show, keyed by where it is used.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryText {
    pub prologue: Vec<DialogueLine>,
    pub prologue_hint: String,
    pub prologue_instruction: String,
    pub move_in_together: Vec<DialogueLine>,
    pub move_in_hint: String,
    pub home_build_hint: String,
    pub home_build_complete: String,
    pub home_build_enter: String,
    pub megabyte_join_hint: String,
    pub megabyte_welcome: String,
    pub health_hint: String,
    pub health_complete: String,
    pub crossroad_hint: String,
    pub crossroad_farewell: String,
    pub last_tile_instruction: String,
    pub proposal: Vec<DialogueLine>,
}

pub fn parse_story(json: &str) -> Result<StoryText, ContentError> {
    serde_json::from_str(json).map_err(ContentError::Dialogue)
}

pub fn parse_flags(json: &str) -> Result<HashMap<String, bool>, ContentError> {
    serde_json::from_str(json).map_err(ContentError::Flags)
}
