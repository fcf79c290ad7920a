use serde::{Deserialize, Serialize};

use crate::models::{CatalogueVersionId, QuestionId};

/// One question in a catalogue version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub catalogue_version: CatalogueVersionId,
    /// Display/iteration order within the catalogue.
    pub order: u32,
    pub max_score: f64,
    pub prompt: String,
    /// Grading rubric handed to the external grader.
    pub rubric: String,
}

impl Question {
    pub fn new(
        catalogue_version: CatalogueVersionId,
        order: u32,
        max_score: f64,
        prompt: impl Into<String>,
        rubric: impl Into<String>,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            catalogue_version,
            order,
            max_score,
            prompt: prompt.into(),
            rubric: rubric.into(),
        }
    }
}
