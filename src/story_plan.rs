use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What the story model is asked to return: a title plus the narration
/// split into paragraphs, one narrated segment per paragraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryPlan {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl StoryPlan {
    pub fn from_json(text: &str) -> Result<Self> {
        let plan: StoryPlan =
            serde_json::from_str(text).with_context(|| "Failed to parse story plan JSON")?;
        Ok(plan)
    }

    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let plan = StoryPlan::from_json(
            r#"{"title":"The Lighthouse","paragraphs":["One.","Two."]}"#,
        )
        .unwrap();
        assert_eq!(plan.title, "The Lighthouse");
        assert_eq!(plan.paragraphs.len(), 2);
        assert_eq!(plan.full_text(), "One.\n\nTwo.");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(StoryPlan::from_json("{\"title\":").is_err());
    }
}
