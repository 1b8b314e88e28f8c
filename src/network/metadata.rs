use serde::{Deserialize, Serialize};

/// Optional annotations attached to a saved run.
/// All fields are `Option` so configs written without metadata still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    /// Class names for the score columns, e.g. `["control", "case"]`.
    pub output_labels: Option<Vec<String>>,
}

impl ModelMetadata {
    /// Name for class `index`, falling back to the index itself.
    pub fn label(&self, index: usize) -> String {
        self.output_labels
            .as_ref()
            .and_then(|labels| labels.get(index).cloned())
            .unwrap_or_else(|| index.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_index() {
        let meta = ModelMetadata { description: None, output_labels: Some(vec!["neg".into()]) };
        assert_eq!(meta.label(0), "neg");
        assert_eq!(meta.label(1), "1");
    }
}
