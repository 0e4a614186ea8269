// ABOUTME: Demo vision provider returning a fixed stub label without external calls
// ABOUTME: Keeps the full analysis pipeline runnable in development and tests

use async_trait::async_trait;
use tracing::debug;

use super::{PortionHint, VisionProvider};
use crate::errors::AppResult;
use crate::models::Label;

/// Stub provider used when no LLM endpoint is configured
///
/// Returns one `food` label at confidence 0.5 so the rest of the pipeline
/// (portioning, resolution, composition, persistence) runs end to end.
pub struct DemoVisionProvider {
    scripted: Option<Vec<Label>>,
}

impl DemoVisionProvider {
    /// Create the stub provider
    #[must_use]
    pub const fn new() -> Self {
        Self { scripted: None }
    }

    /// Replace the stub output with a fixed script
    ///
    /// An empty script makes the extractor report no detections.
    #[must_use]
    pub const fn with_labels(labels: Vec<Label>) -> Self {
        Self {
            scripted: Some(labels),
        }
    }
}

impl Default for DemoVisionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionProvider for DemoVisionProvider {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn display_name(&self) -> &'static str {
        "Demo stub"
    }

    async fn extract_labels(&self, _image: &[u8]) -> AppResult<Vec<Label>> {
        if let Some(labels) = &self.scripted {
            debug!("Demo provider returning {} scripted labels", labels.len());
            return Ok(labels.clone());
        }
        debug!("Demo provider returning stub label");
        Ok(vec![Label {
            name: "food".to_owned(),
            confidence: 0.5,
            region: None,
        }])
    }

    async fn portion_hints(&self, _image: &[u8], _labels: &[Label]) -> AppResult<Vec<PortionHint>> {
        // No hints; the estimator fills every label from its rule table
        Ok(Vec::new())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_label_is_stable() {
        let provider = DemoVisionProvider::new();
        let labels = provider.extract_labels(&[1, 2, 3]).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "food");
        assert_eq!(labels[0].confidence, 0.5);
    }

    #[tokio::test]
    async fn stub_returns_no_portion_hints() {
        let provider = DemoVisionProvider::new();
        let hints = provider.portion_hints(&[1, 2, 3], &[]).await.unwrap();
        assert!(hints.is_empty());
    }

    #[tokio::test]
    async fn script_overrides_the_stub() {
        let provider = DemoVisionProvider::with_labels(vec![Label {
            name: "banana".to_owned(),
            confidence: 0.9,
            region: None,
        }]);
        let labels = provider.extract_labels(&[1, 2, 3]).await.unwrap();
        assert_eq!(labels[0].name, "banana");

        let empty = DemoVisionProvider::with_labels(Vec::new());
        assert!(empty.extract_labels(&[1, 2, 3]).await.unwrap().is_empty());
    }
}
