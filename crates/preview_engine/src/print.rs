use std::time::Duration;

use preview_logging::preview_info;

use crate::document::{DecodedDocument, Viewport};
use crate::{FailureKind, LoadError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintRequest {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReceipt {
    pub uri: String,
}

/// Native print facility that accepts a document URI.
#[async_trait::async_trait]
pub trait PrintBinding: Send + Sync {
    async fn print(&self, request: PrintRequest) -> Result<PrintReceipt, LoadError>;
}

/// Stands in for a native print dialog: logs the request, waits, and
/// reports success.
#[derive(Debug, Clone)]
pub struct SimulatedPrintBinding {
    delay: Duration,
}

impl SimulatedPrintBinding {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedPrintBinding {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait::async_trait]
impl PrintBinding for SimulatedPrintBinding {
    async fn print(&self, request: PrintRequest) -> Result<PrintReceipt, LoadError> {
        if request.uri.trim().is_empty() {
            return Err(LoadError::new(FailureKind::InvalidUrl, "nothing to print"));
        }
        preview_info!("Printing document from {}", request.uri);
        tokio::time::sleep(self.delay).await;
        preview_info!(
            "Document would be printed from {}; a native host would show its print dialog",
            request.uri
        );
        Ok(PrintReceipt { uri: request.uri })
    }
}

/// Every page of a document laid out for printing, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintPlan {
    pub pages: Vec<PlannedPage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPage {
    pub number: u32,
    pub viewport: Viewport,
}

impl PrintPlan {
    pub fn for_document(document: &dyn DecodedDocument, scale: f32) -> Result<Self, LoadError> {
        let pages = (1..=document.page_count())
            .map(|number| {
                document.page(number).map(|page| PlannedPage {
                    number,
                    viewport: page.viewport(scale),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { pages })
    }

    pub fn title(&self) -> String {
        format!("Print PDF - {} pages", self.pages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::pdf_with_pages;
    use crate::document::{DocumentDecoder, LopdfDecoder, DEFAULT_RENDER_SCALE};

    #[test]
    fn plan_covers_every_page_in_order() {
        let doc = LopdfDecoder.decode(&pdf_with_pages(3)).unwrap();
        let plan = PrintPlan::for_document(doc.as_ref(), DEFAULT_RENDER_SCALE).unwrap();
        let numbers: Vec<_> = plan.pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(plan.pages[0].viewport.width_px, 918);
        assert_eq!(plan.pages[2].viewport.height_px, 648);
        assert_eq!(plan.title(), "Print PDF - 3 pages");
    }

    #[tokio::test]
    async fn simulated_binding_echoes_uri() {
        let binding = SimulatedPrintBinding::new(Duration::from_millis(1));
        let receipt = binding
            .print(PrintRequest {
                uri: "https://labels.example.com/a.pdf".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.uri, "https://labels.example.com/a.pdf");
    }

    #[tokio::test]
    async fn simulated_binding_rejects_empty_uri() {
        let binding = SimulatedPrintBinding::new(Duration::ZERO);
        let err = binding
            .print(PrintRequest { uri: "  ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidUrl);
    }
}
