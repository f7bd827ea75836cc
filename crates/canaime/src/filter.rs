//! Blocks heavy resources while the roster page loads.
//!
//! Photos are the bulk of the listing page but only their `src` paths are
//! needed, and those stay in the DOM whether or not the bytes arrive.

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

pub fn should_block(resource_type: &ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Image | ResourceType::Media | ResourceType::Font
    )
}

/// Request interception on one page. Interception stops when dropped.
pub struct ResourceFilter {
    interceptor: JoinHandle<()>,
}

impl ResourceFilter {
    /// Must run before the first navigation on `page`.
    pub async fn install(page: &Page) -> Result<Self, CdpError> {
        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let intercept_page = page.clone();

        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let outcome = if should_block(&event.resource_type) {
                    log::debug!("Blocking {:?}: {}", event.resource_type, event.request.url);
                    intercept_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                } else {
                    intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    log::warn!("Failed to resolve intercepted request {}: {}", event.request.url, e);
                }
            }
        });

        page.execute(EnableParams {
            patterns: Some(vec![RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_type: None,
                request_stage: Some(RequestStage::Request),
            }]),
            handle_auth_requests: None,
        })
        .await?;

        Ok(Self { interceptor })
    }
}

impl Drop for ResourceFilter {
    fn drop(&mut self) {
        self.interceptor.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_images_media_and_fonts() {
        assert!(should_block(&ResourceType::Image));
        assert!(should_block(&ResourceType::Media));
        assert!(should_block(&ResourceType::Font));
    }

    #[test]
    fn test_lets_page_resources_through() {
        for resource_type in [
            ResourceType::Document,
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Xhr,
            ResourceType::Fetch,
            ResourceType::Other,
        ] {
            assert!(
                !should_block(&resource_type),
                "{:?} should not be blocked",
                resource_type
            );
        }
    }
}
