//! Remote browser session. [`PageDriver`] is the capability set the rest of
//! the crate drives; the concrete implementation lives in [`chromium`].

pub mod chromium;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod selector;
pub mod wait;

pub use chromium::ChromiumSession;
pub use error::BrowserError;
pub use selector::Selector;
pub use wait::Condition;

use serde_json::Value;

/// Page-level operations against one browser tab.
///
/// Exactly one value implementing this trait exists per run and it is owned
/// by the orchestration loop; components receive it by reference.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Send + Sync;

    /// Load `url` and wait for the navigation to settle.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// All elements matching `selector`, in document order. An empty list
    /// means "no match"; this never fails for a missing element.
    async fn find_all(&self, selector: &Selector) -> Vec<Self::Element>;

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Rendered text of the element, untrimmed.
    async fn text(&self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool, BrowserError>;

    async fn is_enabled(&self, element: &Self::Element) -> Result<bool, BrowserError>;

    /// The `checked` property of an input element.
    async fn is_checked(&self, element: &Self::Element) -> Result<bool, BrowserError>;

    /// Native click. Fails with [`BrowserError::InteractionBlocked`] when
    /// another element (an overlay, a sticky header) would receive it.
    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    /// `element.click()` executed in page context, bypassing hit testing.
    async fn script_click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), BrowserError>;

    /// Evaluate `code` in the page and return its JSON-serialisable result
    /// (`Value::Null` for `undefined`).
    async fn run_script(&self, code: &str) -> Result<Value, BrowserError>;

    /// Release the session. Safe to call repeatedly.
    async fn close(&self);
}

/// Click with a script fallback when the native click is intercepted.
pub async fn click_with_fallback<P>(page: &P, element: &P::Element) -> Result<(), BrowserError>
where
    P: PageDriver + ?Sized,
{
    match page.click(element).await {
        Ok(()) => Ok(()),
        Err(BrowserError::InteractionBlocked(target)) => {
            tracing::debug!(target = %target, "click intercepted, retrying via script");
            page.script_click(element).await
        }
        Err(e) => Err(e),
    }
}

/// First non-empty trimmed text among the elements matched by `cascade`,
/// trying selectors in order.
pub async fn first_text<P>(page: &P, cascade: &[Selector]) -> Option<String>
where
    P: PageDriver + ?Sized,
{
    for selector in cascade {
        for element in page.find_all(selector).await {
            if let Ok(text) = page.text(&element).await {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}
