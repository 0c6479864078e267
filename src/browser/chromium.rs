use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserError, PageDriver, Selector};

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

const IS_VISIBLE_FN: &str = "function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    return style.display !== 'none'
        && style.visibility !== 'hidden'
        && parseFloat(style.opacity || '1') > 0
        && (rect.width > 0 || rect.height > 0);
}";

const IS_ENABLED_FN: &str =
    "function() { return !this.disabled && !this.classList.contains('disabled'); }";

const IS_CHECKED_FN: &str = "function() { return !!this.checked; }";

/// True when the element itself (or a descendant) is the topmost element at
/// its centre point, i.e. a real mouse click would land on it.
const HIT_TEST_FN: &str = "function() {
    const rect = this.getBoundingClientRect();
    const top = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    return top === null || top === this || this.contains(top);
}";

const DESCRIBE_FN: &str = "function() {
    const id = this.id ? '#' + this.id : '';
    const cls = typeof this.className === 'string' && this.className
        ? '.' + this.className.trim().split(/\\s+/).join('.') : '';
    return this.tagName.toLowerCase() + id + cls;
}";

const SCRIPT_CLICK_FN: &str = "function() { this.click(); }";

const SCROLL_INTO_VIEW_FN: &str = "function() { this.scrollIntoView({block: 'center'}); }";

/// Launch parameters for [`ChromiumSession::open`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Absolute directory the browser saves downloads into.
    pub download_dir: PathBuf,
    pub chrome_executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
}

/// A headed Chromium instance driven over the DevTools protocol, with a
/// single page used for the whole run.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    page: Page,
    navigation_timeout: Duration,
}

impl std::fmt::Debug for ChromiumSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumSession")
            .field("navigation_timeout", &self.navigation_timeout)
            .finish_non_exhaustive()
    }
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

impl ChromiumSession {
    /// Launch the browser and configure silent downloads into
    /// `options.download_dir`.
    pub async fn open(options: &SessionOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .with_head()
            .window_size(1400, 1000)
            .request_timeout(options.navigation_timeout)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(exe) = &options.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser event handler error");
                }
            }
        });

        let page = match Self::prepare_page(&browser, &options.download_dir).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        tracing::info!(
            download_dir = %options.download_dir.display(),
            "Browser session ready"
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            page,
            navigation_timeout: options.navigation_timeout,
        })
    }

    async fn prepare_page(browser: &Browser, download_dir: &Path) -> Result<Page, BrowserError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(format!("could not open page: {}", e)))?;

        let params = SetDownloadBehaviorParams {
            behavior: SetDownloadBehaviorBehavior::Allow,
            download_path: Some(download_dir.to_string_lossy().to_string()),
            browser_context_id: None,
            events_enabled: None,
        };
        page.execute(params)
            .await
            .map_err(|e| BrowserError::Launch(format!("could not configure downloads: {}", e)))?;

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await
        {
            tracing::debug!(error = %e, "could not install webdriver shim");
        }

        Ok(page)
    }

    async fn call_bool(&self, element: &Element, function: &str) -> Result<bool, BrowserError> {
        let returns = element.call_js_fn(function, false).await.map_err(protocol)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.browser.lock().await.is_none() {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    async fn describe(&self, element: &Element) -> String {
        match element.call_js_fn(DESCRIBE_FN, false).await {
            Ok(returns) => returns
                .result
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "element".to_string()),
            Err(_) => "element".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromiumSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.ensure_open().await?;
        tracing::debug!(url, "navigating");
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "no response within {}s",
                    self.navigation_timeout.as_secs()
                ),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.ensure_open().await?;
        let url = self.page.url().await.map_err(protocol)?;
        Ok(url.unwrap_or_default())
    }

    async fn find_all(&self, selector: &Selector) -> Vec<Element> {
        let found = match selector {
            Selector::Css(css) => self.page.find_elements(css.as_str()).await,
            Selector::XPath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
        };
        match found {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!(selector = %selector, error = %e, "element query returned nothing");
                Vec::new()
            }
        }
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        element.attribute(name).await.map_err(protocol)
    }

    async fn text(&self, element: &Element) -> Result<String, BrowserError> {
        let text = element.inner_text().await.map_err(protocol)?;
        Ok(text.unwrap_or_default())
    }

    async fn is_visible(&self, element: &Element) -> Result<bool, BrowserError> {
        self.call_bool(element, IS_VISIBLE_FN).await
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool, BrowserError> {
        self.call_bool(element, IS_ENABLED_FN).await
    }

    async fn is_checked(&self, element: &Element) -> Result<bool, BrowserError> {
        self.call_bool(element, IS_CHECKED_FN).await
    }

    async fn click(&self, element: &Element) -> Result<(), BrowserError> {
        self.scroll_into_view(element).await?;
        if !self.call_bool(element, HIT_TEST_FN).await? {
            return Err(BrowserError::InteractionBlocked(self.describe(element).await));
        }
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn script_click(&self, element: &Element) -> Result<(), BrowserError> {
        element
            .call_js_fn(SCRIPT_CLICK_FN, false)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<(), BrowserError> {
        element
            .call_js_fn(SCROLL_INTO_VIEW_FN, false)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(())
    }

    async fn run_script(&self, code: &str) -> Result<Value, BrowserError> {
        self.ensure_open().await?;
        let result = self
            .page
            .evaluate(code)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&self) {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return;
        };
        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "browser close command failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "waiting for browser exit failed");
        }
        if let Some(task) = self.handler.lock().await.take() {
            task.abort();
        }
        tracing::debug!("Browser session closed");
    }
}
