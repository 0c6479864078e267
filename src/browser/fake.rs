//! Scripted in-memory page used by unit tests.
//!
//! Each URL owns a list of elements; an element matches the exact selector
//! strings it was registered with. Shared boolean flags model page state
//! (dialog visible, originals checkbox) so clicks on one element can change
//! what another reports.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;

use super::{BrowserError, PageDriver, Selector};

#[derive(Debug, Clone)]
enum Flagged {
    Fixed(bool),
    Flag(String),
}

#[derive(Debug, Clone)]
pub enum Effect {
    SetFlag(String, bool),
    ToggleFlag(String),
    /// Simulates the server delivering an archive into the download directory.
    WriteFile(PathBuf, Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    selectors: Vec<String>,
    attrs: HashMap<String, String>,
    text: String,
    visible: Flagged,
    enabled: bool,
    checked: Flagged,
    on_class: Option<(String, String)>,
    intercepted: bool,
    effects: Vec<Effect>,
}

impl FakeElement {
    pub fn new(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            attrs: HashMap::new(),
            text: String::new(),
            visible: Flagged::Fixed(true),
            enabled: true,
            checked: Flagged::Fixed(false),
            on_class: None,
            intercepted: false,
            effects: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = Flagged::Fixed(false);
        self
    }

    pub fn visible_when(mut self, flag: &str) -> Self {
        self.visible = Flagged::Flag(flag.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn checked_when(mut self, flag: &str) -> Self {
        self.checked = Flagged::Flag(flag.to_string());
        self
    }

    /// Append `class` to the `class` attribute while `flag` is set.
    pub fn class_when(mut self, flag: &str, class: &str) -> Self {
        self.on_class = Some((flag.to_string(), class.to_string()));
        self
    }

    /// Native clicks fail as if an overlay covered the element.
    pub fn intercepted(mut self) -> Self {
        self.intercepted = true;
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeHandle {
    url: String,
    index: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    pages: HashMap<String, Vec<FakeElement>>,
    flags: HashMap<String, bool>,
    failing_urls: HashSet<String>,
    failing_scripts: bool,
    navigations: Vec<String>,
    scripts: Vec<String>,
    native_clicks: usize,
    script_clicks: usize,
    closes: usize,
}

impl FakeState {
    fn flag(&self, flagged: &Flagged) -> bool {
        match flagged {
            Flagged::Fixed(v) => *v,
            Flagged::Flag(name) => self.flags.get(name).copied().unwrap_or(false),
        }
    }

    fn element(&self, handle: &FakeHandle) -> Result<&FakeElement, BrowserError> {
        if handle.url != self.url {
            return Err(BrowserError::Protocol("stale element reference".into()));
        }
        self.pages
            .get(&handle.url)
            .and_then(|els| els.get(handle.index))
            .ok_or_else(|| BrowserError::Protocol("unknown element".into()))
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SetFlag(name, value) => {
                    self.flags.insert(name, value);
                }
                Effect::ToggleFlag(name) => {
                    let entry = self.flags.entry(name).or_insert(false);
                    *entry = !*entry;
                }
                Effect::WriteFile(path, bytes) => {
                    std::fs::write(&path, bytes).expect("fake page could not write archive");
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        let state = FakeState {
            url: url.to_string(),
            ..FakeState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Add an element to the page currently displayed.
    pub fn add_element(&self, element: FakeElement) {
        let mut state = self.state.lock().unwrap();
        let url = state.url.clone();
        state.pages.entry(url).or_default().push(element);
    }

    pub fn add_element_on(&self, url: &str, element: FakeElement) {
        let mut state = self.state.lock().unwrap();
        state.pages.entry(url.to_string()).or_default().push(element);
    }

    pub fn set_flag(&self, name: &str, value: bool) {
        self.state.lock().unwrap().flags.insert(name.to_string(), value);
    }

    pub fn flag(&self, name: &str) -> bool {
        self.state.lock().unwrap().flags.get(name).copied().unwrap_or(false)
    }

    pub fn fail_navigation_to(&self, url: &str) {
        self.state.lock().unwrap().failing_urls.insert(url.to_string());
    }

    pub fn fail_scripts(&self) {
        self.state.lock().unwrap().failing_scripts = true;
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub fn native_clicks(&self) -> usize {
        self.state.lock().unwrap().native_clicks
    }

    pub fn script_clicks(&self) -> usize {
        self.state.lock().unwrap().script_clicks
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    fn activate(&self, handle: &FakeHandle, native: bool) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        let element = state.element(handle)?;
        if native && element.intercepted {
            return Err(BrowserError::InteractionBlocked(
                element.selectors.first().cloned().unwrap_or_default(),
            ));
        }
        let effects = element.effects.clone();
        if native {
            state.native_clicks += 1;
        } else {
            state.script_clicks += 1;
        }
        state.apply(effects);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageDriver for FakePage {
    type Element = FakeHandle;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.failing_urls.contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_TIMED_OUT".into(),
            });
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn find_all(&self, selector: &Selector) -> Vec<FakeHandle> {
        let state = self.state.lock().unwrap();
        let Some(elements) = state.pages.get(&state.url) else {
            return Vec::new();
        };
        elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.selectors.iter().any(|s| s == selector.as_str()))
            .map(|(index, _)| FakeHandle {
                url: state.url.clone(),
                index,
            })
            .collect()
    }

    async fn attribute(
        &self,
        element: &FakeHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock().unwrap();
        let el = state.element(element)?;
        let mut value = el.attrs.get(name).cloned();
        if name == "class" {
            if let Some((flag, class)) = &el.on_class {
                if state.flags.get(flag).copied().unwrap_or(false) {
                    let base = value.unwrap_or_default();
                    value = Some(format!("{} {}", base, class).trim().to_string());
                }
            }
        }
        Ok(value)
    }

    async fn text(&self, element: &FakeHandle) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.element(element)?.text.clone())
    }

    async fn is_visible(&self, element: &FakeHandle) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        let el = state.element(element)?;
        Ok(state.flag(&el.visible))
    }

    async fn is_enabled(&self, element: &FakeHandle) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.element(element)?.enabled)
    }

    async fn is_checked(&self, element: &FakeHandle) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        let el = state.element(element)?;
        Ok(state.flag(&el.checked))
    }

    async fn click(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        self.activate(element, true)
    }

    async fn script_click(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        self.activate(element, false)
    }

    async fn scroll_into_view(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        state.element(element).map(|_| ())
    }

    async fn run_script(&self, code: &str) -> Result<Value, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.scripts.push(code.to_string());
        if state.failing_scripts {
            return Err(BrowserError::Script("Execution context was destroyed".into()));
        }
        Ok(Value::Null)
    }

    async fn close(&self) {
        self.state.lock().unwrap().closes += 1;
    }
}
