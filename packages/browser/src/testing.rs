//! In-memory [`RenderSession`] for tests.
//!
//! Pages are registered by URL. Loading a URL puts a copy of its page into
//! the active context; clicking an element with an `on_click` page swaps
//! that page in, which is enough to model tab-switching listings.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::{ClickMode, ContextId, ElementHandle, RenderSession, SessionError};

const BLANK_MARKUP: &str = "<html><head></head><body></body></html>";

/// A canned rendered page.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    /// Markup returned by `current_markup`.
    pub markup: String,
    /// Selectors that `wait_for` reports as present.
    pub ready: BTreeSet<String>,
    /// Elements returned by `find_all`, keyed by selector.
    pub elements: BTreeMap<String, Vec<FakeElement>>,
}

impl FakePage {
    #[must_use]
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            ..Self::default()
        }
    }

    /// Marks `selector` as present for `wait_for`.
    #[must_use]
    pub fn with_ready(mut self, selector: impl Into<String>) -> Self {
        self.ready.insert(selector.into());
        self
    }

    /// Appends an element to `selector`'s matches.
    #[must_use]
    pub fn with_element(mut self, selector: impl Into<String>, element: FakeElement) -> Self {
        self.elements.entry(selector.into()).or_default().push(element);
        self
    }
}

/// A canned element.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    /// Page shown in the active context after a successful click.
    pub on_click: Option<FakePage>,
}

impl FakeElement {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn on_click(mut self, page: FakePage) -> Self {
        self.on_click = Some(page);
        self
    }
}

/// One recorded click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRecord {
    pub selector: String,
    pub index: usize,
    pub mode: ClickMode,
    pub succeeded: bool,
}

/// Scriptable [`RenderSession`].
#[derive(Debug)]
pub struct FakeSession {
    pages: BTreeMap<String, FakePage>,
    contexts: Vec<(ContextId, Option<FakePage>)>,
    primary: ContextId,
    active: ContextId,
    next_id: usize,
    loads: Vec<String>,
    clicks: Vec<ClickRecord>,
    waits: Vec<String>,
    opened: usize,
    closed: Vec<ContextId>,
    activations: Vec<ContextId>,
    timezone: Option<String>,
    fail_script_click: bool,
    fail_pointer_click: bool,
    fail_open_context: bool,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            contexts: vec![(ContextId(0), None)],
            primary: ContextId(0),
            active: ContextId(0),
            next_id: 1,
            loads: Vec::new(),
            clicks: Vec::new(),
            waits: Vec::new(),
            opened: 0,
            closed: Vec::new(),
            activations: Vec::new(),
            timezone: None,
            fail_script_click: false,
            fail_pointer_click: false,
            fail_open_context: false,
        }
    }

    /// Registers the page served for `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: FakePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Script-delivered clicks fail.
    #[must_use]
    pub const fn failing_script_click(mut self) -> Self {
        self.fail_script_click = true;
        self
    }

    /// Pointer-delivered clicks fail.
    #[must_use]
    pub const fn failing_pointer_click(mut self) -> Self {
        self.fail_pointer_click = true;
        self
    }

    /// `open_context` fails.
    #[must_use]
    pub const fn failing_open_context(mut self) -> Self {
        self.fail_open_context = true;
        self
    }

    /// URLs loaded so far, in order.
    #[must_use]
    pub fn loads(&self) -> &[String] {
        &self.loads
    }

    #[must_use]
    pub fn clicks(&self) -> &[ClickRecord] {
        &self.clicks
    }

    /// Selectors waited for, in order.
    #[must_use]
    pub fn waits(&self) -> &[String] {
        &self.waits
    }

    /// Number of secondary contexts opened.
    #[must_use]
    pub const fn open_context_count(&self) -> usize {
        self.opened
    }

    #[must_use]
    pub fn closed_contexts(&self) -> &[ContextId] {
        &self.closed
    }

    /// Contexts brought to the front, in order.
    #[must_use]
    pub fn activations(&self) -> &[ContextId] {
        &self.activations
    }

    /// Contexts still open, primary included.
    #[must_use]
    pub fn live_context_count(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    fn page_mut(&mut self) -> Result<&mut Option<FakePage>, SessionError> {
        let active = self.active;
        self.contexts
            .iter_mut()
            .find(|(id, _)| *id == active)
            .map(|(_, page)| page)
            .ok_or(SessionError::UnknownContext(active))
    }

    fn page(&self) -> Result<Option<&FakePage>, SessionError> {
        self.contexts
            .iter()
            .find(|(id, _)| *id == self.active)
            .map(|(_, page)| page.as_ref())
            .ok_or(SessionError::UnknownContext(self.active))
    }

    fn element(&self, handle: &ElementHandle) -> Result<&FakeElement, SessionError> {
        self.page()?
            .and_then(|page| page.elements.get(&handle.selector))
            .and_then(|elements| elements.get(handle.index))
            .ok_or_else(|| SessionError::StaleElement {
                selector: handle.selector.clone(),
                index: handle.index,
            })
    }
}

impl RenderSession for FakeSession {
    fn load(&mut self, url: &str) -> Result<(), SessionError> {
        self.loads.push(url.to_owned());
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| SessionError::Navigation {
                url: url.to_owned(),
                message: "no such page".to_owned(),
            })?;
        *self.page_mut()? = Some(page);
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool, SessionError> {
        self.waits.push(selector.to_owned());
        Ok(self.page()?.is_some_and(|page| {
            page.ready.contains(selector)
                || page.elements.get(selector).is_some_and(|e| !e.is_empty())
        }))
    }

    fn current_markup(&mut self) -> Result<String, SessionError> {
        Ok(self
            .page()?
            .map_or_else(|| BLANK_MARKUP.to_owned(), |page| page.markup.clone()))
    }

    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError> {
        Ok(self
            .page()?
            .and_then(|page| page.elements.get(selector))
            .map(|elements| {
                elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| ElementHandle {
                        selector: selector.to_owned(),
                        index,
                        text: element.text.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(self.element(element)?.attributes.get(name).cloned())
    }

    fn scroll_into_view(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.element(element).map(|_| ())
    }

    fn click(&mut self, element: &ElementHandle, mode: ClickMode) -> Result<(), SessionError> {
        let fails = match mode {
            ClickMode::Script => self.fail_script_click,
            ClickMode::Pointer => self.fail_pointer_click,
        };
        let result = match self.element(element).map(|e| e.on_click.clone()) {
            Err(e) => Err(e),
            Ok(_) if fails => Err(SessionError::Script(format!("{mode:?} click rejected"))),
            Ok(Some(page)) => self.page_mut().map(|current| *current = Some(page)),
            Ok(None) => Ok(()),
        };
        self.clicks.push(ClickRecord {
            selector: element.selector.clone(),
            index: element.index,
            mode,
            succeeded: result.is_ok(),
        });
        result
    }

    fn open_context(&mut self) -> Result<ContextId, SessionError> {
        if self.fail_open_context {
            return Err(SessionError::Tab("cannot open tab".to_owned()));
        }
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.opened += 1;
        self.contexts.push((id, None));
        Ok(id)
    }

    fn close_context(&mut self, id: ContextId) -> Result<(), SessionError> {
        if id == self.primary {
            return Err(SessionError::PrimaryContext);
        }
        let position = self
            .contexts
            .iter()
            .position(|(cid, _)| *cid == id)
            .ok_or(SessionError::UnknownContext(id))?;
        self.contexts.remove(position);
        self.closed.push(id);
        if self.active == id {
            self.active = self.primary;
            self.activations.push(self.primary);
        }
        Ok(())
    }

    fn switch_context(&mut self, id: ContextId) -> Result<(), SessionError> {
        if !self.contexts.iter().any(|(cid, _)| *cid == id) {
            return Err(SessionError::UnknownContext(id));
        }
        self.active = id;
        self.activations.push(id);
        Ok(())
    }

    fn active_context(&self) -> ContextId {
        self.active
    }

    fn primary_context(&self) -> ContextId {
        self.primary
    }

    fn set_timezone(&mut self, timezone_id: &str) -> Result<(), SessionError> {
        self.timezone = Some(timezone_id.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_swaps_in_target_page() {
        let after = FakePage::new("<p>after</p>");
        let before = FakePage::new("<p>before</p>")
            .with_element("a.tab", FakeElement::new("tab").on_click(after));
        let mut session = FakeSession::new().with_page("https://a.test/", before);

        session.load("https://a.test/").unwrap();
        let tab = session.find("a.tab").unwrap().unwrap();
        session.click(&tab, ClickMode::Script).unwrap();

        assert_eq!(session.current_markup().unwrap(), "<p>after</p>");
        assert!(session.clicks()[0].succeeded);
    }

    #[test]
    fn failing_click_is_recorded() {
        let page = FakePage::new("").with_element("a", FakeElement::new("x"));
        let mut session = FakeSession::new()
            .with_page("https://a.test/", page)
            .failing_script_click();

        session.load("https://a.test/").unwrap();
        let a = session.find("a").unwrap().unwrap();

        assert!(session.click(&a, ClickMode::Script).is_err());
        assert!(session.click(&a, ClickMode::Pointer).is_ok());
        assert!(!session.clicks()[0].succeeded);
    }

    #[test]
    fn contexts_have_separate_pages() {
        let mut session =
            FakeSession::new().with_page("https://a.test/", FakePage::new("<p>a</p>"));
        session.load("https://a.test/").unwrap();

        let secondary = session.open_context().unwrap();
        session.switch_context(secondary).unwrap();
        assert_eq!(session.current_markup().unwrap(), BLANK_MARKUP);

        session.close_context(secondary).unwrap();
        assert_eq!(session.active_context(), session.primary_context());
        assert_eq!(
            session.activations(),
            [secondary, session.primary_context()]
        );
        assert_eq!(session.current_markup().unwrap(), "<p>a</p>");
        assert!(matches!(
            session.close_context(session.primary_context()),
            Err(SessionError::PrimaryContext)
        ));
    }

    #[test]
    fn wait_for_uses_ready_set_and_elements() {
        let page = FakePage::new("")
            .with_ready("#grid")
            .with_element("td", FakeElement::new("cell"));
        let mut session = FakeSession::new().with_page("https://a.test/", page);
        session.load("https://a.test/").unwrap();

        assert!(session.wait_for("#grid", Duration::ZERO).unwrap());
        assert!(session.wait_for("td", Duration::ZERO).unwrap());
        assert!(!session.wait_for(".missing", Duration::ZERO).unwrap());
    }
}
