//! [`RenderSession`] over a headless Chrome instance.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};

use crate::config::SessionConfig;
use crate::{ClickMode, ContextId, ElementHandle, RenderSession, SessionError};

/// How long Chrome may sit without CDP traffic before `headless_chrome`
/// considers it dead. Detail lookups and pacing sleeps can be long.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// A Chrome instance with one primary tab and any number of secondary tabs.
pub struct ChromeSession {
    browser: Browser,
    config: SessionConfig,
    contexts: Vec<(ContextId, Arc<Tab>)>,
    primary: ContextId,
    active: ContextId,
    next_id: usize,
}

impl ChromeSession {
    /// Launches Chrome and opens the primary tab with the configured
    /// identity applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Launch`] if Chrome cannot be started and
    /// [`SessionError::Configuration`] if an identity override is rejected.
    pub fn launch(config: SessionConfig) -> Result<Self, SessionError> {
        let lang_arg = config.locale.as_ref().map(|l| format!("--lang={l}"));

        let mut args: Vec<&OsStr> = Vec::new();
        if let Some(ref lang) = lang_arg {
            args.push(OsStr::new(lang));
        }
        for flag in &config.chrome_flags {
            args.push(OsStr::new(flag));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            .path(config.chrome_path.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| SessionError::Launch(e.to_string()))?;

        log::debug!(
            "Chrome launched (headless={}, timezone={:?}, locale={:?})",
            config.headless,
            config.timezone,
            config.locale,
        );

        let mut session = Self {
            browser,
            config,
            contexts: Vec::new(),
            primary: ContextId(0),
            active: ContextId(0),
            next_id: 0,
        };

        let primary = session.create_context()?;
        session.primary = primary;
        session.active = primary;

        Ok(session)
    }

    /// The configuration the session was launched with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn create_context(&mut self) -> Result<ContextId, SessionError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| SessionError::Tab(e.to_string()))?;
        tab.set_default_timeout(self.config.navigation_timeout);
        self.apply_identity(&tab)?;

        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.contexts.push((id, tab));
        Ok(id)
    }

    fn apply_identity(&self, tab: &Tab) -> Result<(), SessionError> {
        if let Some(ref user_agent) = self.config.user_agent {
            tab.set_user_agent(user_agent, self.config.locale.as_deref(), None)
                .map_err(|e| SessionError::Configuration(format!("user agent: {e}")))?;
        }
        if let Some(ref locale) = self.config.locale {
            tab.call_method(Emulation::SetLocaleOverride {
                locale: Some(locale.clone()),
            })
            .map_err(|e| SessionError::Configuration(format!("locale {locale}: {e}")))?;
        }
        if let Some(ref timezone) = self.config.timezone {
            tab.call_method(Emulation::SetTimezoneOverride {
                timezone_id: timezone.clone(),
            })
            .map_err(|e| SessionError::Configuration(format!("timezone {timezone}: {e}")))?;
        }
        Ok(())
    }

    fn tab(&self, id: ContextId) -> Result<Arc<Tab>, SessionError> {
        self.contexts
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, tab)| Arc::clone(tab))
            .ok_or(SessionError::UnknownContext(id))
    }

    fn active_tab(&self) -> Result<Arc<Tab>, SessionError> {
        self.tab(self.active)
    }

    /// Re-resolves a handle against the active tab and runs `f` on it.
    fn with_element<R>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&Element<'_>) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let tab = self.active_tab()?;
        let elements = tab.find_elements(&handle.selector).unwrap_or_default();
        let element = elements
            .get(handle.index)
            .ok_or_else(|| SessionError::StaleElement {
                selector: handle.selector.clone(),
                index: handle.index,
            })?;
        f(element)
    }
}

impl RenderSession for ChromeSession {
    fn load(&mut self, url: &str) -> Result<(), SessionError> {
        log::debug!("Browser navigating to: {url}");
        let tab = self.active_tab()?;
        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| SessionError::Navigation {
                url: url.to_owned(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError> {
        let tab = self.active_tab()?;
        match tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                log::debug!("Gave up waiting for '{selector}' after {timeout:?}: {e}");
                Ok(false)
            }
        }
    }

    fn current_markup(&mut self) -> Result<String, SessionError> {
        self.active_tab()?
            .get_content()
            .map_err(|e| SessionError::Markup(e.to_string()))
    }

    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError> {
        let tab = self.active_tab()?;
        // `find_elements` reports "nothing matched" as an error.
        let elements = match tab.find_elements(selector) {
            Ok(elements) => elements,
            Err(e) => {
                log::debug!("No elements for '{selector}': {e}");
                return Ok(Vec::new());
            }
        };

        Ok(elements
            .iter()
            .enumerate()
            .map(|(index, element)| ElementHandle {
                selector: selector.to_owned(),
                index,
                text: element.get_inner_text().unwrap_or_default(),
            })
            .collect())
    }

    fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.with_element(element, |el| {
            let result = el
                .call_js_fn(
                    "function(name) { return this.getAttribute(name); }",
                    vec![serde_json::Value::String(name.to_owned())],
                    false,
                )
                .map_err(|e| SessionError::Script(e.to_string()))?;
            Ok(result
                .value
                .and_then(|v| v.as_str().map(ToOwned::to_owned)))
        })
    }

    fn scroll_into_view(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.with_element(element, |el| {
            el.call_js_fn(
                "function() { this.scrollIntoView({block: 'center'}); }",
                vec![],
                false,
            )
            .map_err(|e| SessionError::Script(format!("Scroll failed: {e}")))?;
            Ok(())
        })
    }

    fn click(&mut self, element: &ElementHandle, mode: ClickMode) -> Result<(), SessionError> {
        self.with_element(element, |el| match mode {
            ClickMode::Script => el
                .call_js_fn("function() { this.click(); }", vec![], false)
                .map(|_| ())
                .map_err(|e| SessionError::Script(format!("Click failed: {e}"))),
            ClickMode::Pointer => el
                .click()
                .map(|_| ())
                .map_err(|e| SessionError::Script(format!("Pointer click failed: {e}"))),
        })
    }

    fn open_context(&mut self) -> Result<ContextId, SessionError> {
        let id = self.create_context()?;
        log::debug!("Opened {id}");
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
        let (_, tab) = self.contexts.remove(position);
        let closed = tab
            .close(true)
            .map(|_| ())
            .map_err(|e| SessionError::Tab(format!("closing {id}: {e}")));

        // Chrome does not bring another tab to the front on its own.
        if self.active == id {
            self.active = self.primary;
            self.switch_context(self.primary)?;
        }

        closed?;
        log::debug!("Closed {id}");
        Ok(())
    }

    fn switch_context(&mut self, id: ContextId) -> Result<(), SessionError> {
        let tab = self.tab(id)?;
        tab.activate()
            .map_err(|e| SessionError::Tab(format!("activating {id}: {e}")))?;
        self.active = id;
        Ok(())
    }

    fn active_context(&self) -> ContextId {
        self.active
    }

    fn primary_context(&self) -> ContextId {
        self.primary
    }

    fn set_timezone(&mut self, timezone_id: &str) -> Result<(), SessionError> {
        for (_, tab) in &self.contexts {
            tab.call_method(Emulation::SetTimezoneOverride {
                timezone_id: timezone_id.to_owned(),
            })
            .map_err(|e| SessionError::Configuration(format!("timezone {timezone_id}: {e}")))?;
        }
        self.config.timezone = Some(timezone_id.to_owned());
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Chrome itself is shut down when `Browser` drops.
        log::debug!("Chrome session dropped ({} context(s) open)", self.contexts.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn launches_and_reads_markup() {
        let mut session = ChromeSession::launch(SessionConfig::default()).unwrap();
        session.load("https://example.com").unwrap();
        assert!(session.wait_for("h1", Duration::from_secs(10)).unwrap());
        assert!(session.current_markup().unwrap().contains("Example"));
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn secondary_context_round_trip() {
        let mut session = ChromeSession::launch(SessionConfig::default()).unwrap();
        let primary = session.primary_context();
        session.load("https://example.com").unwrap();

        let secondary = session.open_context().unwrap();
        session.switch_context(secondary).unwrap();
        assert_eq!(session.active_context(), secondary);
        session.load("about:blank").unwrap();

        session.close_context(secondary).unwrap();
        assert_eq!(session.active_context(), primary);
        assert!(session.current_markup().unwrap().contains("Example"));
        let visible = session
            .tab(primary)
            .unwrap()
            .evaluate("document.visibilityState", false)
            .unwrap()
            .value;
        assert_eq!(visible, Some(serde_json::Value::String("visible".to_owned())));
        assert!(matches!(
            session.close_context(primary),
            Err(SessionError::PrimaryContext)
        ));
    }
}
