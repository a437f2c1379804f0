//! Render session identity and launch configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default desktop user agent presented to schedule sites.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for a [`crate::ChromeSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run Chrome without a window.
    pub headless: bool,

    /// Browser window size. Schedule grids lay out differently on narrow
    /// viewports, so this defaults to a full desktop size.
    pub window_size: (u32, u32),

    /// User agent override.
    pub user_agent: Option<String>,

    /// Locale override (e.g. `ja-JP`), also sent as `Accept-Language`.
    pub locale: Option<String>,

    /// IANA timezone the page's JavaScript should see.
    pub timezone: Option<String>,

    /// Upper bound for a single navigation.
    pub navigation_timeout: Duration,

    /// Chrome executable; `None` lets `headless_chrome` find one.
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome flags.
    pub chrome_flags: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            locale: None,
            timezone: None,
            navigation_timeout: Duration::from_secs(30),
            chrome_path: None,
            chrome_flags: vec![
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--disable-extensions".to_string(),
            ],
        }
    }
}

impl SessionConfig {
    /// Sets the identity a schedule source expects to see.
    #[must_use]
    pub fn with_identity(
        mut self,
        timezone: &str,
        locale: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        self.timezone = Some(timezone.to_owned());
        if let Some(locale) = locale {
            self.locale = Some(locale.to_owned());
        }
        if let Some(user_agent) = user_agent {
            self.user_agent = Some(user_agent.to_owned());
        }
        self
    }

    /// A visible browser window, useful when a selector stops matching.
    #[must_use]
    pub fn debug_mode() -> Self {
        Self {
            headless: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_headless_desktop() {
        let config = SessionConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_size, (1920, 1080));
        assert!(config.user_agent.is_some());
        assert!(config.timezone.is_none());
    }

    #[test]
    fn identity_overrides_only_given_fields() {
        let config = SessionConfig::default().with_identity("Asia/Tokyo", Some("ja-JP"), None);
        assert_eq!(config.timezone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(config.locale.as_deref(), Some("ja-JP"));
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn debug_mode_shows_window() {
        assert!(!SessionConfig::debug_mode().headless);
    }
}
