//! Scoped use of a secondary browsing context.
//!
//! Opening a second tab, doing some work in it and coming back is an
//! acquire/use/release block: [`with_secondary_context`] guarantees the
//! secondary context is closed and the original context re-activated on
//! every exit path, including when the work fails.

use crate::{RenderSession, SessionError};

/// Runs `work` inside a freshly opened secondary context.
///
/// The context that was active on entry is active again on return, and the
/// secondary context is closed, whether `work` succeeded or not. Release
/// failures are logged; they never mask the result of `work`.
///
/// # Errors
///
/// Returns [`SessionError`] if the secondary context cannot be opened or
/// switched to, or whatever error `work` returned.
pub fn with_secondary_context<S, R, F>(session: &mut S, work: F) -> Result<R, SessionError>
where
    S: RenderSession + ?Sized,
    F: FnOnce(&mut S) -> Result<R, SessionError>,
{
    let origin = session.active_context();
    let secondary = session.open_context()?;

    let result = match session.switch_context(secondary) {
        Ok(()) => work(session),
        Err(e) => Err(e),
    };

    if let Err(e) = session.close_context(secondary) {
        log::warn!("Failed to close {secondary}: {e}");
    }
    if session.active_context() != origin
        && let Err(e) = session.switch_context(origin)
    {
        log::warn!("Failed to return to {origin}: {e}");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FakeSession};

    #[test]
    fn returns_to_primary_after_success() {
        let mut session =
            FakeSession::new().with_page("https://a.test/d", FakePage::new("<p>x</p>"));
        let primary = session.primary_context();

        let markup = with_secondary_context(&mut session, |s| {
            s.load("https://a.test/d")?;
            s.current_markup()
        })
        .unwrap();

        assert_eq!(markup, "<p>x</p>");
        assert_eq!(session.active_context(), primary);
        assert_eq!(session.activations().last(), Some(&primary));
        assert_eq!(session.open_context_count(), 1);
        assert_eq!(session.closed_contexts().len(), 1);
    }

    #[test]
    fn releases_on_error_path() {
        let mut session = FakeSession::new();
        let primary = session.primary_context();

        let result: Result<(), _> = with_secondary_context(&mut session, |s| {
            s.load("https://missing.test/")?;
            Ok(())
        });

        assert!(matches!(result, Err(SessionError::Navigation { .. })));
        assert_eq!(session.active_context(), primary);
        assert_eq!(session.open_context_count(), 1);
    }

    #[test]
    fn open_failure_leaves_session_untouched() {
        let mut session = FakeSession::new().failing_open_context();
        let primary = session.primary_context();

        let result: Result<(), _> = with_secondary_context(&mut session, |_| Ok(()));

        assert!(matches!(result, Err(SessionError::Tab(_))));
        assert_eq!(session.active_context(), primary);
        assert!(session.closed_contexts().is_empty());
    }
}
