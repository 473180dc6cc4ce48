//! Inbox listener: polls a mail source and notifies the observer of
//! matching items.
//!
//! The loop only filters and forwards; it never blocks on job processing.
//! A failure for one item is logged and must not stop later items, and a
//! failed poll cycle backs off and continues.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::mail::{InboxObserver, MailSource};

/// Delay before retrying after a failed poll cycle.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Subject-filtered subscription loop over a [`MailSource`].
pub struct InboxListener {
    source: Arc<dyn MailSource>,
    observer: Arc<dyn InboxObserver>,
    keywords: Vec<String>,
    allowed_senders: Vec<String>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl InboxListener {
    pub fn new(
        source: Arc<dyn MailSource>,
        observer: Arc<dyn InboxObserver>,
        keywords: Vec<String>,
        allowed_senders: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            observer,
            keywords,
            allowed_senders,
            poll_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the loop at the next tick.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run until the shutdown flag is set.
    pub async fn run(self) {
        tracing::info!(
            source = self.source.name(),
            interval_secs = self.poll_interval.as_secs(),
            "Inbox listener started"
        );

        let mut tick = tokio::time::interval(self.poll_interval);

        loop {
            tick.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("Inbox listener shutting down");
                return;
            }

            match self.source.fetch_new().await {
                Ok(events) => {
                    for event in events {
                        if !subject_matches(&self.keywords, &event.subject) {
                            tracing::debug!(subject = %event.subject, "Subject not matched, ignoring");
                            continue;
                        }
                        if !is_sender_allowed(&self.allowed_senders, &event.sender_address) {
                            tracing::warn!(sender = %event.sender_address, "Blocked sender");
                            continue;
                        }

                        tracing::info!(
                            subject = %event.subject,
                            entry_id = %event.entry_id,
                            "Inbox item matched"
                        );
                        self.observer.on_item_added(event).await;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Mail poll failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Case-insensitive containment check against the keyword phrases.
pub fn subject_matches(keywords: &[String], subject: &str) -> bool {
    let lowered = subject.to_lowercase();
    keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
}

/// Check if a sender email is in the allowlist.
///
/// - Empty list → deny all
/// - `*` in list → allow all
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact email match
pub fn is_sender_allowed(allowed: &[String], email: &str) -> bool {
    if allowed.is_empty() {
        return false;
    }
    if allowed.iter().any(|a| a == "*") {
        return true;
    }
    let email_lower = email.to_lowercase();
    allowed.iter().any(|a| {
        if a.starts_with('@') {
            email_lower.ends_with(&a.to_lowercase())
        } else if a.contains('@') {
            a.eq_ignore_ascii_case(email)
        } else {
            email_lower.ends_with(&format!("@{}", a.to_lowercase()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::MailError;
    use crate::mail::MailEvent;

    fn keywords() -> Vec<String> {
        vec!["vendor email".into(), "gl email".into()]
    }

    // ── Subject filter ──────────────────────────────────────────────

    #[test]
    fn subject_match_is_case_insensitive() {
        assert!(subject_matches(&keywords(), "ESKER VENDOR EMAIL – batch 12"));
        assert!(subject_matches(&keywords(), "Fwd: gl EMAIL March"));
    }

    #[test]
    fn subject_without_keyword_is_rejected() {
        assert!(!subject_matches(&keywords(), "Quarterly newsletter"));
        assert!(!subject_matches(&keywords(), ""));
    }

    #[test]
    fn subject_match_requires_whole_phrase() {
        // "vendor" alone does not contain the phrase "vendor email".
        assert!(!subject_matches(&keywords(), "vendor onboarding"));
    }

    // ── Sender allowlist ────────────────────────────────────────────

    #[test]
    fn allowlist_empty_denies_all() {
        assert!(!is_sender_allowed(&[], "anyone@example.com"));
    }

    #[test]
    fn allowlist_wildcard_allows_all() {
        let allowed = vec!["*".to_string()];
        assert!(is_sender_allowed(&allowed, "anyone@example.com"));
    }

    #[test]
    fn allowlist_exact_email_match() {
        let allowed = vec!["accounts@example.com".to_string()];
        assert!(is_sender_allowed(&allowed, "Accounts@Example.com"));
        assert!(!is_sender_allowed(&allowed, "other@example.com"));
    }

    #[test]
    fn allowlist_domain_match() {
        let allowed = vec!["@example.com".to_string(), "partner.io".to_string()];
        assert!(is_sender_allowed(&allowed, "a@example.com"));
        assert!(is_sender_allowed(&allowed, "b@partner.io"));
        assert!(!is_sender_allowed(&allowed, "c@other.org"));
    }

    // ── Loop behavior ───────────────────────────────────────────────

    struct ScriptedSource {
        batches: Mutex<Vec<Result<Vec<MailEvent>, MailError>>>,
    }

    #[async_trait]
    impl MailSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_new(&self) -> Result<Vec<MailEvent>, MailError> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                batches.remove(0)
            }
        }
    }

    struct Collector {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InboxObserver for Collector {
        async fn on_item_added(&self, event: MailEvent) {
            self.seen.lock().unwrap().push(event.subject);
        }
    }

    fn event(subject: &str) -> MailEvent {
        MailEvent {
            subject: subject.into(),
            sender_address: "accounts@example.com".into(),
            received_utc: "2026-03-02T08:15:00Z".into(),
            body: "body".into(),
            entry_id: "<id@example.com>".into(),
        }
    }

    #[tokio::test]
    async fn listener_forwards_only_matching_subjects() {
        let source = Arc::new(ScriptedSource {
            batches: Mutex::new(vec![Ok(vec![
                event("Quarterly newsletter"),
                event("ESKER VENDOR EMAIL – batch 12"),
                event("gl email totals"),
            ])]),
        });
        let observer = Arc::new(Collector {
            seen: Mutex::new(Vec::new()),
        });

        let listener = InboxListener::new(
            source,
            Arc::clone(&observer) as Arc<dyn InboxObserver>,
            keywords(),
            vec!["*".into()],
            Duration::from_millis(10),
        );
        let shutdown = listener.shutdown_flag();

        let handle = tokio::spawn(listener.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.store(true, Ordering::Relaxed);
        let _ = handle.await;

        let seen = observer.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                "ESKER VENDOR EMAIL – batch 12".to_string(),
                "gl email totals".to_string()
            ]
        );
    }
}
