//! Birthdate-tracking decision engine.
//!
//! Each run looks at the single current top candidate and decides, against
//! the full history of birth dates seen so far, whether to record it, count
//! another confirmation, ignore it as likely vandalism, or announce it.

use crate::{
    clean_person_name, Announcement, BirthdateStore, Candidate, Decision, KnownBirthdate,
    Notifier, RunReport, RunStatus, StoreError,
};

/// 2 polls an hour for 6 hours.
pub(crate) const DEFAULT_THRESHOLD: u32 = 12;

pub(crate) struct DecisionEngine {
    threshold: u32,
}

/// Youngest birth date already announced, if any.
pub(crate) fn youngest_announced(history: &[KnownBirthdate]) -> Option<i64> {
    history
        .iter()
        .filter(|b| b.tweeted)
        .map(|b| b.birth_date_epoch)
        .max()
}

/// First matching rule wins.
pub(crate) fn decide(history: &[KnownBirthdate], epoch: i64, threshold: u32) -> Decision {
    let Some(known) = history.iter().find(|b| b.birth_date_epoch == epoch) else {
        return Decision::Record;
    };
    if let Some(youngest) = youngest_announced(history) {
        if epoch < youngest {
            return Decision::SkipSuspectedVandalism {
                youngest_announced: youngest,
            };
        }
    }
    if known.tweeted {
        return Decision::SteadyState;
    }
    if known.times_seen < threshold {
        return Decision::Accumulate {
            times_seen: known.times_seen + 1,
        };
    }
    Decision::Announce {
        times_seen: known.times_seen,
    }
}

pub(crate) fn announcement_message(candidate: &Candidate) -> String {
    format!(
        "{} of {}, born {}, is now the world's oldest living person, according to Wikipedia: {}",
        clean_person_name(&candidate.name),
        candidate.country,
        candidate.birth_date_raw,
        candidate.profile_link
    )
}

impl DecisionEngine {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// Decide without side effects.
    pub(crate) fn preview(
        &self,
        candidate: &Candidate,
        store: &dyn BirthdateStore,
    ) -> Result<RunReport, StoreError> {
        let history = store.list_known_birthdates()?;
        let decision = decide(&history, candidate.birth_date_epoch, self.threshold);
        Ok(RunReport {
            status: RunStatus::Ok,
            birth_date_epoch: candidate.birth_date_epoch,
            decision,
            announcement: None,
            dry_run: true,
        })
    }

    /// One observation run: one read of full history, at most one write.
    pub(crate) fn run(
        &self,
        candidate: &Candidate,
        store: &dyn BirthdateStore,
        notifier: &dyn Notifier,
    ) -> Result<RunReport, StoreError> {
        let epoch = candidate.birth_date_epoch;
        let history = store.list_known_birthdates()?;
        let decision = decide(&history, epoch, self.threshold);
        tracing::info!(
            birth_date_epoch = epoch,
            decision = decision.label(),
            known = history.len(),
            "decision"
        );

        let mut announcement = None;
        match decision {
            Decision::Record => store.insert(epoch)?,
            Decision::SkipSuspectedVandalism { youngest_announced } => {
                tracing::warn!(
                    birth_date_epoch = epoch,
                    youngest_announced,
                    "skipping: older than the youngest announced birth date"
                );
            }
            Decision::SteadyState => {
                tracing::info!(
                    name = %clean_person_name(&candidate.name),
                    "still the oldest person"
                );
            }
            Decision::Accumulate { .. } => store.increment_times_seen(epoch)?,
            Decision::Announce { .. } => {
                let attempted = self.attempt_announcement(candidate, notifier);
                if let Err(err) = self.persist_announced(store, epoch) {
                    tracing::error!(error = %err, birth_date_epoch = epoch, "announced but not recorded");
                    return Err(StoreError::AnnouncedUnrecorded {
                        birth_date_epoch: epoch,
                        message: attempted.message,
                        source: Box::new(err),
                    });
                }
                announcement = Some(attempted);
            }
        }

        Ok(RunReport {
            status: RunStatus::Ok,
            birth_date_epoch: epoch,
            decision,
            announcement,
            dry_run: false,
        })
    }

    /// Step one of announcing: call the notifier and capture its outcome.
    pub(crate) fn attempt_announcement(
        &self,
        candidate: &Candidate,
        notifier: &dyn Notifier,
    ) -> Announcement {
        let message = announcement_message(candidate);
        let notification_error = match notifier.announce(&message) {
            Ok(()) => None,
            Err(err) => {
                tracing::error!(error = %err, "announcement failed; not retried");
                Some(err.to_string())
            }
        };
        Announcement {
            birth_date_epoch: candidate.birth_date_epoch,
            message,
            notification_error,
        }
    }

    /// Step two: mark announced, whatever the transport outcome was.
    pub(crate) fn persist_announced(
        &self,
        store: &dyn BirthdateStore,
        epoch: i64,
    ) -> Result<(), StoreError> {
        store.mark_tweeted(epoch)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::RecordingNotifier;
    use crate::SqliteStore;
    use proptest::prelude::*;
    use std::cell::RefCell;

    const E1: i64 = -1_956_528_000;

    fn candidate(epoch: i64) -> Candidate {
        Candidate {
            name: "Jane Doe[3]".into(),
            country: "Japan".into(),
            birth_date_raw: "2 January 1908".into(),
            birth_date_epoch: epoch,
            profile_link: "https://en.wikipedia.org/wiki/Jane_Doe".into(),
        }
    }

    fn store_with(rows: &[KnownBirthdate]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for row in rows {
            store.insert(row.birth_date_epoch).unwrap();
            for _ in 1..row.times_seen {
                store.increment_times_seen(row.birth_date_epoch).unwrap();
            }
            if row.tweeted {
                store.mark_tweeted(row.birth_date_epoch).unwrap();
            }
        }
        store
    }

    fn row(epoch: i64, times_seen: u32, tweeted: bool) -> KnownBirthdate {
        KnownBirthdate {
            birth_date_epoch: epoch,
            times_seen,
            tweeted,
        }
    }

    /// Logs the order of store writes and notifier calls.
    struct OrderingProbe<'a> {
        inner: &'a SqliteStore,
        log: &'a RefCell<Vec<&'static str>>,
    }

    impl BirthdateStore for OrderingProbe<'_> {
        fn list_known_birthdates(&self) -> Result<Vec<KnownBirthdate>, StoreError> {
            self.log.borrow_mut().push("list");
            self.inner.list_known_birthdates()
        }
        fn insert(&self, epoch: i64) -> Result<(), StoreError> {
            self.log.borrow_mut().push("insert");
            self.inner.insert(epoch)
        }
        fn increment_times_seen(&self, epoch: i64) -> Result<(), StoreError> {
            self.log.borrow_mut().push("increment");
            self.inner.increment_times_seen(epoch)
        }
        fn mark_tweeted(&self, epoch: i64) -> Result<(), StoreError> {
            self.log.borrow_mut().push("mark_tweeted");
            self.inner.mark_tweeted(epoch)
        }
    }

    impl Notifier for OrderingProbe<'_> {
        fn announce(&self, _: &str) -> Result<(), crate::NotificationError> {
            self.log.borrow_mut().push("announce");
            Err(crate::NotificationError::Transport {
                channel: "probe".into(),
                reason: "down".into(),
            })
        }
    }

    #[test]
    fn test_empty_history_records_candidate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();

        assert_eq!(report.status, RunStatus::Ok);
        assert_eq!(report.decision, Decision::Record);
        assert!(report.announcement.is_none());
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 1, false)]);
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_accumulates_below_threshold() {
        let store = store_with(&[row(E1, 5, false)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();

        assert_eq!(report.decision, Decision::Accumulate { times_seen: 6 });
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 6, false)]);
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_announces_at_threshold() {
        let store = store_with(&[row(E1, 12, false)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();

        assert_eq!(report.decision, Decision::Announce { times_seen: 12 });
        let messages = notifier.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "Jane Doe of Japan, born 2 January 1908, is now the world's oldest living person, \
             according to Wikipedia: https://en.wikipedia.org/wiki/Jane_Doe"
        );
        let announcement = report.announcement.unwrap();
        assert_eq!(announcement.birth_date_epoch, E1);
        assert!(announcement.notification_error.is_none());
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 12, true)]);
    }

    #[test]
    fn test_announced_is_steady_state() {
        let store = store_with(&[row(E1, 12, true)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();

        assert_eq!(report.status, RunStatus::Ok);
        assert_eq!(report.decision, Decision::SteadyState);
        assert!(report.announcement.is_none());
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 12, true)]);
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_vandalism_guard() {
        let store = store_with(&[row(500, 3, false), row(1000, 12, true)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(500), &store, &notifier)
            .unwrap();

        assert_eq!(
            report.decision,
            Decision::SkipSuspectedVandalism {
                youngest_announced: 1000
            }
        );
        assert_eq!(
            store.list_known_birthdates().unwrap(),
            vec![row(500, 3, false), row(1000, 12, true)]
        );
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_unseen_older_date_is_still_recorded() {
        // The guard only applies to birth dates already in history.
        let store = store_with(&[row(1000, 12, true)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(12)
            .run(&candidate(500), &store, &notifier)
            .unwrap();
        assert_eq!(report.decision, Decision::Record);
        assert_eq!(store.list_known_birthdates().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_notification_still_marks_announced() {
        let store = store_with(&[row(E1, 12, false)]);
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let report = DecisionEngine::new(12)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();

        assert_eq!(notifier.messages.borrow().len(), 1);
        let announcement = report.announcement.unwrap();
        assert!(announcement.notification_error.unwrap().contains("503"));
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 12, true)]);
    }

    #[test]
    fn test_notify_happens_before_persist() {
        let inner = store_with(&[row(E1, 12, false)]);
        let log = RefCell::new(Vec::new());
        let probe = OrderingProbe {
            inner: &inner,
            log: &log,
        };
        DecisionEngine::new(12)
            .run(&candidate(E1), &probe, &probe)
            .unwrap();
        assert_eq!(*log.borrow(), vec!["list", "announce", "mark_tweeted"]);
    }

    /// Accepts everything except the announced flag.
    struct StuckMarkStore<'a> {
        inner: &'a SqliteStore,
    }

    impl BirthdateStore for StuckMarkStore<'_> {
        fn list_known_birthdates(&self) -> Result<Vec<KnownBirthdate>, StoreError> {
            self.inner.list_known_birthdates()
        }
        fn insert(&self, epoch: i64) -> Result<(), StoreError> {
            self.inner.insert(epoch)
        }
        fn increment_times_seen(&self, epoch: i64) -> Result<(), StoreError> {
            self.inner.increment_times_seen(epoch)
        }
        fn mark_tweeted(&self, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    #[test]
    fn test_unrecorded_announcement_carries_message() {
        let inner = store_with(&[row(E1, 12, false)]);
        let notifier = RecordingNotifier::default();
        let err = DecisionEngine::new(12)
            .run(&candidate(E1), &StuckMarkStore { inner: &inner }, &notifier)
            .unwrap_err();

        assert_eq!(notifier.messages.borrow().len(), 1);
        match &err {
            StoreError::AnnouncedUnrecorded {
                birth_date_epoch,
                message,
                source,
            } => {
                assert_eq!(*birth_date_epoch, E1);
                assert_eq!(message, &notifier.messages.borrow()[0]);
                assert!(matches!(**source, StoreError::Sqlite(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Jane Doe of Japan"));
    }

    #[test]
    fn test_preview_has_no_side_effects() {
        let store = store_with(&[row(E1, 12, false)]);
        let report = DecisionEngine::new(12)
            .preview(&candidate(E1), &store)
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.decision, Decision::Announce { times_seen: 12 });
        assert_eq!(store.list_known_birthdates().unwrap(), vec![row(E1, 12, false)]);
    }

    #[test]
    fn test_youngest_announced() {
        assert_eq!(youngest_announced(&[]), None);
        assert_eq!(
            youngest_announced(&[row(5, 1, true), row(9, 1, false), row(7, 1, true)]),
            Some(7)
        );
    }

    #[test]
    fn test_zero_threshold_behaves_as_one() {
        let store = store_with(&[row(E1, 1, false)]);
        let notifier = RecordingNotifier::default();
        let report = DecisionEngine::new(0)
            .run(&candidate(E1), &store, &notifier)
            .unwrap();
        assert_eq!(report.decision, Decision::Announce { times_seen: 1 });
    }

    #[test]
    fn test_decide_default_threshold() {
        let history = [row(E1, DEFAULT_THRESHOLD - 1, false)];
        assert_eq!(
            decide(&history, E1, DEFAULT_THRESHOLD),
            Decision::Accumulate { times_seen: DEFAULT_THRESHOLD }
        );
    }

    proptest! {
        /// Over any sequence of observed birth dates, `tweeted` never reverts,
        /// `times_seen` never shrinks, and each date is announced at most once.
        #[test]
        fn prop_monotone_history(
            sightings in proptest::collection::vec(0i64..4, 1..60),
            threshold in 1u32..5,
        ) {
            let store = SqliteStore::open_in_memory().unwrap();
            let notifier = RecordingNotifier::default();
            let engine = DecisionEngine::new(threshold);
            let mut announced: Vec<i64> = Vec::new();

            for epoch in sightings {
                let before = store.list_known_birthdates().unwrap();
                let report = engine.run(&candidate(epoch), &store, &notifier).unwrap();
                let after = store.list_known_birthdates().unwrap();

                prop_assert!(after.len() >= before.len());
                for old in &before {
                    let new = after
                        .iter()
                        .find(|b| b.birth_date_epoch == old.birth_date_epoch)
                        .unwrap();
                    prop_assert!(new.times_seen >= old.times_seen);
                    prop_assert!(!old.tweeted || new.tweeted);
                }
                if let Some(a) = report.announcement {
                    prop_assert!(!announced.contains(&a.birth_date_epoch));
                    announced.push(a.birth_date_epoch);
                }
            }
            prop_assert_eq!(notifier.messages.borrow().len(), announced.len());
        }
    }
}
