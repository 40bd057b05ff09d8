//! Scenario tests for the playback state machine

#[cfg(test)]
mod tests {
    use crate::action::ActionKind;
    use crate::error::KioskError;
    use crate::models::OrchestrationSource;
    use crate::orchestrator::*;
    use crate::poller::{PollOutcome, UpdatePoller};
    use crate::store::{MemoryStore, Store, CURRENT_SLOT, NEXT_SLOT, POLLING_INTERVAL_SETTING, SOURCE_SETTING, URI_SETTING};
    use crate::test_support::FakeRemote;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;
    use std::time::Duration;

    const ORCHESTRATION_URI: &str = "https://kiosk.example.org/lobby.json";

    const TIMED_LOOP: &str = r#"{"name":"Lobby","lifecycle":"continuousLoop","order":"sequential",
        "actions":[
          {"name":"A","duration":5,"path":"a.png","stretch":"fill"},
          {"name":"B","duration":10,"path":"b.png","stretch":"fill"}]}"#;

    const TIMED_ONCE: &str = r#"{"name":"Once","lifecycle":"singleRun",
        "actions":[
          {"name":"A","duration":5,"path":"a.png","stretch":"fill"},
          {"name":"B","duration":10,"path":"b.png","stretch":"fill"}]}"#;

    const REMOTE_V1: &str = r#"{"name":"Remote","pollingIntervalMinutes":20,"lifecycle":"continuousLoop",
        "actions":[{"name":"A","duration":5,"path":"https://cdn.example.org/a.png","stretch":"fill"}]}"#;

    const REMOTE_V2: &str = r#"{"name":"Remote v2","pollingIntervalMinutes":30,"lifecycle":"continuousLoop",
        "actions":[{"name":"C","duration":5,"path":"https://cdn.example.org/c.png","stretch":"fill"}]}"#;

    struct Harness {
        orchestrator: Orchestrator<MemoryStore, FakeRemote>,
        events: Receiver<OrchestratorEvent>,
        store: Arc<MemoryStore>,
        remote: Arc<FakeRemote>,
    }

    impl Harness {
        fn new(store: MemoryStore, remote: FakeRemote, routes: ActionRoutes) -> Self {
            let store = Arc::new(store);
            let remote = Arc::new(remote);
            let (tx, events) = mpsc::channel();
            let orchestrator = Orchestrator::new(store.clone(), remote.clone(), routes, tx);
            Self {
                orchestrator,
                events,
                store,
                remote,
            }
        }

        fn file(definition: &str) -> Self {
            Self::file_with_routes(definition, ActionRoutes::standard())
        }

        fn file_with_routes(definition: &str, routes: ActionRoutes) -> Self {
            let store = MemoryStore::new();
            store
                .set_setting(SOURCE_SETTING, &OrchestrationSource::File.to_string())
                .unwrap();
            store.save_file(CURRENT_SLOT, definition).unwrap();
            Self::new(store, FakeRemote::new(), routes)
        }

        fn url(remote: FakeRemote) -> Self {
            let store = MemoryStore::new();
            store
                .set_setting(SOURCE_SETTING, &OrchestrationSource::Url.to_string())
                .unwrap();
            store.set_setting(URI_SETTING, ORCHESTRATION_URI).unwrap();
            Self::new(store, remote, ActionRoutes::standard())
        }

        /// Everything emitted since the last call, one line per event
        fn drain(&self) -> Vec<String> {
            self.events.try_iter().map(|e| describe(&e)).collect()
        }

        fn elapse_secs(&mut self, secs: u64) -> Vec<String> {
            self.orchestrator.elapse(Duration::from_secs(secs)).unwrap();
            self.drain()
        }
    }

    fn describe(event: &OrchestratorEvent) -> String {
        match event {
            OrchestratorEvent::Started => "started".to_string(),
            OrchestratorEvent::Loaded(o) => format!("loaded {}", o.name),
            OrchestratorEvent::ValidationComplete(o) => format!("validated {}", o.is_valid()),
            OrchestratorEvent::Status(s) => format!("status {}", s),
            OrchestratorEvent::NextAction { action, route } => format!("next {} on {}", action.label(), route),
            OrchestratorEvent::Cancelled(reason) => format!("cancelled {:?}", reason),
        }
    }

    fn shown(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|l| l.strip_prefix("next "))
            .map(|l| l.split(" on ").next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_timed_loop_end_to_end() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.start().unwrap();
        assert_eq!(
            h.drain(),
            vec!["loaded Lobby", "validated true", "started", "next A on image"]
        );
        assert_eq!(h.orchestrator.state(), OrchestratorState::Playing);
        assert_eq!(h.orchestrator.time_remaining(), Some(Duration::from_secs(5)));

        assert!(h.elapse_secs(4).is_empty());
        assert_eq!(h.elapse_secs(1), vec!["next B on image"]);
        assert_eq!(h.orchestrator.pending(), 0);

        assert!(h.elapse_secs(9).is_empty());
        assert_eq!(
            h.elapse_secs(1),
            vec!["loaded Lobby", "validated true", "started", "next A on image"]
        );
    }

    #[test]
    fn test_single_run_finishes_without_reload() {
        let mut h = Harness::file(TIMED_ONCE);
        h.orchestrator.start().unwrap();
        h.drain();

        assert_eq!(h.elapse_secs(5), vec!["next B on image"]);
        assert_eq!(h.elapse_secs(10), vec!["cancelled Finished"]);
        assert_eq!(h.orchestrator.state(), OrchestratorState::Terminated);
        assert!(h.orchestrator.now_playing().is_none());

        assert!(h.elapse_secs(60).is_empty());
        h.orchestrator.advance().unwrap();
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_continuous_loop_reloads_once_per_pass() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.start().unwrap();

        let mut lines = h.drain();
        for _ in 0..3 {
            lines.extend(h.elapse_secs(5));
            lines.extend(h.elapse_secs(10));
        }

        let loads = lines.iter().filter(|l| l.starts_with("loaded")).count();
        assert_eq!(loads, 4);
        assert_eq!(shown(&lines), vec!["A", "B", "A", "B", "A", "B", "A"]);
    }

    #[test]
    fn test_random_order_plays_each_action_once_per_pass() {
        let mut h = Harness::file(
            r#"{"lifecycle":"continuousLoop","order":"random","actions":[
                {"name":"A","duration":1,"path":"a.png","stretch":"fill"},
                {"name":"B","duration":1,"path":"b.png","stretch":"fill"},
                {"name":"C","duration":1,"path":"c.png","stretch":"fill"},
                {"name":"D","duration":1,"path":"d.png","stretch":"fill"}]}"#,
        );
        h.orchestrator.start().unwrap();

        let mut lines = h.drain();
        for _ in 0..19 {
            lines.extend(h.elapse_secs(1));
        }

        let labels = shown(&lines);
        assert_eq!(labels.len(), 20);
        for pass in labels.chunks(4) {
            let mut pass = pass.to_vec();
            pass.sort();
            assert_eq!(pass, vec!["A", "B", "C", "D"]);
        }
    }

    #[test]
    fn test_untimed_action_waits_for_host() {
        let mut h = Harness::file(
            r#"{"actions":[
                {"name":"Manual","path":"a.png","stretch":"fill"},
                {"name":"Zero","duration":0,"path":"b.png","stretch":"fill"},
                {"name":"Last","duration":3,"path":"c.png","stretch":"fill"}]}"#,
        );
        h.orchestrator.start().unwrap();
        h.drain();
        assert_eq!(h.orchestrator.time_remaining(), None);
        assert!(h.elapse_secs(3600).is_empty());

        h.orchestrator.advance().unwrap();
        assert_eq!(shown(&h.drain()), vec!["Zero"]);
        assert_eq!(h.orchestrator.time_remaining(), None);

        h.orchestrator.advance().unwrap();
        assert_eq!(shown(&h.drain()), vec!["Last"]);
        assert_eq!(h.orchestrator.time_remaining(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_end_request_stops_at_next_step() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.start().unwrap();
        h.drain();

        let token = h.orchestrator.cancellation();
        token.request();
        assert!(h.elapse_secs(4).is_empty());

        assert_eq!(h.elapse_secs(1), vec!["cancelled EndRequested"]);
        assert!(!token.is_requested());
        assert_eq!(h.orchestrator.state(), OrchestratorState::Terminated);
        assert!(h.orchestrator.now_playing().is_none());
        assert_eq!(h.orchestrator.time_remaining(), None);
    }

    #[test]
    fn test_start_discards_stale_end_request() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.cancellation().request();
        h.orchestrator.start().unwrap();
        assert_eq!(shown(&h.drain()), vec!["A"]);
        assert_eq!(h.elapse_secs(5), vec!["next B on image"]);
    }

    #[test]
    fn test_restart_after_end() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.start().unwrap();
        h.orchestrator.cancellation().request();
        h.orchestrator.advance().unwrap();
        assert_eq!(h.orchestrator.state(), OrchestratorState::Terminated);

        h.drain();
        h.orchestrator.start().unwrap();
        assert_eq!(shown(&h.drain()), vec!["A"]);
    }

    #[test]
    fn test_unmapped_route_is_fatal() {
        let mut h = Harness::file_with_routes(
            r#"{"actions":[
                {"name":"A","duration":5,"path":"a.png","stretch":"fill"},
                {"name":"Site","duration":5,"path":"https://example.org","autoScroll":false,
                 "scrollDuration":0,"scrollInterval":0,"scrollResetDelay":0}]}"#,
            ActionRoutes::new().with(ActionKind::Image, "viewer"),
        );
        h.orchestrator.start().unwrap();
        assert_eq!(shown(&h.drain()), vec!["A"]);

        let err = h.orchestrator.elapse(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, KioskError::UnmappedAction(ActionKind::Website)));
        assert_eq!(h.orchestrator.state(), OrchestratorState::Terminated);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_custom_route_names() {
        let mut h = Harness::file_with_routes(
            TIMED_LOOP,
            ActionRoutes::new().with(ActionKind::Image, "viewer"),
        );
        h.orchestrator.start().unwrap();
        assert_eq!(h.drain().last().map(String::as_str), Some("next A on viewer"));
    }

    #[test]
    fn test_invalid_orchestration_does_not_play() {
        let mut h = Harness::file(
            r#"{"name":"Broken","pollingIntervalMinutes":5,
                "actions":[{"name":"A","duration":5,"path":"missing.png","stretch":"fill"}]}"#,
        );
        h.remote.mark_unreachable("missing");
        h.orchestrator.start().unwrap();

        assert_eq!(
            h.drain(),
            vec![
                "loaded Broken",
                "validated false",
                "status Orchestration is invalid: 1 passed / 2 failed",
                "cancelled ValidationFailed",
            ]
        );
        assert_eq!(h.orchestrator.state(), OrchestratorState::Invalid);

        let current = h.orchestrator.current().unwrap();
        let tree = current.validation.as_ref().unwrap();
        assert!(!tree.find("PollingIntervalMinutes").unwrap().is_valid());
        assert!(!tree.find("Path").unwrap().is_valid());

        h.orchestrator.advance().unwrap();
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_missing_definition_cancels() {
        let mut h = Harness::new(MemoryStore::new(), FakeRemote::new(), ActionRoutes::standard());
        h.orchestrator.start().unwrap();
        assert_eq!(h.drain(), vec!["cancelled NoValidOrchestration"]);
        assert_eq!(h.orchestrator.state(), OrchestratorState::Terminated);
    }

    #[test]
    fn test_unparseable_definition_cancels() {
        let mut h = Harness::file("this is not a definition");
        h.orchestrator.start().unwrap();
        assert_eq!(h.drain(), vec!["cancelled NoValidOrchestration"]);
    }

    #[test]
    fn test_empty_orchestration_cancels() {
        let mut h = Harness::file(r#"{"name":"Nothing"}"#);
        h.orchestrator.start().unwrap();
        assert_eq!(
            h.drain(),
            vec!["loaded Nothing", "validated true", "cancelled Empty"]
        );
    }

    #[test]
    fn test_advance_before_start_is_ignored() {
        let mut h = Harness::file(TIMED_LOOP);
        h.orchestrator.advance().unwrap();
        assert!(h.drain().is_empty());
        assert_eq!(h.orchestrator.state(), OrchestratorState::Idle);
    }

    #[test]
    fn test_url_start_fetches_and_caches() {
        let mut h = Harness::url(FakeRemote::serving(REMOTE_V1));
        h.orchestrator.start().unwrap();

        assert_eq!(shown(&h.drain()), vec!["A"]);
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(REMOTE_V1));
        assert_eq!(h.store.get_setting(POLLING_INTERVAL_SETTING).as_deref(), Some("20"));
        assert_eq!(
            h.orchestrator.current().map(|o| o.source),
            Some(OrchestrationSource::Url)
        );
    }

    #[test]
    fn test_url_start_falls_back_to_cache() {
        let mut h = Harness::url(FakeRemote::new());
        h.store.save_file(CURRENT_SLOT, REMOTE_V1).unwrap();
        h.orchestrator.start().unwrap();

        assert_eq!(shown(&h.drain()), vec!["A"]);
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[test]
    fn test_url_error_status_without_cache_cancels() {
        let remote = FakeRemote::new();
        remote.respond(500, REMOTE_V1);
        let mut h = Harness::url(remote);
        h.orchestrator.start().unwrap();

        assert_eq!(h.drain(), vec!["cancelled NoValidOrchestration"]);
        assert!(h.store.get_file(CURRENT_SLOT).is_none());
    }

    #[test]
    fn test_staged_update_adopted_at_loop_boundary() {
        let mut h = Harness::url(FakeRemote::serving(REMOTE_V1));
        h.orchestrator.start().unwrap();
        h.drain();

        h.remote.respond(200, REMOTE_V2);
        let poller = UpdatePoller::new(h.store.clone(), h.remote.clone());
        assert_eq!(poller.poll_once(), PollOutcome::Staged);
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(REMOTE_V1));

        assert_eq!(
            h.elapse_secs(5),
            vec![
                "status Orchestration update adopted",
                "loaded Remote v2",
                "validated true",
                "started",
                "next C on image",
            ]
        );
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(REMOTE_V2));
        assert_eq!(h.store.get_setting(POLLING_INTERVAL_SETTING).as_deref(), Some("30"));
        assert_eq!(h.remote.fetch_count(), 2);
    }

    #[test]
    fn test_fresh_fetch_replaces_older_staged_definition() {
        let mut h = Harness::url(FakeRemote::serving(REMOTE_V2));
        h.store.save_file(CURRENT_SLOT, REMOTE_V1).unwrap();
        h.store.save_file(NEXT_SLOT, REMOTE_V1).unwrap();

        h.orchestrator.start().unwrap();
        assert_eq!(h.drain().first().map(String::as_str), Some("loaded Remote v2"));
        assert_eq!(h.store.get_file(NEXT_SLOT).as_deref(), Some(REMOTE_V2));

        let lines = h.elapse_secs(5);
        assert!(lines.iter().all(|l| !l.starts_with("status")));
        assert_eq!(lines.first().map(String::as_str), Some("loaded Remote v2"));
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(REMOTE_V2));
    }

    #[test]
    fn test_identical_staged_definition_is_not_announced() {
        let mut h = Harness::url(FakeRemote::serving(REMOTE_V1));
        h.orchestrator.start().unwrap();
        h.drain();

        // Same content, different formatting
        let reformatted: String = REMOTE_V1.split_whitespace().collect::<Vec<_>>().join(" ");
        h.store.save_file(NEXT_SLOT, &reformatted).unwrap();

        let lines = h.elapse_secs(5);
        assert!(lines.iter().all(|l| !l.starts_with("status")));
        assert_eq!(lines.first().map(String::as_str), Some("loaded Remote"));
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(REMOTE_V1));
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[test]
    fn test_file_source_ignores_staged_definition() {
        let mut h = Harness::file(TIMED_LOOP);
        h.store.save_file(NEXT_SLOT, REMOTE_V2).unwrap();
        h.orchestrator.start().unwrap();
        h.drain();

        assert_eq!(h.elapse_secs(5), vec!["next B on image"]);
        let lines = h.elapse_secs(10);
        assert_eq!(lines.first().map(String::as_str), Some("loaded Lobby"));
        assert_eq!(h.store.get_file(CURRENT_SLOT).as_deref(), Some(TIMED_LOOP));
    }
}
