use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tungstenite::protocol::Message as WsMessage;

use super::console::ConsoleSink;
use super::engine::{IngestOptions, IngestReport, IngestionLoop, LoopState};
use super::feed::JsonLinesFeedFactory;
use super::source::{ChatItem, ChatSource, SourceFactory};
use super::watchdog::Watchdog;
use crate::hub::{BroadcastHub, HubHandle, Subscriber};
use crate::render::Renderer;
use crate::transport::frame::Frame;
use crate::utils::error::SourceError;

enum Step {
    Batch(Vec<ChatItem>),
    Fail(&'static str),
    Dead,
    Panic,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    fail_creates: u32,
    created: u32,
    terminated: u32,
}

#[derive(Clone, Default)]
struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    fn new(steps: Vec<Step>) -> Self {
        let factory = Self::default();
        factory.script.lock().unwrap().steps = steps.into();
        factory
    }

    fn snapshot(&self) -> (u32, u32, usize) {
        let script = self.script.lock().unwrap();
        (script.created, script.terminated, script.steps.len())
    }
}

impl SourceFactory for ScriptedFactory {
    fn source_url(&self) -> String {
        "https://www.youtube.com/watch?v=test".to_string()
    }

    fn create(&self) -> Result<Box<dyn ChatSource>, SourceError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_creates > 0 {
            script.fail_creates -= 1;
            return Err(SourceError::Create("upstream unavailable".into()));
        }
        script.created += 1;
        Ok(Box::new(ScriptedSource {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ChatSource for ScriptedSource {
    fn is_alive(&mut self) -> bool {
        let mut script = self.script.lock().unwrap();
        if matches!(script.steps.front(), Some(Step::Dead)) {
            script.steps.pop_front();
            return false;
        }
        true
    }

    fn poll(&mut self) -> Result<Vec<ChatItem>, SourceError> {
        let step = self.script.lock().unwrap().steps.pop_front();
        match step {
            Some(Step::Batch(items)) => Ok(items),
            Some(Step::Fail(msg)) => Err(SourceError::Poll(msg.to_string())),
            Some(Step::Panic) => panic!("adapter bug"),
            Some(Step::Dead) | None => Ok(Vec::new()),
        }
    }

    fn terminate(&mut self) {
        self.script.lock().unwrap().terminated += 1;
    }
}

#[derive(Clone, Default)]
struct CollectConsole {
    emitted: Arc<Mutex<Vec<String>>>,
}

impl ConsoleSink for CollectConsole {
    fn emit(&mut self, text: &str) {
        self.emitted.lock().unwrap().push(text.to_string());
    }
}

fn item(id: &str, text: &str) -> ChatItem {
    ChatItem::new(id, 1_725_000_000_000, "viewer", text)
}

fn fast_options() -> IngestOptions {
    IngestOptions {
        capacity: 5,
        max_lines: 0,
        retry_wait: Duration::from_millis(10),
        stale_timeout: Duration::ZERO,
        poll_interval: Duration::from_millis(5),
    }
}

struct Harness {
    hub: HubHandle,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<IngestReport>,
    console: CollectConsole,
}

fn start(factory: ScriptedFactory, options: IngestOptions) -> Harness {
    let renderer = Renderer::new(200, '-', 10);
    let hub = HubHandle::new(BroadcastHub::new(factory.source_url(), ""));
    let token = CancellationToken::new();
    let console = CollectConsole::default();
    let ingestion = IngestionLoop::new(
        Arc::new(factory),
        renderer,
        hub.clone(),
        options,
        token.clone(),
    )
    .with_console(Box::new(console.clone()));
    assert_eq!(ingestion.state(), LoopState::Recreating);

    Harness {
        hub,
        token,
        handle: tokio::spawn(ingestion.run()),
        console,
    }
}

impl Harness {
    async fn wait_for(&self, needle: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.hub.snapshot().contains(needle) {
            assert!(Instant::now() < deadline, "timed out waiting for {needle:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn stop(self) -> IngestReport {
        self.token.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("loop did not stop in time")
            .expect("loop panicked")
    }
}

fn resident(report: &IngestReport) -> Vec<String> {
    report.buffer.iter().map(|m| m.id.clone()).collect()
}

#[test]
fn test_watchdog_fires_after_timeout() {
    let start = Instant::now();
    let mut watchdog = Watchdog::new(Duration::from_secs(10), start);
    assert!(watchdog.is_enabled());
    assert!(!watchdog.is_stale(start + Duration::from_secs(9)));
    assert!(watchdog.is_stale(start + Duration::from_secs(10)));

    watchdog.feed(start + Duration::from_secs(10));
    assert_eq!(watchdog.deadline(), Some(start + Duration::from_secs(20)));
    assert!(!watchdog.is_stale(start + Duration::from_secs(19)));
    assert_eq!(
        watchdog.idle(start + Duration::from_secs(15)),
        Duration::from_secs(5)
    );
}

#[test]
fn test_watchdog_disabled_with_zero_timeout() {
    let start = Instant::now();
    let watchdog = Watchdog::new(Duration::ZERO, start);
    assert!(!watchdog.is_enabled());
    assert!(!watchdog.is_stale(start + Duration::from_secs(86_400)));
    assert_eq!(watchdog.deadline(), None);
}

#[test]
fn test_chat_item_accepts_message_alias() {
    let item: ChatItem = serde_json::from_str(
        r#"{"id":"a","timestamp_ms":5,"author":"bob","message":"hello"}"#,
    )
    .unwrap();
    assert_eq!(item, ChatItem::new("a", 5, "bob", "hello"));
}

#[tokio::test]
async fn test_batch_is_broadcast_once_per_cycle() {
    let factory = ScriptedFactory::new(vec![Step::Batch(vec![
        item("a", "first"),
        item("b", "second"),
        item("c", "third"),
    ])]);
    let harness = start(factory, fast_options());

    let (tx, mut rx) = mpsc::channel(16);
    harness.hub.connect(Subscriber::new(tx));

    harness.wait_for("third").await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let console = harness.console.clone();
    let report = harness.stop().await;

    assert_eq!(report.stats.accepted, 3);
    assert_eq!(report.stats.broadcasts, 1);
    assert_eq!(console.emitted.lock().unwrap().len(), 1);
    assert!(!console.emitted.lock().unwrap()[0].contains("<b>"));

    let mut chat_frames = Vec::new();
    while let Ok(WsMessage::Text(text)) = rx.try_recv() {
        if let Some(Frame::ChatBuffer(body)) = Frame::parse(text.as_str()) {
            chat_frames.push(body);
        }
    }
    // Snapshot at connect plus exactly one broadcast.
    assert_eq!(chat_frames.len(), 2);
    assert!(chat_frames[1].contains("<b>viewer</b>: third"));
}

#[tokio::test]
async fn test_duplicates_do_not_trigger_broadcast() {
    let factory = ScriptedFactory::new(vec![
        Step::Batch(vec![item("a", "one"), item("b", "two")]),
        Step::Batch(vec![item("a", "one"), item("b", "two")]),
        Step::Batch(vec![item("c", "three")]),
    ]);
    let harness = start(factory, fast_options());
    harness.wait_for("three").await;
    let report = harness.stop().await;

    assert_eq!(report.stats.duplicates, 2);
    assert_eq!(report.stats.broadcasts, 2);
    assert_eq!(resident(&report), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_dead_source_is_recreated_and_buffer_kept() {
    let factory = ScriptedFactory::new(vec![
        Step::Batch(vec![item("a", "before")]),
        Step::Dead,
        Step::Batch(vec![item("b", "after")]),
    ]);
    let harness = start(factory.clone(), fast_options());
    harness.wait_for("after").await;
    let report = harness.stop().await;

    assert_eq!(report.stats.not_alive, 1);
    assert_eq!(report.stats.sessions, 2);
    assert_eq!(resident(&report), vec!["a", "b"]);

    let (created, terminated, _) = factory.snapshot();
    assert_eq!(created, 2);
    // The dead session plus the final one at shutdown.
    assert_eq!(terminated, 2);
}

#[tokio::test]
async fn test_poll_failure_takes_recreate_path() {
    let factory = ScriptedFactory::new(vec![
        Step::Fail("connection reset"),
        Step::Batch(vec![item("a", "recovered")]),
    ]);
    let harness = start(factory, fast_options());
    harness.wait_for("recovered").await;
    let report = harness.stop().await;

    assert_eq!(report.stats.poll_failures, 1);
    assert_eq!(report.stats.sessions, 2);
    assert_eq!(report.stats.recreations(), 1);
}

#[tokio::test]
async fn test_panicking_adapter_is_recreated() {
    let factory = ScriptedFactory::new(vec![
        Step::Panic,
        Step::Batch(vec![item("a", "survived")]),
    ]);
    let harness = start(factory, fast_options());
    harness.wait_for("survived").await;
    let report = harness.stop().await;

    assert_eq!(report.stats.crashes, 1);
    assert_eq!(report.stats.sessions, 2);
}

#[tokio::test]
async fn test_creation_failures_are_retried() {
    let factory = ScriptedFactory::new(vec![Step::Batch(vec![item("a", "finally")])]);
    factory.script.lock().unwrap().fail_creates = 3;
    let harness = start(factory, fast_options());
    harness.wait_for("finally").await;
    let report = harness.stop().await;

    assert_eq!(report.stats.create_failures, 3);
    assert_eq!(report.stats.sessions, 1);
}

#[tokio::test]
async fn test_stale_session_recreated_once_per_interval() {
    let options = IngestOptions {
        stale_timeout: Duration::from_millis(60),
        ..fast_options()
    };
    let harness = start(ScriptedFactory::default(), options);
    tokio::time::sleep(Duration::from_millis(250)).await;
    let report = harness.stop().await;

    assert!(report.stats.stale >= 1, "watchdog never fired");
    assert!(report.stats.stale <= 4, "fired {} times", report.stats.stale);
    assert!(report.stats.cycles > report.stats.stale * 3);
    // Shutdown may land inside the retry wait, before the next session.
    assert!(report.stats.sessions >= report.stats.stale);
    assert!(report.stats.sessions <= report.stats.stale + 1);
}

/// Sources that report alive but block inside `poll`.
#[derive(Clone, Default)]
struct StuckFactory {
    created: Arc<Mutex<u32>>,
}

impl SourceFactory for StuckFactory {
    fn source_url(&self) -> String {
        "https://www.youtube.com/watch?v=stuck".to_string()
    }

    fn create(&self) -> Result<Box<dyn ChatSource>, SourceError> {
        *self.created.lock().unwrap() += 1;
        Ok(Box::new(StuckSource))
    }
}

struct StuckSource;

impl ChatSource for StuckSource {
    fn is_alive(&mut self) -> bool {
        true
    }

    fn poll(&mut self) -> Result<Vec<ChatItem>, SourceError> {
        std::thread::sleep(Duration::from_millis(600));
        Ok(Vec::new())
    }

    fn terminate(&mut self) {}
}

#[tokio::test]
async fn test_hung_poll_is_treated_as_stale() {
    let factory = StuckFactory::default();
    let created = factory.created.clone();
    let hub = HubHandle::new(BroadcastHub::new(factory.source_url(), ""));
    let token = CancellationToken::new();
    let options = IngestOptions {
        stale_timeout: Duration::from_millis(100),
        ..fast_options()
    };
    let handle = tokio::spawn(
        IngestionLoop::new(
            Arc::new(factory),
            Renderer::new(200, '-', 10),
            hub,
            options,
            token.clone(),
        )
        .run(),
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    token.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop stuck behind a hung poll")
        .expect("loop panicked");

    assert!(report.stats.stale >= 2, "stale fired {} times", report.stats.stale);
    assert!(report.stats.sessions >= 2);
    assert_eq!(report.stats.cycles, report.stats.sessions);
    assert_eq!(*created.lock().unwrap() as u64, report.stats.sessions);
}

#[tokio::test]
async fn test_stale_watchdog_disabled() {
    let harness = start(ScriptedFactory::default(), fast_options());
    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = harness.stop().await;

    assert_eq!(report.stats.stale, 0);
    assert_eq!(report.stats.sessions, 1);
}

#[tokio::test]
async fn test_shutdown_interrupts_retry_wait() {
    let options = IngestOptions {
        retry_wait: Duration::from_secs(600),
        ..fast_options()
    };
    let factory = ScriptedFactory::new(vec![Step::Dead]);
    let harness = start(factory, options);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let began = Instant::now();
    let report = harness.stop().await;
    assert!(began.elapsed() < Duration::from_secs(3));
    assert_eq!(report.stats.not_alive, 1);
}

#[tokio::test]
async fn test_max_lines_applied_to_broadcast() {
    let options = IngestOptions {
        max_lines: 2,
        ..fast_options()
    };
    let factory = ScriptedFactory::new(vec![Step::Batch(vec![
        item("a", "one"),
        item("b", "two"),
    ])]);
    let harness = start(factory, options);
    harness.wait_for("two").await;
    let snapshot = harness.hub.snapshot();
    harness.stop().await;

    assert_eq!(snapshot.lines().count(), 2);
    assert!(snapshot.ends_with("----------"));
}

fn write_lines(file: &mut std::fs::File, lines: &[&str]) {
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
}

#[test]
fn test_feed_missing_file_fails_creation() {
    let dir = tempfile::tempdir().unwrap();
    let factory = JsonLinesFeedFactory::new(dir.path().join("absent.jsonl"), "url");
    assert!(factory.create().is_err());
}

#[test]
fn test_feed_reads_appended_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    write_lines(
        &mut file,
        &[
            r#"{"id":"1","timestamp_ms":1,"author":"a","text":"hi"}"#,
            "not json",
            "",
            r#"{"id":"2","timestamp_ms":2,"author":"b","message":"yo"}"#,
        ],
    );

    let factory = JsonLinesFeedFactory::new(&path, "url");
    let mut source = factory.create().unwrap();
    assert!(source.is_alive());

    let items = source.poll().unwrap();
    assert_eq!(
        items,
        vec![ChatItem::new("1", 1, "a", "hi"), ChatItem::new("2", 2, "b", "yo")]
    );
    assert!(source.poll().unwrap().is_empty());

    // A partial line waits for its newline.
    write!(file, r#"{{"id":"3","timestamp_ms":3,"author":"c","#).unwrap();
    file.flush().unwrap();
    assert!(source.poll().unwrap().is_empty());
    writeln!(file, r#""text":"done"}}"#).unwrap();
    file.flush().unwrap();
    assert_eq!(source.poll().unwrap(), vec![ChatItem::new("3", 3, "c", "done")]);
}

#[test]
fn test_feed_resumes_across_sessions_and_handles_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    write_lines(
        &mut file,
        &[r#"{"id":"1","timestamp_ms":1,"author":"a","text":"old"}"#],
    );

    let factory = JsonLinesFeedFactory::new(&path, "url");
    let mut first = factory.create().unwrap();
    assert_eq!(first.poll().unwrap().len(), 1);
    first.terminate();
    first.terminate();
    assert!(!first.is_alive());
    assert!(first.poll().is_err());

    write_lines(
        &mut file,
        &[r#"{"id":"2","timestamp_ms":2,"author":"a","text":"new"}"#],
    );
    let mut second = factory.create().unwrap();
    assert_eq!(second.poll().unwrap(), vec![ChatItem::new("2", 2, "a", "new")]);

    let mut rewritten = std::fs::File::create(&path).unwrap();
    write_lines(
        &mut rewritten,
        &[r#"{"id":"9","timestamp_ms":9,"author":"z","text":"reset"}"#],
    );
    assert_eq!(second.poll().unwrap(), vec![ChatItem::new("9", 9, "z", "reset")]);
}

#[test]
fn test_feed_not_alive_after_removal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.jsonl");
    std::fs::File::create(&path).unwrap();

    let factory = JsonLinesFeedFactory::new(&path, "https://example.test");
    assert_eq!(factory.source_url(), "https://example.test");
    let mut source = factory.create().unwrap();
    assert!(source.is_alive());

    std::fs::remove_file(&path).unwrap();
    assert!(!source.is_alive());
}
