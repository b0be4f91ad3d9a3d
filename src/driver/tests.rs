use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use super::{Relay, SHUTDOWN_REASON};
use crate::config::Settings;
use crate::ingest::JsonLinesFeedFactory;
use crate::transport::Frame;
use crate::transport::bind;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_message(ws: &mut Client) -> WsMessage {
    tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("read error")
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.buffer.max_messages = 3;
    settings.buffer.max_message_width = 40;
    settings.buffer.separator_len = 8;
    settings.ingest.poll_interval_ms = 10;
    settings.ingest.retry_wait_secs = 1;
    settings.ingest.stale_timeout_secs = 0;
    settings.ingest.console = false;
    settings.server.shutdown_grace_ms = 2000;
    settings
}

#[tokio::test]
async fn test_relay_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.jsonl");
    let mut feed = std::fs::File::create(&path).unwrap();

    let factory = Arc::new(JsonLinesFeedFactory::new(&path, "https://www.youtube.com/watch?v=e2e"));
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = CancellationToken::new();
    let relay = tokio::spawn(Relay::new(test_settings(), factory).serve(listener, stop.clone()));

    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    let greeting = next_message(&mut ws).await;
    assert_eq!(
        Frame::parse(greeting.to_text().unwrap()),
        Some(Frame::Data("https://www.youtube.com/watch?v=e2e".into()))
    );
    let snapshot = next_message(&mut ws).await;
    assert_eq!(
        Frame::parse(snapshot.to_text().unwrap()),
        Some(Frame::ChatBuffer("--------\n--------".into()))
    );

    writeln!(
        feed,
        r#"{{"id":"m1","timestamp_ms":1725000000000,"author":"alice","text":"hello relay"}}"#
    )
    .unwrap();
    feed.flush().unwrap();

    let update = next_message(&mut ws).await;
    match Frame::parse(update.to_text().unwrap()) {
        Some(Frame::ChatBuffer(text)) => {
            assert!(text.contains("<b>alice</b>: hello relay"), "{text}");
            assert!(text.starts_with("--------\n"));
        }
        other => panic!("expected chat buffer, got {other:?}"),
    }

    stop.cancel();
    match next_message(&mut ws).await {
        WsMessage::Close(Some(frame)) => assert_eq!(frame.reason.as_str(), SHUTDOWN_REASON),
        other => panic!("expected close frame, got {other:?}"),
    }

    let report = tokio::time::timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not stop")
        .expect("relay panicked")
        .expect("relay failed")
        .expect("ingestion report");
    assert_eq!(report.stats.accepted, 1);
    assert_eq!(report.buffer.len(), 1);
}
