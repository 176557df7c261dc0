use super::*;
use crate::error::ChannelError;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

type ServerConn = Framed<DuplexStream, LinesCodec>;

const WAIT: Duration = Duration::from_secs(2);

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(40))
}

fn started_client() -> (ChannelClient, DuplexServer) {
    let (connector, server) = DuplexConnector::pair(64 * 1024);
    let client = ChannelClient::new(1024 * 1024);
    client.start(connector, fast_policy());
    (client, server)
}

async fn accept(server: &mut DuplexServer) -> ServerConn {
    let stream = timeout(WAIT, server.accept()).await.unwrap().unwrap();
    Framed::new(stream, LinesCodec::new())
}

async fn wait_status(client: &ChannelClient, status: ConnectionStatus) {
    let mut rx = client.subscribe_status();
    timeout(WAIT, rx.wait_for(|s| *s == status))
        .await
        .unwrap()
        .unwrap();
}

async fn read_envelope(conn: &mut ServerConn) -> Envelope {
    let line = timeout(WAIT, conn.next()).await.unwrap().unwrap().unwrap();
    Envelope::from_line(&line).unwrap()
}

#[tokio::test]
async fn test_send_requires_connection() {
    let client = ChannelClient::new(1024);
    let outbound = Outbound::new(
        CorrelationId::new(1),
        OutboundMessage::GetAttendance(AttendanceQuery::default()),
    );

    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.send(&outbound), Err(ChannelError::NotConnected));
}

#[tokio::test]
async fn test_request_carries_correlation_id() {
    let (client, mut server) = started_client();
    let mut conn = accept(&mut server).await;
    wait_status(&client, ConnectionStatus::Connected).await;

    client
        .send(&Outbound::new(
            CorrelationId::new(7),
            OutboundMessage::GetAttendance(AttendanceQuery::default()),
        ))
        .unwrap();

    let envelope = read_envelope(&mut conn).await;
    assert_eq!(envelope.event, names::GET_ATTENDANCE);
    assert_eq!(envelope.correlation_id, Some(CorrelationId::new(7)));
    assert_eq!(envelope.data, json!({}));

    client.shutdown().await;
}

#[tokio::test]
async fn test_handlers_run_in_subscription_order() {
    let (client, mut server) = started_client();
    let (tx, mut rx) = mpsc::unbounded_channel::<(&'static str, Envelope)>();

    let first = tx.clone();
    client.on(names::RECOGNITION_SUCCESS, move |env| {
        let _ = first.send(("first", env.clone()));
    });
    let second = tx.clone();
    client.on(names::RECOGNITION_SUCCESS, move |env| {
        let _ = second.send(("second", env.clone()));
    });
    let other = tx;
    client.on(names::ATTENDANCE_DATA, move |env| {
        let _ = other.send(("other", env.clone()));
    });

    let mut conn = accept(&mut server).await;
    conn.send(
        json!({
            "event": "recognition_success",
            "data": {"students": [], "timestamp": "2024-03-01 09:00:00"},
            "correlation_id": 3
        })
        .to_string(),
    )
    .await
    .unwrap();

    let (tag, envelope) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(tag, "first");
    assert_eq!(envelope.correlation_id, Some(CorrelationId::new(3)));
    let (tag, _) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(tag, "second");
    assert!(rx.try_recv().is_err());

    client.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let (client, mut server) = started_client();
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    client.on(names::ERROR, move |env| {
        let _ = tx.send(env.clone());
    });

    let mut conn = accept(&mut server).await;
    conn.send("this is not json".to_string()).await.unwrap();
    conn.send(r#"{"data": {}}"#.to_string()).await.unwrap();
    conn.send(r#"{"event": "error", "data": {"error": "boom"}}"#.to_string())
        .await
        .unwrap();

    let envelope = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(envelope.data, json!({"error": "boom"}));
    assert!(envelope.correlation_id.is_none());
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_connection_loss() {
    let (client, mut server) = started_client();
    let conn = accept(&mut server).await;
    wait_status(&client, ConnectionStatus::Connected).await;

    server.set_refusing(true);
    drop(conn);
    wait_status(&client, ConnectionStatus::Disconnected).await;

    let outbound = Outbound::new(
        CorrelationId::new(1),
        OutboundMessage::GetAttendance(AttendanceQuery::default()),
    );
    assert_eq!(client.send(&outbound), Err(ChannelError::NotConnected));

    server.set_refusing(false);
    let mut conn = accept(&mut server).await;
    wait_status(&client, ConnectionStatus::Connected).await;

    client.send(&outbound).unwrap();
    let envelope = read_envelope(&mut conn).await;
    assert_eq!(envelope.event, names::GET_ATTENDANCE);

    client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_stream() {
    let (client, mut server) = started_client();
    let mut conn = accept(&mut server).await;
    wait_status(&client, ConnectionStatus::Connected).await;

    client.shutdown().await;

    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    let next = timeout(WAIT, conn.next()).await.unwrap();
    assert!(next.is_none());
}

#[test]
fn test_inbound_accepts_numeric_identity_fields() {
    let envelope = Envelope::new(
        names::RECOGNITION_SUCCESS,
        json!({
            "students": [{
                "name": "Asha",
                "reg_no": 2021001,
                "semester": 5,
                "phone": 9876543210u64,
                "confidence": 0.9312,
                "distance": 0.31
            }],
            "timestamp": "2024-03-01 09:00:00"
        }),
    );

    let message = InboundMessage::from_envelope(&envelope).unwrap().unwrap();
    let InboundMessage::RecognitionSuccess(result) = message else {
        panic!("unexpected message {:?}", message);
    };
    let student = &result.students[0];
    assert_eq!(student.reg_no, "2021001");
    assert_eq!(student.semester, "5");
    assert_eq!(student.phone, "9876543210");
    assert_eq!(student.distance, Some(0.31));
}

#[test]
fn test_inbound_unknown_name_is_ignored() {
    let envelope = Envelope::new("server_stats", json!({"load": 1}));
    assert_eq!(InboundMessage::from_envelope(&envelope).unwrap(), None);
}

#[test]
fn test_inbound_bad_payload_is_malformed() {
    let envelope = Envelope::new(names::REGISTRATION_SUCCESS, json!({"reg_no": "x"}));
    assert!(matches!(
        InboundMessage::from_envelope(&envelope),
        Err(ChannelError::Malformed { .. })
    ));
}

#[test]
fn test_inbound_error_without_text_gets_default() {
    let envelope = Envelope::new(names::RECOGNITION_ERROR, serde_json::Value::Null);
    assert_eq!(
        InboundMessage::from_envelope(&envelope).unwrap(),
        Some(InboundMessage::RecognitionError(ServerError {
            error: "Unknown server error".to_string()
        }))
    );
}

#[test]
fn test_envelope_omits_missing_correlation() {
    let line = Envelope::new(names::GET_ATTENDANCE, json!({})).to_line().unwrap();
    assert!(!line.contains("correlation_id"));

    let tagged = Envelope::new(names::GET_ATTENDANCE, json!({}))
        .with_correlation(CorrelationId::new(42))
        .to_line()
        .unwrap();
    assert!(tagged.contains(r#""correlation_id":42"#));
}
