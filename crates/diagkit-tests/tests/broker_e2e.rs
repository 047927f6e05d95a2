//! End-to-end broker behavior over the mock transport: serialization per
//! service id, pending handling, multiplexing and late-response hygiene.

use std::sync::Arc;
use std::time::Duration;

use diagkit_uds::{
    Broker, Component, EngineConfig, MockTransport, Request, Response, ServiceRegistry,
    TransportFrame, UdsError,
};

fn component() -> Component {
    Component::new("ecm", "Engine Control Module", 0x7E0, 0x7E8)
}

fn broker_over(transport: Arc<MockTransport>, budget_ms: u64) -> Arc<Broker> {
    Arc::new(
        Broker::builder(transport, ServiceRegistry::standard())
            .response_budget(Duration::from_millis(budget_ms))
            .start(),
    )
}

#[tokio::test]
async fn same_service_id_requests_are_serialized() {
    let transport = Arc::new(MockTransport::new());
    let broker = broker_over(transport.clone(), 5000);

    let first = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();

    let second = {
        let broker = broker.clone();
        tokio::spawn(async move {
            broker
                .request(&component(), Request::EcuReset { reset_type: 0x02 })
                .await
                .unwrap()
        })
    };

    // The second request must not hit the wire while the first
    // transaction is open.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second.is_finished());
    assert_eq!(transport.sent().len(), 1);

    drop(first);
    let second = second.await.unwrap();
    assert_eq!(transport.sent().len(), 2);
    drop(second);
}

#[tokio::test]
async fn distinct_service_ids_fly_concurrently() {
    let transport = Arc::new(MockTransport::new());
    let broker = broker_over(transport.clone(), 5000);

    let reset = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    // A different service id issues immediately, no contention.
    let session = broker
        .request(&component(), Request::SessionControl { session: 0x03 })
        .await
        .unwrap();

    assert_eq!(transport.sent().len(), 2);
    drop(reset);
    drop(session);
}

#[tokio::test]
async fn out_of_order_responses_match_by_service_id() {
    let transport = Arc::new(MockTransport::new());
    let broker = broker_over(transport.clone(), 2000);

    let reset = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    let session = broker
        .request(&component(), Request::SessionControl { session: 0x03 })
        .await
        .unwrap();

    // The bus answers in the opposite order of the requests.
    transport.inject(TransportFrame::new(0x7E8, vec![0x50, 0x03]));
    transport.inject(TransportFrame::new(0x7E8, vec![0x51, 0x01]));

    let session_response = session.wait().await.unwrap();
    let reset_response = reset.wait().await.unwrap();
    assert_eq!(
        session_response,
        Some(Response::SessionControl {
            session: 0x03,
            parameters: vec![]
        })
    );
    assert_eq!(
        reset_response,
        Some(Response::EcuReset { reset_type: 0x01 })
    );
}

#[tokio::test]
async fn pending_keeps_the_transaction_open_until_the_terminal_response() {
    let transport = Arc::new(MockTransport::new());
    // One send triggers: pending, pending, then the real answer.
    transport.enqueue_reply(vec![
        TransportFrame::new(0x7E8, vec![0x7F, 0x11, 0x78]),
        TransportFrame::new(0x7E8, vec![0x7F, 0x11, 0x78]),
        TransportFrame::new(0x7E8, vec![0x51, 0x01]),
    ]);
    let broker = broker_over(transport, 2000);

    let tx = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    assert_eq!(
        tx.wait().await.unwrap(),
        Some(Response::EcuReset { reset_type: 0x01 })
    );
}

#[tokio::test]
async fn pending_alone_never_completes() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x7F, 0x11, 0x78])]);
    let broker = broker_over(transport, 150);

    let tx = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    assert!(matches!(tx.wait().await.unwrap_err(), UdsError::Timeout));
}

#[tokio::test]
async fn terminal_negative_response_carries_sid_and_reason() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x7F, 0x10, 0x22])]);
    let broker = broker_over(transport, 2000);

    let tx = broker
        .request(&component(), Request::SessionControl { session: 0x02 })
        .await
        .unwrap();
    match tx.wait().await.unwrap_err() {
        UdsError::Negative { sid, code } => {
            assert_eq!(sid, 0x10);
            assert_eq!(u8::from(code), 0x22);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn late_responses_are_dropped_not_delivered_to_the_next_transaction() {
    let transport = Arc::new(MockTransport::new());
    let broker = broker_over(transport.clone(), 100);

    let tx = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    assert!(matches!(tx.wait().await.unwrap_err(), UdsError::Timeout));

    // The answer shows up after the transaction was torn down.
    transport.inject(TransportFrame::new(0x7E8, vec![0x51, 0x01]));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A fresh transaction for the same sid must not see the stale frame.
    let tx = broker
        .request(&component(), Request::EcuReset { reset_type: 0x02 })
        .await
        .unwrap();
    assert!(matches!(tx.wait().await.unwrap_err(), UdsError::Timeout));
}

#[tokio::test]
async fn engine_wired_from_toml_config() {
    let config = EngineConfig::from_toml_str(
        r#"
response_budget_ms = 500

[[components]]
id = "ecm"
send_id = "0x7E0"
reply_id = "0x7E8"
"#,
    )
    .unwrap();
    let components = config.components().unwrap();

    let transport = Arc::new(MockTransport::new());
    transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x50, 0x01])]);
    let broker = Broker::builder(transport, ServiceRegistry::standard())
        .response_budget(config.response_budget())
        .filter_replies_to(&components)
        .start();

    let tx = broker
        .request(&components[0], Request::SessionControl { session: 0x01 })
        .await
        .unwrap();
    assert!(tx.wait().await.unwrap().is_some());
}

#[tokio::test]
async fn undecodable_frames_only_skip_one_frame() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue_reply(vec![
        // Garbage sid, then a truncated negative response, then the answer.
        TransportFrame::new(0x7E8, vec![0x99, 0x00]),
        TransportFrame::new(0x7E8, vec![0x7F, 0x11]),
        TransportFrame::new(0x7E8, vec![0x51, 0x01]),
    ]);
    let broker = broker_over(transport, 2000);

    let tx = broker
        .request(&component(), Request::EcuReset { reset_type: 0x01 })
        .await
        .unwrap();
    assert_eq!(
        tx.wait().await.unwrap(),
        Some(Response::EcuReset { reset_type: 0x01 })
    );
}
