//! 서버와 클라이언트를 루프백에서 실제로 주고받는 통합 테스트

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use netcomm::receiver::EventReceiver;
use netcomm::{Client, Config, Error, ProbeOutcome, Server, ServerEvent};

struct Running {
    server: Arc<Server>,
    events: EventReceiver,
    handle: JoinHandle<netcomm::Result<()>>,
}

impl Running {
    fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// 다음 완료 메시지까지 이벤트 소비
    async fn next_message(&mut self) -> (SocketAddr, Bytes) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("이벤트 대기 시간 초과")
                .expect("이벤트 채널 닫힘");
            if let ServerEvent::MessageComplete { peer, message } = event {
                return (peer, message);
            }
        }
    }

    /// 조건을 만족하는 이벤트까지 소비
    async fn wait_for(&mut self, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("이벤트 대기 시간 초과")
                .expect("이벤트 채널 닫힘");
            if pred(&event) {
                return event;
            }
        }
    }
}

async fn start_server(config: Config) -> Running {
    let (server, events) = Server::bind(config, "127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind failed");
    let server = Arc::new(server);
    let task_server = server.clone();
    let handle = tokio::spawn(async move { task_server.run().await });

    Running {
        server,
        events,
        handle,
    }
}

fn client_config() -> Config {
    Config {
        reply_timeout_ms: Some(200),
        max_timeouts: 5,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_hi_end_to_end() {
    let mut running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();

    let receipt = client.send_text("hi").await.unwrap();
    assert_eq!(receipt.data_frames, 1);
    assert_eq!(receipt.frames_sent, 3);

    let fragment = running
        .wait_for(|e| matches!(e, ServerEvent::Fragment { .. }))
        .await;
    match fragment {
        ServerEvent::Fragment {
            sequence, payload, ..
        } => {
            assert_eq!(sequence, 1);
            assert_eq!(payload.as_ref(), b"hi");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let (_, message) = running.next_message().await;
    assert_eq!(message.as_ref(), b"hi");

    // connect init + 메시지 init + data + last
    let stats = running.server.stats();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.checksum_failures, 0);

    running.server.stop();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_multi_fragment_message() {
    let mut running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();

    let message: String = (0..1500).map(|i| (b'a' + (i % 26) as u8) as char).collect();
    let receipt = client.send_text(&message).await.unwrap();
    assert_eq!(receipt.fragments, 3);
    assert_eq!(receipt.data_frames, 3);

    let (_, received) = running.next_message().await;
    assert_eq!(received.as_ref(), message.as_bytes());
}

#[tokio::test]
async fn test_exact_multiple_of_fragment_size() {
    let mut running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();

    let message = "x".repeat(511 * 2);
    let receipt = client.send_text(&message).await.unwrap();
    assert_eq!(receipt.fragments, 3);
    assert_eq!(receipt.data_frames, 2);

    let (_, received) = running.next_message().await;
    assert_eq!(received.len(), 1022);
}

#[tokio::test]
async fn test_corrupted_frames_are_resent() {
    let mut running = start_server(Config::default()).await;
    let config = Config {
        corruption_rate: 0.3,
        ..client_config()
    };
    let client = Client::connect(config, running.addr()).await.unwrap();

    let message = "The quick brown fox jumps over the lazy dog. ".repeat(200);
    client.send_text(&message).await.unwrap();

    let (_, received) = running.next_message().await;
    assert_eq!(received.as_ref(), message.as_bytes());

    let server_stats = running.server.stats();
    let client_stats = client.stats();
    assert_eq!(server_stats.checksum_failures, client_stats.resend_requests);
    assert_eq!(client_stats.retransmissions, client_stats.resend_requests);
}

#[tokio::test]
async fn test_diagnostic_probe_detected() {
    let running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();

    let outcome = client.run_diagnostic().await.unwrap();
    assert_eq!(
        outcome,
        ProbeOutcome::Rejected {
            attempts: 5,
            fatal: false
        }
    );
    assert_eq!(running.server.stats().checksum_failures, 5);
}

#[tokio::test]
async fn test_diagnostic_probe_hits_integrity_limit() {
    let config = Config {
        server_resend_limit: Some(2),
        ..Config::default()
    };
    let running = start_server(config).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();

    let outcome = client.run_diagnostic().await.unwrap();
    assert_eq!(
        outcome,
        ProbeOutcome::Rejected {
            attempts: 2,
            fatal: true
        }
    );
    assert_eq!(running.server.stats().integrity_errors, 1);
}

#[tokio::test]
async fn test_disconnect_closes_session() {
    let mut running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();
    running
        .wait_for(|e| matches!(e, ServerEvent::SessionOpened { .. }))
        .await;
    assert_eq!(running.server.receiver().session_count(), 1);

    client.disconnect().await.unwrap();
    running
        .wait_for(|e| matches!(e, ServerEvent::SessionClosed { .. }))
        .await;
    assert_eq!(running.server.receiver().session_count(), 0);

    // 기본 설정에서는 계속 수신
    assert!(!running.handle.is_finished());
    running.server.stop();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_on_disconnect() {
    let config = Config {
        stop_on_disconnect: true,
        ..Config::default()
    };
    let running = start_server(config).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();
    client.send_text("bye").await.unwrap();
    client.disconnect().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .expect("수신 루프가 끝나지 않음")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_clients_have_separate_sessions() {
    let mut running = start_server(Config::default()).await;
    let alpha = Client::connect(client_config(), running.addr()).await.unwrap();
    let beta = Client::connect(client_config(), running.addr()).await.unwrap();

    let alpha_text = "alpha-".repeat(300);
    let beta_text = "beta-".repeat(300);
    let (a, b) = tokio::join!(alpha.send_text(&alpha_text), beta.send_text(&beta_text));
    a.unwrap();
    b.unwrap();

    let mut by_port = HashMap::new();
    for _ in 0..2 {
        let (peer, message) = running.next_message().await;
        by_port.insert(peer.port(), message);
    }

    let alpha_port = alpha.local_addr().unwrap().port();
    let beta_port = beta.local_addr().unwrap().port();
    assert_eq!(by_port[&alpha_port].as_ref(), alpha_text.as_bytes());
    assert_eq!(by_port[&beta_port].as_ref(), beta_text.as_bytes());
}

#[tokio::test]
async fn test_run_client_sends_each_line() {
    let mut running = start_server(Config::default()).await;
    let input: &[u8] = b"first line\n\nsecond line\n";

    let stats = netcomm::run_client(client_config(), running.addr(), input)
        .await
        .unwrap();
    assert_eq!(stats.messages, 2);

    assert_eq!(running.next_message().await.1.as_ref(), b"first line");
    assert_eq!(running.next_message().await.1.as_ref(), b"second line");
    running
        .wait_for(|e| matches!(e, ServerEvent::SessionClosed { .. }))
        .await;
}

#[tokio::test]
async fn test_keepalive_acknowledged() {
    let running = start_server(Config::default()).await;
    let client = Client::connect(client_config(), running.addr()).await.unwrap();
    client.keepalive().await.unwrap();
    assert_eq!(running.server.stats().frames_received, 2);
}

#[tokio::test]
async fn test_connect_times_out_without_server() {
    // 바인딩만 하고 응답하지 않는 소켓
    let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        reply_timeout_ms: Some(30),
        max_timeouts: 2,
        ..Config::default()
    };

    let result = Client::connect(config, silent.local_addr().unwrap()).await;
    assert!(matches!(
        result,
        Err(Error::Timeout {
            sequence: 1,
            attempts: 2
        })
    ));
}

#[tokio::test]
async fn test_server_without_event_reader_keeps_replying() {
    let (server, events) = Server::bind(Config::default(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    drop(events);
    let server = Arc::new(server);
    let task_server = server.clone();
    let handle = tokio::spawn(async move { task_server.run().await });

    let client = Client::connect(client_config(), server.local_addr()).await.unwrap();
    for i in 0..5 {
        client.send_text(&format!("message {}", i)).await.unwrap();
    }
    assert_eq!(server.stats().messages, 5);

    server.stop();
    handle.await.unwrap().unwrap();
}
