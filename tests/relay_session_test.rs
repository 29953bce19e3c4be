//! Tests for a full relay session over loopback TCP

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use revpipe::config::{RelayConfig, Target};
use revpipe::relay::{DuplexRelay, Session, SessionEnd, Side};
use revpipe::EndpointConnector;

/// Two listening peers plus the relay connected to both of them
async fn establish() -> (Session<TcpStream>, TcpStream, TcpStream) {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let config = RelayConfig::new(
        Target::new("127.0.0.1", listener_a.local_addr().unwrap().port()),
        Target::new("127.0.0.1", listener_b.local_addr().unwrap().port()),
    );

    let connector = EndpointConnector::from_config(&config);
    let (first, second) = connector.connect_pair(&config).await.unwrap();

    let (peer_a, _) = listener_a.accept().await.unwrap();
    let (peer_b, _) = listener_b.accept().await.unwrap();

    (Session::new(first, second), peer_a, peer_b)
}

#[tokio::test]
async fn test_ping_then_close() {
    let (session, mut peer_a, mut peer_b) = establish().await;
    let relay = tokio::spawn(async move { DuplexRelay::new().run(session).await });

    peer_a.write_all(b"PING").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(Duration::from_secs(5), peer_b.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"PING");

    drop(peer_a);

    let outcome = timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
    assert!(matches!(outcome.end, SessionEnd::PeerClosed(Side::First)));
    assert_eq!(outcome.stats.bytes_first_to_second, 4);
    assert_eq!(outcome.stats.bytes_second_to_first, 0);

    let mut rest = Vec::new();
    let n = timeout(Duration::from_secs(5), peer_b.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_bidirectional_exchange() {
    let (session, mut peer_a, mut peer_b) = establish().await;
    let relay = tokio::spawn(async move { DuplexRelay::new().run(session).await });

    for round in 0..10u8 {
        let request = vec![round; 100];
        peer_a.write_all(&request).await.unwrap();
        let mut got = vec![0u8; request.len()];
        peer_b.read_exact(&mut got).await.unwrap();
        assert_eq!(got, request);

        let reply = vec![round.wrapping_add(100); 50];
        peer_b.write_all(&reply).await.unwrap();
        let mut got = vec![0u8; reply.len()];
        peer_a.read_exact(&mut got).await.unwrap();
        assert_eq!(got, reply);
    }

    drop(peer_b);
    let outcome = timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
    assert!(matches!(outcome.end, SessionEnd::PeerClosed(Side::Second)));
    assert_eq!(outcome.stats.bytes_first_to_second, 1000);
    assert_eq!(outcome.stats.bytes_second_to_first, 500);
    assert_eq!(outcome.stats.total_bytes, 1500);

    let mut rest = Vec::new();
    timeout(Duration::from_secs(5), peer_a.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
#[allow(deprecated)]
async fn test_reset_peer_ends_session() {
    let (session, peer_a, mut peer_b) = establish().await;
    let relay = tokio::spawn(async move { DuplexRelay::new().run(session).await });

    // Zero linger turns the close into a reset.
    peer_a.set_linger(Some(Duration::ZERO)).unwrap();
    drop(peer_a);

    let outcome = timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
    assert_eq!(outcome.end.side(), Some(Side::First));

    let mut rest = Vec::new();
    timeout(Duration::from_secs(5), peer_b.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_idle_session_stays_open() {
    let (session, mut peer_a, mut peer_b) = establish().await;
    let relay = tokio::spawn(async move { DuplexRelay::new().run(session).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!relay.is_finished());

    peer_b.write_all(b"still here").await.unwrap();
    let mut buf = [0u8; 10];
    peer_a.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"still here");

    drop(peer_a);
    timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
}
