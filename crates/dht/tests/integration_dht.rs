//! Integrationstests fuer den DHT-Server (zwei Knoten auf Loopback)

use std::time::{Duration, Instant};

use bytes::Bytes;
use libp2p::multiaddr::Protocol;
use nostrrtc_core::TransportPublicKey;
use nostrrtc_crypto::transport_schluessel_ableiten;
use nostrrtc_dht::{DhtConfig, DhtError, DhtEvent, DhtServer};
use tokio::time::timeout;

#[tokio::test]
async fn dial_ohne_erreichbaren_peer_liefert_zeitlimit() {
    let paar = transport_schluessel_ableiten(&[1u8; 32]).unwrap();
    let (server, _events) = DhtServer::starten(&paar, DhtConfig::lokal()).unwrap();
    server.listen().await.unwrap();

    let ziel = transport_schluessel_ableiten(&[2u8; 32]).unwrap().public();
    let start = Instant::now();
    let ergebnis = server.dial(&ziel, Duration::from_millis(800)).await;

    assert!(matches!(ergebnis, Err(DhtError::Zeitlimit)));
    assert!(start.elapsed() < Duration::from_secs(5));
    server.close().await;
}

#[tokio::test]
async fn listen_ist_idempotent() {
    let paar = transport_schluessel_ableiten(&[3u8; 32]).unwrap();
    let (server, _events) = DhtServer::starten(&paar, DhtConfig::lokal()).unwrap();

    let erste = server.listen().await.unwrap();
    let zweite = server.listen().await.unwrap();
    assert!(!erste.is_empty());
    assert_eq!(erste, zweite);
    assert!(server.lauscht());
    server.close().await;
}

#[tokio::test]
async fn close_ohne_listen_ist_harmlos() {
    let paar = transport_schluessel_ableiten(&[4u8; 32]).unwrap();
    let (server, _events) = DhtServer::starten(&paar, DhtConfig::lokal()).unwrap();
    server.close().await;
    server.close().await;

    let ziel = TransportPublicKey([9; 32]);
    assert!(matches!(
        server.dial(&ziel, Duration::from_millis(100)).await,
        Err(DhtError::Geschlossen)
    ));
}

#[tokio::test]
async fn dial_zu_sich_selbst_abgelehnt() {
    let paar = transport_schluessel_ableiten(&[5u8; 32]).unwrap();
    let (server, _events) = DhtServer::starten(&paar, DhtConfig::lokal()).unwrap();

    let ergebnis = server.dial(&paar.public(), Duration::from_secs(1)).await;
    assert!(matches!(ergebnis, Err(DhtError::Verbindung(_))));
    server.close().await;
}

#[tokio::test]
async fn zwei_knoten_tauschen_chunks() {
    let paar_a = transport_schluessel_ableiten(&[10u8; 32]).unwrap();
    let paar_b = transport_schluessel_ableiten(&[11u8; 32]).unwrap();

    let (a, mut events_a) = DhtServer::starten(&paar_a, DhtConfig::lokal()).unwrap();
    let adressen_a = a.listen().await.unwrap();
    let bootstrap = adressen_a[0].clone().with(Protocol::P2p(a.peer_id()));

    let config_b = DhtConfig {
        bootstrap: vec![bootstrap],
        ..DhtConfig::lokal()
    };
    let (b, _events_b) = DhtServer::starten(&paar_b, config_b).unwrap();
    b.listen().await.unwrap();

    let mut ausgehend = b
        .dial(&paar_a.public(), Duration::from_secs(10))
        .await
        .expect("Verbindung zu A");
    assert_eq!(ausgehend.remote(), paar_a.public());
    ausgehend.senden(Bytes::from_static(b"hallo")).await.unwrap();

    let DhtEvent::EingehendeVerbindung(mut eingehend) =
        timeout(Duration::from_secs(10), events_a.recv())
            .await
            .expect("eingehende Verbindung erwartet")
            .unwrap();
    assert_eq!(eingehend.remote(), paar_b.public());

    let chunk = timeout(Duration::from_secs(5), eingehend.empfangen())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(&chunk[..], b"hallo");

    b.close().await;
    a.close().await;
}
