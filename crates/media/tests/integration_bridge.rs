//! Integrationstests fuer die Loopback-Medienbruecke (echte UDP-Sockets)

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use nostrrtc_media::{BridgeError, LoopbackBridge};
use nostrrtc_protocol::sdp;
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn engine_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

#[tokio::test]
async fn bruecke_lernt_ersten_absender() {
    let (bridge, mut rx) = LoopbackBridge::binden(0).await.unwrap();
    let engine = engine_socket().await;
    assert_eq!(bridge.peer(), None);

    engine
        .send_to(b"stun-binding", bridge.lokale_adresse())
        .await
        .unwrap();

    let empfangen = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Datagramm erwartet")
        .unwrap();
    assert_eq!(&empfangen[..], b"stun-binding");
    assert_eq!(bridge.peer(), Some(engine.local_addr().unwrap()));
}

#[tokio::test]
async fn zweiter_absender_wird_ignoriert() {
    let (bridge, mut rx) = LoopbackBridge::binden(0).await.unwrap();
    let erster = engine_socket().await;
    let zweiter = engine_socket().await;

    erster.send_to(b"eins", bridge.lokale_adresse()).await.unwrap();
    let _ = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();

    zweiter.send_to(b"fremd", bridge.lokale_adresse()).await.unwrap();
    erster.send_to(b"zwei", bridge.lokale_adresse()).await.unwrap();

    let naechstes = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&naechstes[..], b"zwei");
    assert_eq!(bridge.peer(), Some(erster.local_addr().unwrap()));
}

#[tokio::test]
async fn senden_an_gelernten_peer() {
    let (bridge, mut rx) = LoopbackBridge::binden(0).await.unwrap();
    let engine = engine_socket().await;

    // Vor dem Lernen still verworfen
    bridge.senden(b"verloren").await.unwrap();

    engine.send_to(b"hallo", bridge.lokale_adresse()).await.unwrap();
    let _ = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();

    bridge.senden(b"antwort").await.unwrap();

    let mut buf = [0u8; 64];
    let (len, von) = timeout(Duration::from_secs(2), engine.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..len], b"antwort");
    assert_eq!(von, bridge.lokale_adresse());
}

#[tokio::test]
async fn close_ist_idempotent_und_beendet_queue() {
    let (bridge, mut rx) = LoopbackBridge::binden(0).await.unwrap();
    bridge.close();
    bridge.close();
    assert!(bridge.ist_geschlossen());

    let ende = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(ende.is_none());
    assert!(matches!(
        bridge.senden(b"x").await,
        Err(BridgeError::Geschlossen)
    ));
}

#[tokio::test]
async fn belegter_port_liefert_bind_fehler() {
    let (bridge, _rx) = LoopbackBridge::binden(0).await.unwrap();
    let port = bridge.lokale_adresse().port();

    let ergebnis = LoopbackBridge::binden(port).await;
    assert!(matches!(ergebnis, Err(BridgeError::Binden { .. })));
}

#[tokio::test]
async fn volle_queue_verwirft_datagramme() {
    let (bridge, mut rx) = LoopbackBridge::binden_mit_queue(0, 1).await.unwrap();
    let engine = engine_socket().await;

    for i in 0..5u8 {
        engine.send_to(&[i], bridge.lokale_adresse()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let erstes = rx.recv().await.unwrap();
    assert_eq!(&erstes[..], &[0]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn kandidat_und_bruecke_teilen_die_adresse() {
    let frei = engine_socket().await;
    let port = frei.local_addr().unwrap().port();
    drop(frei);

    // ::1 steht vorne, die Bruecke bindet aber nur IPv4
    let angebot = format!(
        "v=0\r\n\
         a=candidate:1 1 udp 2122260223 ::1 {port} typ host\r\n\
         a=candidate:2 1 udp 2122129151 127.0.0.1 {port} typ host\r\n"
    );
    let kandidat = sdp::erster_loopback_kandidat(&angebot).unwrap();
    assert_eq!(kandidat.foundation, "2");

    let (bridge, mut rx) = LoopbackBridge::binden(kandidat.port).await.unwrap();
    let erwartet = SocketAddr::new(kandidat.ip, kandidat.port);
    assert_eq!(bridge.lokale_adresse(), erwartet);
    assert_eq!(erwartet.ip(), Ipv4Addr::LOCALHOST);

    // Die Engine sendet an die Adresse aus ihrem Kandidaten
    let engine = engine_socket().await;
    engine.send_to(b"rtp", erwartet).await.unwrap();
    let empfangen = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Datagramm erwartet")
        .unwrap();
    assert_eq!(&empfangen[..], b"rtp");
}

#[tokio::test]
async fn nur_ipv6_loopback_ergibt_keinen_kandidaten() {
    let angebot = "v=0\r\na=candidate:1 1 udp 2122260223 ::1 40000 typ host\r\n";
    assert!(sdp::erster_loopback_kandidat(angebot).is_err());
}
