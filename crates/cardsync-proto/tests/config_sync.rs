//! Config-store round trip over real UDP sockets: a snapshot push followed
//! by a single-entry update applied on the far side without re-broadcast.

use cardsync_proto::config_store::ConfigStore;
use cardsync_proto::message::config_sync::{ConfigEntry, ConfigValueKind};
use cardsync_proto::message::{self, ConfigValue, ConfigValueList, Message};
use cardsync_proto::net::endpoint::UdpEndpoint;
use cardsync_proto::packet;

fn entry(category: &str, name: &str, value: ConfigValueKind) -> ConfigEntry {
    ConfigEntry { category: category.into(), name: name.into(), description: String::new(), value }
}

#[tokio::test]
async fn snapshot_then_update_round_trips_over_the_wire() {
    let server_store = ConfigStore::new();
    server_store.apply_snapshot(vec![
        entry("capture", "ViewportType", ConfigValueKind::Integer(2)),
        entry("capture", "Brightness", ConfigValueKind::Real(0.5)),
    ]);

    let server_endpoint = UdpEndpoint::bind_ephemeral().unwrap();
    let client_endpoint = UdpEndpoint::bind_ephemeral().unwrap();
    let client_addr = format!("127.0.0.1:{}", client_endpoint.local_port()).parse().unwrap();

    let snapshot_payload = message::to_payload(&ConfigValueList { entries: server_store.snapshot() });
    let bytes = packet::construct(&snapshot_payload).unwrap();
    server_endpoint.send_to(&bytes, client_addr).await.unwrap();

    let mut buf = [0u8; 4096];
    let (len, _) =
        client_endpoint.recv(&mut buf, std::time::Duration::from_secs(1)).await.unwrap().unwrap();
    let received = packet::deconstruct(&buf[..len]).unwrap();

    let client_store = ConfigStore::new();
    match message::decode(received) {
        Message::ConfigValueList(ConfigValueList { entries }) => {
            client_store.apply_snapshot(entries);
        }
        other => panic!("expected ConfigValueList, got {other:?}"),
    }
    assert_eq!(client_store.snapshot().len(), 2);
    assert_eq!(
        client_store.get("capture.ViewportType").unwrap().value,
        ConfigValueKind::Integer(2)
    );

    // Client mutates locally, sends the single-entry update back.
    let updated = client_store
        .set_local("capture.ViewportType", ConfigValueKind::Integer(7))
        .expect("value actually changed");
    let update_payload = message::to_payload(&ConfigValue { entry: updated });
    let bytes = packet::construct(&update_payload).unwrap();
    client_endpoint
        .send_to(&bytes, format!("127.0.0.1:{}", server_endpoint.local_port()).parse().unwrap())
        .await
        .unwrap();

    let (len, _) =
        server_endpoint.recv(&mut buf, std::time::Duration::from_secs(1)).await.unwrap().unwrap();
    let received = packet::deconstruct(&buf[..len]).unwrap();
    match message::decode(received) {
        Message::ConfigValue(ConfigValue { entry }) => {
            let changed = server_store.apply_update(entry);
            assert!(changed);
        }
        other => panic!("expected ConfigValue, got {other:?}"),
    }
    assert_eq!(
        server_store.get("capture.ViewportType").unwrap().value,
        ConfigValueKind::Integer(7)
    );

    // Re-applying the same update the server just absorbed must report "no
    // change" and must not touch the other entry.
    let unchanged = server_store
        .apply_update(entry("capture", "ViewportType", ConfigValueKind::Integer(7)));
    assert!(!unchanged);
    assert_eq!(
        server_store.get("capture.Brightness").unwrap().value,
        ConfigValueKind::Real(0.5)
    );
}
