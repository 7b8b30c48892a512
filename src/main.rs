//! Runnable demonstration: one authority replica and two tracking
//! replicas synchronizing over the in-memory transport.

use futures::future::join_all;
use pdss_core::{OpaqueRef, Path, Value};
use pdss_net::star_network;
use pdss_store::{Role, Store};
use pdss_sync::{ClientReplicator, ServerReplicator, SyncConfig};
use std::sync::Arc;

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async_main());
}

async fn async_main() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║            LARIMAR PATH-DELTA REPLICATION DEMO             ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let (hub, spokes) = star_network(2);
    let authority = hub.local_id().clone();

    let server_store = Store::new(Role::Authority);
    let _server = ServerReplicator::spawn(server_store.clone(), Arc::new(hub))
        .expect("authority store on the hub");

    // Seed state before any client joins; late joiners receive it as one
    // snapshot, not a delta replay.
    server_store
        .set(
            &Path::root(),
            "Profile",
            Value::from_iter([("Level", Value::Int(1)), ("Name", Value::from("Kelberi"))]),
        )
        .unwrap();
    server_store
        .set(
            &Path::root(),
            "World",
            Value::from_iter([("Anchor", Value::Opaque(OpaqueRef::labeled("spawn-anchor")))]),
        )
        .unwrap();

    println!("\n-- authority seeded: {}", server_store.snapshot());

    let mut clients = Vec::new();
    for (n, spoke) in spokes.into_iter().enumerate() {
        let store = Store::new(Role::Tracking);
        store.bind_on_change(&Path::parse("Profile.Level"), move |level| {
            println!("   client {} saw Profile.Level -> {}", n, level);
        });
        let client = ClientReplicator::spawn(
            store.clone(),
            Arc::new(spoke),
            authority.clone(),
            SyncConfig::default(),
        )
        .expect("tracking store on a spoke");
        clients.push((store, client));
    }

    join_all(
        clients
            .iter()
            .map(|(_, client)| client.wait_live()),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()
    .expect("snapshot transfer");

    println!("-- both clients live");

    // Incremental deltas: one broadcast per write, scalars travel bare.
    let profile = server_store.handle(Path::parse("Profile")).unwrap();
    for level in 2..=4 {
        profile.set("Level", Value::Int(level)).unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    // Wait on replicated data instead of polling.
    for (n, (store, _)) in clients.iter().enumerate() {
        let value = store.wait("Profile").await;
        println!("   client {} Profile settled: {}", n, value);
    }

    println!("\n✓ demo complete");
}
