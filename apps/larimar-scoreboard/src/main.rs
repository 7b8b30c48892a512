//! # Larimar Scoreboard
//!
//! A standalone CLI demo replicating a nested match scoreboard from one
//! authority to tracking replicas over the in-memory transport.
//!
//! ## State model
//!
//! ```text
//! path: Scores/<player>          →  Value::Int(points)
//! path: Match/Round              →  Value::Int(n)
//! path: Match/Stage              →  Value::Text(...)
//! ```
//!
//! Every write travels as one `(path, value)` delta; late joiners get a
//! single full snapshot.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use pdss_core::{Path, Value};
use pdss_net::star_network;
use pdss_store::{Role, Store};
use pdss_sync::{ClientReplicator, ServerReplicator, SyncConfig};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "larimar-scoreboard")]
#[command(about = "Path-delta replicated scoreboard demo (Larimar)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: two tracking replicas mirror the authority's writes
    Demo,
    /// Late join: a replica connects mid-match and catches up from one snapshot
    LateJoin,
    /// Divergence: a tracking replica writes locally and drifts, by design
    Divergence,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => demo().await,
        Commands::LateJoin => late_join().await,
        Commands::Divergence => divergence().await,
    }
}

// ─── Scenarios ─────────────────────────────────────────────────────────────

async fn demo() {
    banner("DEMO: two replicas mirror the authority");

    let cluster = boot(2).await;
    let server_store = &cluster.server_store;

    server_store
        .set(
            &Path::root(),
            "Scores",
            Value::from_iter([("kelberi", Value::Int(0)), ("mirra", Value::Int(0))]),
        )
        .unwrap();

    let scores = server_store.handle(Path::parse("Scores")).unwrap();
    for (player, points) in [("kelberi", 10), ("mirra", 25), ("kelberi", 35)] {
        scores.set(player, Value::Int(points)).unwrap();
        println!(
            "  {} {} -> {}",
            "write".yellow(),
            format!("Scores.{}", player).bold(),
            points
        );
    }

    settle().await;
    for (n, store) in cluster.client_stores.iter().enumerate() {
        println!(
            "  {} client {}: {}",
            "state".green(),
            n,
            store.get(&Path::parse("Scores")).unwrap()
        );
    }
    println!("{}", "✓ all replicas converged".green().bold());
}

async fn late_join() {
    banner("LATE JOIN: snapshot catch-up, no delta replay");

    let (hub, mut spokes) = star_network(2);
    let authority = hub.local_id().clone();
    let late_spoke = spokes.pop().unwrap();

    let server_store = Store::new(Role::Authority);
    let _server = ServerReplicator::spawn(server_store.clone(), Arc::new(hub)).unwrap();

    let early_store = Store::new(Role::Tracking);
    let early = ClientReplicator::spawn(
        early_store.clone(),
        Arc::new(spokes.pop().unwrap()),
        authority.clone(),
        SyncConfig::default(),
    )
    .unwrap();
    early.wait_live().await.unwrap();

    server_store
        .set(
            &Path::root(),
            "Match",
            Value::from_iter([("Round", Value::Int(1)), ("Stage", Value::from("groups"))]),
        )
        .unwrap();
    let match_ref = server_store.handle(Path::parse("Match")).unwrap();
    for round in 2..=5 {
        match_ref.set("Round", Value::Int(round)).unwrap();
    }
    println!("  {} five rounds played before the late replica joins", "info".cyan());

    let late_store = Store::new(Role::Tracking);
    let late = ClientReplicator::spawn(
        late_store.clone(),
        Arc::new(late_spoke),
        authority,
        SyncConfig::default(),
    )
    .unwrap();
    late.wait_live().await.unwrap();

    settle().await;
    println!(
        "  {} late replica sees: {}",
        "state".green(),
        late_store.get(&Path::parse("Match")).unwrap()
    );
    assert_eq!(late_store.snapshot(), server_store.snapshot());
    println!("{}", "✓ one snapshot, fully caught up".green().bold());
}

async fn divergence() {
    banner("DIVERGENCE: local writes on a tracking replica drift");

    let cluster = boot(1).await;
    let server_store = &cluster.server_store;
    let client_store = &cluster.client_stores[0];

    server_store
        .set(&Path::root(), "Scores", Value::from_iter([("kelberi", Value::Int(10))]))
        .unwrap();
    settle().await;

    // A tracking replica may write locally; nothing reconciles it.
    client_store
        .set(&Path::parse("Scores"), "kelberi", Value::Int(999))
        .unwrap();

    settle().await;
    println!(
        "  {} authority: {}",
        "state".green(),
        server_store.get(&Path::parse("Scores.kelberi")).unwrap()
    );
    println!(
        "  {} replica:   {}",
        "state".yellow(),
        client_store.get(&Path::parse("Scores.kelberi")).unwrap()
    );
    println!(
        "{}",
        "✓ divergence is accepted behavior: the authority never hears local writes"
            .yellow()
    );
}

// ─── Helpers ───────────────────────────────────────────────────────────────

/// A booted authority plus live tracking replicas. Replicator handles are
/// held here so their tasks survive for the scenario's duration.
struct Cluster {
    server_store: Arc<Store>,
    client_stores: Vec<Arc<Store>>,
    _server: ServerReplicator,
    _clients: Vec<ClientReplicator>,
}

async fn boot(replicas: usize) -> Cluster {
    let (hub, spokes) = star_network(replicas);
    let authority = hub.local_id().clone();

    let server_store = Store::new(Role::Authority);
    let server = ServerReplicator::spawn(server_store.clone(), Arc::new(hub)).unwrap();

    let mut client_stores = Vec::new();
    let mut clients = Vec::new();
    for spoke in spokes {
        let store = Store::new(Role::Tracking);
        let client = ClientReplicator::spawn(
            store.clone(),
            Arc::new(spoke),
            authority.clone(),
            SyncConfig::default(),
        )
        .unwrap();
        client.wait_live().await.unwrap();
        client_stores.push(store);
        clients.push(client);
    }

    Cluster {
        server_store,
        client_stores,
        _server: server,
        _clients: clients,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

fn banner(title: &str) {
    println!("\n{}", format!("── {} ──", title).bold().blue());
}
