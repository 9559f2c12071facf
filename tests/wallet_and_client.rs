//! Integration tests for the wallet and the HTTP client against a live server

use coinledger::api::{run_api_server, Node};
use coinledger::blockchain::ProposedBlock;
use coinledger::client::{ClientError, NodeClient};
use coinledger::ledger::Ledger;
use coinledger::persistence::Database;
use coinledger::wallet::Wallet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Starts a server on an ephemeral port backed by a fresh SQLite file.
async fn spawn_node(
    dir: &TempDir,
) -> (NodeClient, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let db = Database::create_fresh(dir.path().join("ledger.db")).expect("Failed to open database");
    let ledger = Ledger::new(Box::new(db));
    ledger.seed_genesis().expect("Failed to seed genesis");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let node = Arc::new(Node::new(ledger));
    let handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        run_api_server(node, listener, shutdown)
            .await
            .map_err(|e| e.to_string())
            .expect("Server failed");
    });

    (NodeClient::new(format!("http://{}", addr)), stop_tx, handle)
}

#[test]
fn test_wallets_from_distinct_passwords_differ() {
    let alice = Wallet::from_password("alice-password");
    let bob = Wallet::from_password("bob-password");

    assert_ne!(alice.address(), bob.address());
    assert_ne!(alice.secret(), bob.secret());
    assert_eq!(alice, Wallet::from_password("alice-password"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wallet_flow_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (client, stop, handle) = spawn_node(&dir).await;

    let alice = Wallet::from_password("alice-password");
    let bob = Wallet::from_password("bob-password");

    for nonce in ["a", "b", "c"] {
        let tip = client.latest_block_hash().await?;
        client
            .submit_block(&ProposedBlock::mine(&tip, &alice.address(), nonce))
            .await?;
    }
    assert_eq!(client.get_address(&alice.address()).await?.balance, 3);
    assert_eq!(client.total_supply().await?, 3);

    let tx = client
        .create_transaction(alice.secret(), &bob.address(), 2)
        .await?;
    assert_eq!(tx.sender, alice.address());
    assert_eq!(client.get_transaction(tx.id).await?, Some(tx.clone()));
    assert_eq!(client.get_transaction(9_999).await?, None);

    assert_eq!(client.get_address(&bob.address()).await?.balance, 2);
    assert_eq!(client.list_address_transactions(&bob.address()).await?, vec![tx]);
    assert_eq!(client.list_transactions().await?.len(), 4);
    assert_eq!(client.list_addresses().await?.len(), 2);
    assert_eq!(client.list_blocks().await?.len(), 4);

    let overdraft = client
        .create_transaction(bob.secret(), &alice.address(), 5)
        .await;
    assert!(matches!(overdraft, Err(ClientError::Rejected { .. })));

    let stale = ProposedBlock::mine("0", &bob.address(), "late");
    let err = client.submit_block(&stale).await.unwrap_err();
    assert!(err.is_chain_mismatch());

    let _ = stop.send(());
    handle.await?;
    Ok(())
}
