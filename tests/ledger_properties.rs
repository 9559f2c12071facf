//! Randomized checks of conservation and chain linearity

use coinledger::blockchain::{ProposedBlock, BLOCK_REWARD};
use coinledger::crypto::derive_address;
use coinledger::ledger::Ledger;
use coinledger::persistence::InMemoryPersistence;
use proptest::prelude::*;

const SECRETS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[derive(Debug, Clone)]
enum Op {
    Mine { miner: usize },
    Transfer { from: usize, to: usize, amount: u64 },
    StaleBlock { miner: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SECRETS.len()).prop_map(|miner| Op::Mine { miner }),
        (0..SECRETS.len(), 0..SECRETS.len(), 0u64..6)
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
        (0..SECRETS.len()).prop_map(|miner| Op::StaleBlock { miner }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn supply_equals_minted_and_chain_stays_linear(ops in prop::collection::vec(op(), 1..40)) {
        let ledger = Ledger::new(Box::new(InMemoryPersistence::new()));
        ledger.seed_genesis().unwrap();
        let mut accepted_blocks = 0u64;

        for (step, op) in ops.iter().enumerate() {
            let supply_before = ledger.total_supply().unwrap();
            match op {
                Op::Mine { miner } => {
                    let tip = ledger.latest_block_hash().unwrap();
                    let miner = derive_address(SECRETS[*miner]);
                    let block = ProposedBlock::mine(&tip, &miner, &step.to_string());
                    ledger.submit_block(&block).unwrap();
                    accepted_blocks += 1;
                    prop_assert_eq!(ledger.total_supply().unwrap(), supply_before + BLOCK_REWARD);
                }
                Op::Transfer { from, to, amount } => {
                    let recipient = derive_address(SECRETS[*to]);
                    let _ = ledger.create_transaction(SECRETS[*from], &recipient, *amount);
                    prop_assert_eq!(ledger.total_supply().unwrap(), supply_before);
                }
                Op::StaleBlock { miner } => {
                    let block = ProposedBlock::mine("stale", &derive_address(SECRETS[*miner]), "x");
                    prop_assert!(ledger.submit_block(&block).is_err());
                    prop_assert_eq!(ledger.total_supply().unwrap(), supply_before);
                }
            }
        }

        let minted: u64 = ledger
            .list_transactions()
            .unwrap()
            .iter()
            .filter(|tx| tx.is_mint())
            .map(|tx| tx.amount)
            .sum();
        prop_assert_eq!(ledger.total_supply().unwrap(), minted);
        prop_assert_eq!(minted, accepted_blocks * BLOCK_REWARD);

        let balances: u64 = ledger.list_addresses().unwrap().iter().map(|a| a.balance).sum();
        prop_assert_eq!(balances, minted);

        let blocks = ledger.list_blocks().unwrap();
        prop_assert_eq!(blocks.len() as u64, accepted_blocks + 1);
        prop_assert_eq!(blocks[0].prev_hash.as_str(), "0");
        for pair in blocks.windows(2) {
            prop_assert_eq!(&pair[1].prev_hash, &pair[0].content_hash);
        }
        prop_assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn derived_addresses_are_well_formed(secret in ".*") {
        let address = derive_address(&secret);
        prop_assert!(coinledger::crypto::is_well_formed_address(&address));
        prop_assert_eq!(address, derive_address(&secret));
    }
}
