use medchain_core::{Block, Chain, ChainViolation, EntityRecord, EntityRole, Ledger, Transaction};
use medchain_core::Address;
use proptest::prelude::*;

fn entity_chain(entries: &[String]) -> Chain<EntityRecord> {
    let mut chain = Chain::new("Mr. Black", EntityRecord::genesis("Mr. Black", EntityRole::Patient));
    for (i, illness) in entries.iter().enumerate() {
        chain
            .append(EntityRecord::Diagnosis {
                illness: illness.clone(),
                patient: Address::from_name("Mr. Black"),
                doctor: Address::from_name("Dr. Green"),
                ledger_index: i as u64 + 1,
            })
            .unwrap();
    }
    chain
}

/// Rebuild `chain` with block `at` replaced by a payload-tampered copy that
/// keeps its old hash.
fn with_tampered_payload(chain: &Chain<EntityRecord>, at: usize) -> Chain<EntityRecord> {
    let blocks = chain
        .blocks()
        .iter()
        .enumerate()
        .map(|(i, block)| {
            if i == at {
                Block::from_raw(
                    block.index(),
                    block.timestamp(),
                    EntityRecord::genesis("forged", EntityRole::Doctor),
                    block.previous_hash().to_string(),
                    block.hash().to_string(),
                )
            } else {
                block.clone()
            }
        })
        .collect();
    Chain::from_blocks(chain.owner(), blocks).unwrap()
}

proptest! {
    #[test]
    fn appended_chains_always_verify(entries in prop::collection::vec("[a-z]{1,12}", 0..24)) {
        let chain = entity_chain(&entries);
        prop_assert_eq!(chain.size(), entries.len());
        prop_assert!(chain.verify().is_valid());
    }

    #[test]
    fn tampering_is_caught_at_block_and_successor(len in 2usize..16, pick in any::<prop::sample::Index>()) {
        let entries: Vec<String> = (0..len).map(|i| format!("illness{i}")).collect();
        let chain = entity_chain(&entries);
        let at = 1 + pick.index(len);
        let tampered = with_tampered_payload(&chain, at);

        let report = tampered.verify();
        prop_assert!(!report.is_valid());
        prop_assert_eq!(&report.violations[0], &ChainViolation::WrongHash { index: at });
        if at + 1 < tampered.len() {
            prop_assert_eq!(&report.violations[1], &ChainViolation::WrongPreviousHash { index: at + 1 });
            prop_assert_eq!(report.violations.len(), 2);
        } else {
            prop_assert_eq!(report.violations.len(), 1);
        }
    }
}

#[test_log::test]
fn chain_json_projection_round_trips() {
    let chain = entity_chain(&["illness1".to_string(), "illness2".to_string()]);
    let json = chain.to_json().unwrap();
    let parsed: Chain<EntityRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.blocks(), chain.blocks());
    assert!(parsed.verify().is_valid());
}

#[test_log::test]
fn missing_block_breaks_index_sequence() {
    let chain = entity_chain(&["a".into(), "b".into(), "c".into()]);
    let mut blocks = chain.blocks().to_vec();
    blocks.remove(2);
    let gapped = Chain::from_blocks("Mr. Black", blocks).unwrap();

    let report = gapped.verify();
    assert_eq!(report.violations, vec![ChainViolation::WrongIndex { index: 2, found: 3 }]);
}

#[test_log::test]
fn ledger_seals_in_order() {
    let mut ledger = Ledger::new();
    for nonce in [11u64, 12, 13] {
        let tx = Transaction::Diagnosis {
            sender: Address::from_name("Dr. Green"),
            recipient: Address::from_name("Mr. Black"),
            illness: format!("illness{nonce}"),
            fee: 0.2,
        };
        ledger.submit(tx).unwrap();
        let batch = ledger.take_pending();
        ledger.seal(nonce, batch).unwrap();
    }

    assert_eq!(ledger.chain().size(), 3);
    assert_eq!(ledger.last_nonce(), 13);
    assert!(ledger.verify().is_valid());
}
