//! Reconciler tests against an in-memory chain
//!
//! Test 1: First cycle registers every live output and sets balances
//! Test 2: Applying a cycle then reconciling again is a no-op
//! Test 3: Vanished outputs are spent, new ones registered
//! Test 4: A failing address is isolated and its records untouched
//! Test 5: Records of unqueried addresses are never expired
//! Test 6: Balance always mirrors the node, not the recorded set
//! Test 7: Applied deltas converge on the live set

use std::collections::BTreeSet;
use utxo_bots::chain::MemoryChain;
use utxo_bots::ledger::{ContractId, OwnedAddress, UtxoRecord};
use utxo_bots::reconcile::{BalanceUpdate, Reconciliation};
use utxo_bots::{ChainError, Reconciler};

const A: &str = "mA";
const B: &str = "mB";

fn owned(id: &str, address: &str) -> (ContractId, OwnedAddress) {
    (ContractId::new(id), OwnedAddress { address: address.into(), balance: 0, tx_count: 0 })
}

/// Ledger side of a cycle: archive spends, create registrations under fresh ids.
fn apply(recorded: &mut Vec<(ContractId, UtxoRecord)>, result: Reconciliation, next_id: &mut u32) {
    recorded.retain(|(id, _)| !result.spends.contains(id));
    for utxo in result.registrations {
        *next_id += 1;
        recorded.push((ContractId::new(format!("utxo-{next_id}")), utxo));
    }
}

fn keys_of(recorded: &[(ContractId, UtxoRecord)], address: &str) -> BTreeSet<(String, u32)> {
    recorded
        .iter()
        .filter(|(_, u)| u.address == address)
        .map(|(_, u)| (u.tx_hash.clone(), u.output_index))
        .collect()
}

fn chain() -> MemoryChain {
    let chain = MemoryChain::new(1_000);
    chain.add_output(A, "a1", 0, 5_000, "76a9aa");
    chain.add_output(A, "a2", 1, 7_000, "76a9aa");
    chain.add_output(B, "b1", 0, 11_000, "76a9bb");
    chain.mine_block(1_600);
    chain
}

/// Test 1: Empty ledger view, populated chain
#[test]
fn first_cycle_registers_everything() {
    let chain = chain();
    let result = Reconciler::default().reconcile(&[], &[owned("oa", A), owned("ob", B)], &chain);

    assert_eq!(result.registrations.len(), 3);
    assert!(result.spends.is_empty());
    assert!(result.failures.is_empty());
    assert_eq!(result.balances, vec![
        BalanceUpdate { address: ContractId::new("oa"), balance: 12_000, tx_count: 2 },
        BalanceUpdate { address: ContractId::new("ob"), balance: 11_000, tx_count: 1 },
    ]);
    let a1 = result.registrations.iter().find(|u| u.tx_hash == "a1").expect("a1");
    assert_eq!(a1.address, A);
    assert_eq!(a1.value, 5_000);
    assert_eq!(a1.confirmed_at.map(|t| t.timestamp()), Some(1_600));
}

/// Test 2: Idempotence
#[test]
fn second_cycle_on_unchanged_chain_is_settled() {
    let chain = chain();
    let addresses = [owned("oa", A), owned("ob", B)];
    let reconciler = Reconciler::default();
    let mut recorded = Vec::new();
    let mut next_id = 0;

    let first = reconciler.reconcile(&recorded, &addresses, &chain);
    apply(&mut recorded, first, &mut next_id);

    let second = reconciler.reconcile(&recorded, &addresses, &chain);
    assert!(second.is_settled());
    assert!(second.registrations.is_empty());
    assert!(second.spends.is_empty());
}

/// Test 3: Spend + receive between cycles
#[test]
fn spent_and_new_outputs_detected() {
    let chain = chain();
    let addresses = [owned("oa", A)];
    let reconciler = Reconciler::default();
    let mut recorded = Vec::new();
    let mut next_id = 0;
    let cycle = reconciler.reconcile(&recorded, &addresses, &chain);
    apply(&mut recorded, cycle, &mut next_id);

    chain.spend("a1", 0);
    chain.add_output(A, "a3", 0, 9_000, "76a9aa");
    chain.mine_block(2_200);

    let result = reconciler.reconcile(&recorded, &addresses, &chain);
    let a1_id = recorded.iter().find(|(_, u)| u.tx_hash == "a1").map(|(id, _)| id.clone()).expect("a1 recorded");
    assert_eq!(result.spends, vec![a1_id]);
    assert_eq!(result.registrations.len(), 1);
    assert_eq!(result.registrations[0].tx_hash, "a3");
    assert_eq!(result.balances[0].balance, 16_000);
    assert_eq!(result.balances[0].tx_count, 2);
}

/// Test 4: Partial failure
#[test]
fn failing_address_is_isolated() {
    let chain = chain();
    let addresses = [owned("oa", A), owned("ob", B)];
    let reconciler = Reconciler::default();
    let mut recorded = Vec::new();
    let mut next_id = 0;
    let cycle = reconciler.reconcile(&recorded, &addresses, &chain);
    apply(&mut recorded, cycle, &mut next_id);

    chain.spend("b1", 0);
    chain.add_output(A, "a4", 0, 1_000, "76a9aa");
    chain.fail_address(B);

    let result = reconciler.reconcile(&recorded, &addresses, &chain);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].address, B);
    assert!(matches!(result.failures[0].error, ChainError::Transport(_)));
    // B's vanished output is not spent while B cannot be queried.
    assert!(result.spends.is_empty());
    assert_eq!(result.registrations.iter().map(|u| u.tx_hash.as_str()).collect::<Vec<_>>(), vec!["a4"]);
    assert_eq!(result.balances.len(), 1);
    assert_eq!(result.balances[0].address, ContractId::new("oa"));

    chain.heal_address(B);
    let retried = reconciler.reconcile(&recorded, &addresses, &chain);
    let b1_id = recorded.iter().find(|(_, u)| u.tx_hash == "b1").map(|(id, _)| id.clone()).expect("b1 recorded");
    assert_eq!(retried.spends, vec![b1_id]);
}

/// Test 5: No implicit expiry
#[test]
fn unqueried_address_records_untouched() {
    let chain = chain();
    let reconciler = Reconciler::default();
    let mut recorded = Vec::new();
    let mut next_id = 0;
    let cycle = reconciler.reconcile(&recorded, &[owned("oa", A), owned("ob", B)], &chain);
    apply(&mut recorded, cycle, &mut next_id);

    chain.spend("b1", 0);
    let result = reconciler.reconcile(&recorded, &[owned("oa", A)], &chain);
    assert!(result.spends.is_empty());
    assert!(result.is_settled());
}

/// Test 6: Balance is recomputed from the node on every cycle, even when the
/// recorded set disagrees. This pins the current behaviour: the reported
/// balance can differ from the sum of recorded UTXOs until the deltas land.
#[test]
fn balance_mirrors_node_regardless_of_recorded_set() {
    let chain = chain();
    let stale = UtxoRecord {
        address: A.into(),
        tx_hash: "gone".into(),
        output_index: 0,
        block_height: 0,
        value: 1_000_000,
        confirmed_at: None,
        script_pub_key: "76a9aa".into(),
    };
    let recorded = vec![(ContractId::new("stale"), stale)];
    let result = Reconciler::default().reconcile(&recorded, &[owned("oa", A)], &chain);

    let recorded_sum: u64 = recorded.iter().map(|(_, u)| u.value).sum();
    assert_eq!(result.balances[0].balance, 12_000);
    assert_ne!(result.balances[0].balance, recorded_sum);
    assert_eq!(result.spends, vec![ContractId::new("stale")]);
}

/// Test 7: Recorded ∪ registered − spent equals the live set
#[test]
fn applied_deltas_match_live_set() {
    let chain = chain();
    let addresses = [owned("oa", A), owned("ob", B)];
    let reconciler = Reconciler::default();
    let mut recorded = Vec::new();
    let mut next_id = 0;

    for round in 0..4u32 {
        if round > 0 {
            chain.add_output(if round % 2 == 0 { A } else { B }, &format!("r{round}"), round, 100 * u64::from(round), "76a9");
            chain.spend(if round == 2 { "a2" } else { "none" }, 1);
            chain.mine_block(2_000 + u64::from(round));
        }
        let cycle = reconciler.reconcile(&recorded, &addresses, &chain);
        apply(&mut recorded, cycle, &mut next_id);

        for address in [A, B] {
            let live: BTreeSet<(String, u32)> = utxo_bots::chain::ChainQuery::list_unspent(&chain, 1, address)
                .expect("live")
                .into_iter()
                .map(|u| (u.txid, u.vout))
                .collect();
            assert_eq!(keys_of(&recorded, address), live, "round {round} address {address}");
        }
    }
}
