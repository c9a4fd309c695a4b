mod common;

use std::sync::Arc;

use custodial_ledger::InMemoryLedgerStore;
use custodial_ledger::domain::{
    ErrorCategory, LedgerError, LedgerStore, TransactionKind, TransactionLog,
};

use common::{FaultyStore, balance_of, fast_engine, money, open_account, replayed};

fn single_key_store() -> Arc<FaultyStore> {
    Arc::new(FaultyStore::new(InMemoryLedgerStore::single_key()))
}

#[tokio::test]
async fn saga_transfer_succeeds_leg_by_leg() {
    let store = single_key_store();
    assert!(!store.supports_multi_key());
    let engine = fast_engine(Arc::clone(&store));
    let (alice, acc1) = open_account(&*store, "ACC0000000001", "alice");
    let (_bob, acc2) = open_account(&*store, "ACC0000000002", "bob");
    engine.deposit(&acc1, money("60.00"), &alice).await.unwrap();

    let receipt = engine
        .transfer(&acc1, &acc2, money("25.00"), &alice)
        .await
        .unwrap();

    assert_eq!(receipt.debit.balance_after, money("35.00"));
    assert_eq!(receipt.credit.balance_after, money("25.00"));
    assert_eq!(balance_of(&*store, &acc1), money("35.00"));
    assert_eq!(balance_of(&*store, &acc2), money("25.00"));
    assert_eq!(store.records_for(&acc2).unwrap(), vec![receipt.credit]);
}

#[tokio::test]
async fn failed_credit_is_compensated_on_the_source() {
    let store = single_key_store();
    let engine = fast_engine(Arc::clone(&store));
    let (alice, acc1) = open_account(&*store, "ACC0000000001", "alice");
    let (_bob, acc2) = open_account(&*store, "ACC0000000002", "bob");
    engine.deposit(&acc1, money("60.00"), &alice).await.unwrap();

    store.block_account(&acc2);
    let err = engine
        .transfer(&acc1, &acc2, money("25.00"), &alice)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    assert_eq!(balance_of(&*store, &acc1), money("60.00"));
    assert_eq!(balance_of(&*store, &acc2), money("0.00"));
    assert!(store.records_for(&acc2).unwrap().is_empty());

    let source = store.records_for(&acc1).unwrap();
    let kinds: Vec<_> = source.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::TransferIn,
            TransactionKind::TransferOut,
            TransactionKind::Deposit
        ]
    );
    assert_eq!(source[0].description, "Reversal of transfer to ACC0000000002");
    assert_eq!(source[0].counterparty.as_ref(), Some(&acc2));
    assert_eq!(source[0].balance_after, money("60.00"));
    assert_eq!(replayed(&*store, &acc1), money("60.00"));
}

#[tokio::test]
async fn failed_compensation_is_reported_distinctly() {
    let store = single_key_store();
    let engine = fast_engine(Arc::clone(&store));
    let (alice, acc1) = open_account(&*store, "ACC0000000001", "alice");
    let (_bob, acc2) = open_account(&*store, "ACC0000000002", "bob");
    engine.deposit(&acc1, money("60.00"), &alice).await.unwrap();

    // The debit goes through, then the store goes away.
    store.outage_after(1);
    let err = engine
        .transfer(&acc1, &acc2, money("25.00"), &alice)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Internal);
    assert!(!err.is_retryable());
    match err {
        LedgerError::CompensationFailed { account, cause } => {
            assert_eq!(account, acc1);
            assert!(matches!(*cause, LedgerError::StoreUnavailable(_)));
        }
        other => panic!("expected compensation failure, got {other}"),
    }
    assert_eq!(balance_of(&*store, &acc1), money("35.00"));
    assert_eq!(balance_of(&*store, &acc2), money("0.00"));
}

#[tokio::test]
async fn rejected_saga_debit_leaves_no_trace() {
    let store = single_key_store();
    let engine = fast_engine(Arc::clone(&store));
    let (alice, acc1) = open_account(&*store, "ACC0000000001", "alice");
    let (_bob, acc2) = open_account(&*store, "ACC0000000002", "bob");
    engine.deposit(&acc1, money("10.00"), &alice).await.unwrap();

    let err = engine
        .transfer(&acc1, &acc2, money("25.00"), &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(store.records_for(&acc1).unwrap().len(), 1);
    assert!(store.records_for(&acc2).unwrap().is_empty());
}

#[tokio::test]
async fn multi_key_transfer_is_all_or_nothing() {
    let store = Arc::new(FaultyStore::new(InMemoryLedgerStore::new()));
    let engine = fast_engine(Arc::clone(&store));
    let (alice, acc1) = open_account(&*store, "ACC0000000001", "alice");
    let (_bob, acc2) = open_account(&*store, "ACC0000000002", "bob");
    engine.deposit(&acc1, money("60.00"), &alice).await.unwrap();

    store.block_account(&acc2);
    let err = engine
        .transfer(&acc1, &acc2, money("25.00"), &alice)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    assert_eq!(balance_of(&*store, &acc1), money("60.00"));
    assert_eq!(store.records_for(&acc1).unwrap().len(), 1);
    assert!(store.records_for(&acc2).unwrap().is_empty());
}
