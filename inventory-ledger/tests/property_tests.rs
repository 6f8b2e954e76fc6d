//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify the critical invariants:
//! - Conservation: every balance equals the applied journal's signed sum
//! - Non-negativity: no operation sequence produces a negative balance
//! - Atomicity: a rejected multi-line movement changes nothing
//! - Update round-trip: reapplying the identical draft is a no-op
//! - Delete inverse: reversing a fresh movement restores prior balances

use chrono::NaiveDate;
use inventory_ledger::{
    audit::{AuditAction, AuditEvent, AuditSink, NullAuditSink},
    reporting::Breach,
    ActorId, BalanceKey, Catalog, Config, Employee, Error, Item, ItemId, Ledger, LineDraft,
    Supplier, Threshold, TransactionCode, TransactionDraft, TransactionPatch, TransactionType,
    Warehouse, WarehouseId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const ACTOR: ActorId = ActorId(1);

const WH_A: WarehouseId = WarehouseId(1);
const WH_B: WarehouseId = WarehouseId(2);
const ITEM_X: ItemId = ItemId(1);
const ITEM_Y: ItemId = ItemId(2);
const ITEM_Z: ItemId = ItemId(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

fn test_item(id: ItemId, sku: &str, thresholds: BTreeMap<WarehouseId, Threshold>) -> Item {
    Item {
        id,
        sku: sku.into(),
        name: format!("Item {sku}"),
        unit: "pcs".into(),
        purchase_cost: Decimal::new(10_00, 2),
        selling_price: Decimal::new(18_00, 2),
        thresholds,
    }
}

fn test_catalog() -> Catalog {
    let mut x_thresholds = BTreeMap::new();
    x_thresholds.insert(WH_A, Threshold { min: 5, max: 20 });

    Catalog::new(
        vec![
            Warehouse {
                id: WH_A,
                code: "A".into(),
                name: "Warehouse A".into(),
            },
            Warehouse {
                id: WH_B,
                code: "B".into(),
                name: "Warehouse B".into(),
            },
        ],
        vec![
            test_item(ITEM_X, "SKU-X", x_thresholds),
            test_item(ITEM_Y, "SKU-Y", BTreeMap::new()),
            test_item(ITEM_Z, "SKU-Z", BTreeMap::new()),
        ],
        vec![Supplier {
            id: inventory_ledger::types::SupplierId(1),
            code: "SUP1".into(),
            name: "Acme Supply".into(),
        }],
        vec![Employee {
            id: inventory_ledger::types::EmployeeId(1),
            code: "EMP1".into(),
            name: "Warehouse clerk".into(),
        }],
    )
}

async fn open_ledger(dir: &std::path::Path) -> Ledger {
    init_tracing();
    let mut config = Config::default();
    config.data_dir = dir.to_path_buf();
    Ledger::open(config, test_catalog(), Arc::new(NullAuditSink))
        .await
        .unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
}

fn line(item: ItemId, quantity: i64) -> LineDraft {
    LineDraft {
        item,
        quantity,
        unit_cost: Decimal::new(10_00, 2),
    }
}

fn draft(
    kind: TransactionType,
    from: Option<WarehouseId>,
    to: Option<WarehouseId>,
    lines: Vec<LineDraft>,
) -> TransactionDraft {
    TransactionDraft {
        kind,
        date: date(1),
        warehouse_from: from,
        warehouse_to: to,
        supplier: None,
        employee: None,
        note: String::new(),
        code: None,
        lines,
    }
}

fn receipt(to: WarehouseId, item: ItemId, qty: i64) -> TransactionDraft {
    draft(TransactionType::Receipt, None, Some(to), vec![line(item, qty)])
}

fn issue(from: WarehouseId, item: ItemId, qty: i64) -> TransactionDraft {
    draft(TransactionType::Issue, Some(from), None, vec![line(item, qty)])
}

fn transfer(from: WarehouseId, to: WarehouseId, item: ItemId, qty: i64) -> TransactionDraft {
    draft(
        TransactionType::Transfer,
        Some(from),
        Some(to),
        vec![line(item, qty)],
    )
}

fn adjustment(at: WarehouseId, item: ItemId, delta: i64) -> TransactionDraft {
    draft(
        TransactionType::Adjustment,
        Some(at),
        None,
        vec![line(item, delta)],
    )
}

async fn all_balances(ledger: &Ledger) -> BTreeMap<BalanceKey, i64> {
    let mut balances = BTreeMap::new();
    for warehouse in [WH_A, WH_B] {
        for item in [ITEM_X, ITEM_Y, ITEM_Z] {
            let key = BalanceKey::new(warehouse, item);
            balances.insert(key, ledger.balance(key).unwrap());
        }
    }
    balances
}

// Random operation against the ledger
#[derive(Debug, Clone)]
enum Op {
    Receipt { to: u8, item: u8, qty: i64 },
    Issue { from: u8, item: u8, qty: i64 },
    Transfer { from: u8, item: u8, qty: i64 },
    Adjust { at: u8, item: u8, delta: i64 },
    DeleteNth(usize),
}

fn warehouse_of(idx: u8) -> WarehouseId {
    if idx == 0 {
        WH_A
    } else {
        WH_B
    }
}

fn item_of(idx: u8) -> ItemId {
    match idx % 3 {
        0 => ITEM_X,
        1 => ITEM_Y,
        _ => ITEM_Z,
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..2, 0u8..3, 1i64..30).prop_map(|(to, item, qty)| Op::Receipt { to, item, qty }),
        (0u8..2, 0u8..3, 1i64..30).prop_map(|(from, item, qty)| Op::Issue { from, item, qty }),
        (0u8..2, 0u8..3, 1i64..30).prop_map(|(from, item, qty)| Op::Transfer { from, item, qty }),
        (0u8..2, 0u8..3, -15i64..15)
            .prop_filter("nonzero delta", |(_, _, d)| *d != 0)
            .prop_map(|(at, item, delta)| Op::Adjust { at, item, delta }),
        (0usize..8).prop_map(Op::DeleteNth),
    ]
}

async fn apply_op(ledger: &Ledger, op: &Op, created: &mut Vec<uuid::Uuid>) {
    let result = match op {
        Op::Receipt { to, item, qty } => {
            ledger
                .create_transaction(receipt(warehouse_of(*to), item_of(*item), *qty), ACTOR)
                .await
        }
        Op::Issue { from, item, qty } => {
            ledger
                .create_transaction(issue(warehouse_of(*from), item_of(*item), *qty), ACTOR)
                .await
        }
        Op::Transfer { from, item, qty } => {
            let src = warehouse_of(*from);
            let dst = if src == WH_A { WH_B } else { WH_A };
            ledger
                .create_transaction(transfer(src, dst, item_of(*item), *qty), ACTOR)
                .await
        }
        Op::Adjust { at, item, delta } => {
            ledger
                .create_transaction(adjustment(warehouse_of(*at), item_of(*item), *delta), ACTOR)
                .await
        }
        Op::DeleteNth(n) => {
            if let Some(id) = created.get(n % created.len().max(1)).copied() {
                // Rejections (stock already consumed downstream) are fine
                let _ = ledger.delete_transaction(id, ACTOR).await;
            }
            return;
        }
    };
    if let Ok(txn) = result {
        created.push(txn.id);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Conservation and non-negativity hold under any operation sequence,
    /// whatever mix of accepted and rejected operations it contains.
    #[test]
    fn prop_conservation_and_non_negativity(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tmp = tempfile::tempdir().unwrap();
            let ledger = open_ledger(tmp.path()).await;

            let mut created = Vec::new();
            for op in &ops {
                apply_op(&ledger, op, &mut created).await;
            }

            ledger.verify_conservation().await.unwrap();
            for (key, qty) in all_balances(&ledger).await {
                prop_assert!(qty >= 0, "negative balance {qty} at {key}");
            }

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// A multi-line movement that fails sufficiency on its last line leaves
    /// every balance untouched.
    #[test]
    fn prop_rejected_multiline_is_atomic(stock in 1i64..20, over in 1i64..20) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tmp = tempfile::tempdir().unwrap();
            let ledger = open_ledger(tmp.path()).await;

            ledger
                .create_transaction(receipt(WH_A, ITEM_X, stock), ACTOR)
                .await
                .unwrap();
            ledger
                .create_transaction(receipt(WH_A, ITEM_Y, stock), ACTOR)
                .await
                .unwrap();
            let before = all_balances(&ledger).await;

            // First line is satisfiable, the last one is not
            let result = ledger
                .create_transaction(
                    draft(
                        TransactionType::Issue,
                        Some(WH_A),
                        None,
                        vec![line(ITEM_X, stock), line(ITEM_Y, stock + over)],
                    ),
                    ACTOR,
                )
                .await;

            prop_assert!(
                matches!(result, Err(Error::InsufficientStock { .. })),
                "expected InsufficientStock, got {:?}",
                result
            );
            prop_assert_eq!(before, all_balances(&ledger).await);
            ledger.verify_conservation().await.unwrap();

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Updating a movement with its own current line set is a balance no-op.
    #[test]
    fn prop_update_roundtrip_is_noop(qty in 1i64..50, consumed in 0i64..10) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tmp = tempfile::tempdir().unwrap();
            let ledger = open_ledger(tmp.path()).await;

            let txn = ledger
                .create_transaction(receipt(WH_A, ITEM_X, qty + consumed), ACTOR)
                .await
                .unwrap();
            if consumed > 0 {
                ledger
                    .create_transaction(issue(WH_A, ITEM_X, consumed), ACTOR)
                    .await
                    .unwrap();
            }
            let before = all_balances(&ledger).await;

            let same_lines = txn
                .lines
                .iter()
                .map(|l| LineDraft {
                    item: l.item,
                    quantity: l.quantity,
                    unit_cost: l.unit_cost,
                })
                .collect();
            ledger
                .update_transaction(
                    txn.id,
                    TransactionPatch {
                        date: txn.date,
                        supplier: txn.supplier,
                        employee: txn.employee,
                        note: txn.note.clone(),
                        lines: same_lines,
                    },
                    ACTOR,
                )
                .await
                .unwrap();

            prop_assert_eq!(before, all_balances(&ledger).await);
            ledger.verify_conservation().await.unwrap();

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Deleting a movement nothing depends on restores prior balances.
    #[test]
    fn prop_delete_is_inverse_of_create(qty in 1i64..50) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tmp = tempfile::tempdir().unwrap();
            let ledger = open_ledger(tmp.path()).await;

            ledger
                .create_transaction(receipt(WH_A, ITEM_X, qty), ACTOR)
                .await
                .unwrap();
            let before = all_balances(&ledger).await;

            let txn = ledger
                .create_transaction(transfer(WH_A, WH_B, ITEM_X, qty), ACTOR)
                .await
                .unwrap();
            ledger.delete_transaction(txn.id, ACTOR).await.unwrap();

            prop_assert_eq!(before, all_balances(&ledger).await);
            ledger.verify_conservation().await.unwrap();

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}

mod scenarios {
    use super::*;

    /// Collects audit events for assertions
    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<AuditEvent>>);

    impl AuditSink for CollectingSink {
        fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    async fn balance(ledger: &Ledger, warehouse: WarehouseId, item: ItemId) -> i64 {
        ledger.balance(BalanceKey::new(warehouse, item)).unwrap()
    }

    #[tokio::test]
    async fn receipt_then_issue_and_cardex() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let mut r = receipt(WH_A, ITEM_X, 10);
        r.date = date(1);
        ledger.create_transaction(r, ACTOR).await.unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 10);

        let mut i = issue(WH_A, ITEM_X, 4);
        i.date = date(2);
        ledger.create_transaction(i, ACTOR).await.unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 6);

        let card = ledger
            .reporting()
            .stock_card(ITEM_X, WH_A, date(1), date(28))
            .unwrap();
        assert_eq!(card.len(), 2);
        assert_eq!((card[0].received, card[0].balance), (10, 10));
        assert_eq!((card[1].issued, card[1].balance), (4, 6));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn issue_beyond_stock_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_A, ITEM_Y, 5), ACTOR)
            .await
            .unwrap();

        let result = ledger
            .create_transaction(issue(WH_A, ITEM_Y, 7), ACTOR)
            .await;
        match result {
            Err(Error::InsufficientStock {
                available,
                requested,
                item,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 7);
                assert_eq!(item, ITEM_Y);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(balance(&ledger, WH_A, ITEM_Y).await, 5);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn transfer_moves_stock_and_delete_restores_it() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_A, ITEM_X, 6), ACTOR)
            .await
            .unwrap();
        let txn = ledger
            .create_transaction(transfer(WH_A, WH_B, ITEM_X, 6), ACTOR)
            .await
            .unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 0);
        assert_eq!(balance(&ledger, WH_B, ITEM_X).await, 6);

        ledger.delete_transaction(txn.id, ACTOR).await.unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 6);
        assert_eq!(balance(&ledger, WH_B, ITEM_X).await, 0);

        // Soft delete: the journal row survives, flagged reversed
        let stored = ledger.get_transaction(txn.id).unwrap();
        assert_eq!(
            stored.status,
            inventory_ledger::TransactionStatus::Reversed
        );

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn positive_adjustment_corrects_count() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_A, ITEM_X, 6), ACTOR)
            .await
            .unwrap();
        ledger
            .create_transaction(adjustment(WH_A, ITEM_X, 3), ACTOR)
            .await
            .unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 9);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn negative_adjustment_beyond_balance_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_A, ITEM_X, 6), ACTOR)
            .await
            .unwrap();
        let result = ledger
            .create_transaction(adjustment(WH_A, ITEM_X, -9), ACTOR)
            .await;
        assert!(matches!(result, Err(Error::InsufficientStock { .. })));
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 6);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn editing_receipt_reverses_then_reapplies() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 10), ACTOR)
            .await
            .unwrap();
        ledger
            .create_transaction(issue(WH_A, ITEM_X, 4), ACTOR)
            .await
            .unwrap();
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 6);

        let updated = ledger
            .update_transaction(
                txn.id,
                TransactionPatch {
                    date: txn.date,
                    supplier: None,
                    employee: None,
                    note: "recount".into(),
                    lines: vec![line(ITEM_X, 15)],
                },
                ACTOR,
            )
            .await
            .unwrap();

        // 6 - 10 + 15
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 11);
        assert_eq!(updated.code, txn.code);
        ledger.verify_conservation().await.unwrap();

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shrinking_a_consumed_receipt_is_rejected_without_mutation() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 10), ACTOR)
            .await
            .unwrap();
        ledger
            .create_transaction(issue(WH_A, ITEM_X, 8), ACTOR)
            .await
            .unwrap();

        // Only 2 left; shrinking the receipt to 5 would need 10 - 5 = 5
        let result = ledger
            .update_transaction(
                txn.id,
                TransactionPatch {
                    date: txn.date,
                    supplier: None,
                    employee: None,
                    note: String::new(),
                    lines: vec![line(ITEM_X, 5)],
                },
                ACTOR,
            )
            .await;
        assert!(matches!(result, Err(Error::InsufficientStock { .. })));
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 2);
        ledger.verify_conservation().await.unwrap();

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn deleting_consumed_receipt_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 10), ACTOR)
            .await
            .unwrap();
        ledger
            .create_transaction(issue(WH_A, ITEM_X, 8), ACTOR)
            .await
            .unwrap();

        let result = ledger.delete_transaction(txn.id, ACTOR).await;
        match result {
            Err(Error::NegativeBalance {
                warehouse,
                item,
                available,
                requested,
            }) => {
                assert_eq!(warehouse, WH_A);
                assert_eq!(item, ITEM_X);
                assert_eq!(available, 2);
                assert_eq!(requested, 10);
            }
            other => panic!("expected NegativeBalance, got {other:?}"),
        }
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 2);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn low_stock_raises_min_alert() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_A, ITEM_X, 3), ACTOR)
            .await
            .unwrap();

        let alerts = ledger.reporting().alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].breach, Breach::Min);
        assert_eq!(alerts[0].item.id, ITEM_X);
        assert_eq!(alerts[0].warehouse.id, WH_A);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let mut first = receipt(WH_A, ITEM_X, 1);
        first.code = Some(TransactionCode::new("NK260401-000001"));
        ledger.create_transaction(first, ACTOR).await.unwrap();

        let mut second = receipt(WH_A, ITEM_X, 1);
        second.code = Some(TransactionCode::new("NK260401-000001"));
        let result = ledger.create_transaction(second, ACTOR).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn transfer_to_same_warehouse_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let result = ledger
            .create_transaction(transfer(WH_A, WH_A, ITEM_X, 1), ACTOR)
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn reversed_transaction_cannot_be_edited_or_deleted_again() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 5), ACTOR)
            .await
            .unwrap();
        ledger.delete_transaction(txn.id, ACTOR).await.unwrap();

        let delete_again = ledger.delete_transaction(txn.id, ACTOR).await;
        assert!(matches!(delete_again, Err(Error::Validation(_))));

        let edit = ledger
            .update_transaction(
                txn.id,
                TransactionPatch {
                    date: txn.date,
                    supplier: None,
                    employee: None,
                    note: String::new(),
                    lines: vec![line(ITEM_X, 5)],
                },
                ACTOR,
            )
            .await;
        assert!(matches!(edit, Err(Error::Validation(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn audit_events_carry_before_and_after_snapshots() {
        init_tracing();
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingSink::default());
        let mut config = Config::default();
        config.data_dir = tmp.path().to_path_buf();
        let ledger = Ledger::open(config, test_catalog(), sink.clone())
            .await
            .unwrap();

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 10), ACTOR)
            .await
            .unwrap();
        ledger
            .update_transaction(
                txn.id,
                TransactionPatch {
                    date: txn.date,
                    supplier: None,
                    employee: None,
                    note: "fixed".into(),
                    lines: vec![line(ITEM_X, 12)],
                },
                ACTOR,
            )
            .await
            .unwrap();
        ledger.delete_transaction(txn.id, ACTOR).await.unwrap();

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].action, AuditAction::Created);
        assert!(events[0].before.is_none());
        assert_eq!(events[0].after.as_ref().unwrap().id, txn.id);

        assert_eq!(events[1].action, AuditAction::Updated);
        assert_eq!(events[1].before.as_ref().unwrap().lines[0].quantity, 10);
        assert_eq!(events[1].after.as_ref().unwrap().lines[0].quantity, 12);

        assert_eq!(events[2].action, AuditAction::Reversed);
        assert!(events[2].after.is_none());
        drop(events);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_create_emits_no_audit_event() {
        init_tracing();
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingSink::default());
        let mut config = Config::default();
        config.data_dir = tmp.path().to_path_buf();
        let ledger = Ledger::open(config, test_catalog(), sink.clone())
            .await
            .unwrap();

        let result = ledger
            .create_transaction(issue(WH_A, ITEM_X, 1), ACTOR)
            .await;
        assert!(result.is_err());
        assert!(sink.0.lock().unwrap().is_empty());

        ledger.shutdown().await.unwrap();
    }

    async fn assert_rejected(ledger: &Ledger, draft: TransactionDraft) {
        let result = ledger.create_transaction(draft, ACTOR).await;
        assert!(
            matches!(result, Err(Error::Validation(_))),
            "expected Validation, got {result:?}"
        );
    }

    #[tokio::test]
    async fn empty_line_list_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        assert_rejected(
            &ledger,
            draft(TransactionType::Receipt, None, Some(WH_A), vec![]),
        )
        .await;

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        assert_rejected(&ledger, receipt(WH_A, ITEM_X, 0)).await;
        assert_rejected(&ledger, issue(WH_A, ITEM_X, -4)).await;
        assert_rejected(&ledger, transfer(WH_A, WH_B, ITEM_X, 0)).await;
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn zero_adjustment_delta_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        assert_rejected(&ledger, adjustment(WH_A, ITEM_X, 0)).await;

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_warehouse_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        assert_rejected(&ledger, receipt(WarehouseId(99), ITEM_X, 1)).await;
        assert_rejected(&ledger, transfer(WH_A, WarehouseId(99), ITEM_X, 1)).await;

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_item_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        assert_rejected(&ledger, receipt(WH_A, ItemId(99), 1)).await;

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn warehouse_fields_must_match_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        // Receipt: destination only
        assert_rejected(
            &ledger,
            draft(TransactionType::Receipt, None, None, vec![line(ITEM_X, 1)]),
        )
        .await;
        assert_rejected(
            &ledger,
            draft(
                TransactionType::Receipt,
                Some(WH_A),
                Some(WH_B),
                vec![line(ITEM_X, 1)],
            ),
        )
        .await;

        // Issue: source only
        assert_rejected(
            &ledger,
            draft(TransactionType::Issue, None, None, vec![line(ITEM_X, 1)]),
        )
        .await;
        assert_rejected(
            &ledger,
            draft(
                TransactionType::Issue,
                Some(WH_A),
                Some(WH_B),
                vec![line(ITEM_X, 1)],
            ),
        )
        .await;

        // Transfer: both required
        assert_rejected(
            &ledger,
            draft(
                TransactionType::Transfer,
                Some(WH_A),
                None,
                vec![line(ITEM_X, 1)],
            ),
        )
        .await;

        // Adjustment: the adjusted warehouse goes in the source field
        assert_rejected(
            &ledger,
            draft(
                TransactionType::Adjustment,
                Some(WH_A),
                Some(WH_B),
                vec![line(ITEM_X, 1)],
            ),
        )
        .await;

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_patch_lines_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        let txn = ledger
            .create_transaction(receipt(WH_A, ITEM_X, 5), ACTOR)
            .await
            .unwrap();
        for lines in [vec![], vec![line(ITEM_X, 0)], vec![line(ItemId(99), 1)]] {
            let result = ledger
                .update_transaction(
                    txn.id,
                    TransactionPatch {
                        date: txn.date,
                        supplier: None,
                        employee: None,
                        note: String::new(),
                        lines,
                    },
                    ACTOR,
                )
                .await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert_eq!(balance(&ledger, WH_A, ITEM_X).await, 5);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn balance_overflow_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;

        ledger
            .create_transaction(receipt(WH_B, ITEM_Z, i64::MAX), ACTOR)
            .await
            .unwrap();
        let result = ledger
            .create_transaction(receipt(WH_B, ITEM_Z, 1), ACTOR)
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(balance(&ledger, WH_B, ITEM_Z).await, i64::MAX);
        ledger.verify_conservation().await.unwrap();

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_releases_storage_for_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(tmp.path()).await;
        ledger
            .create_transaction(receipt(WH_A, ITEM_X, 7), ACTOR)
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();

        // Reopening the same directory must not hit the database lock,
        // and committed state must survive the restart
        let reopened = open_ledger(tmp.path()).await;
        assert_eq!(balance(&reopened, WH_A, ITEM_X).await, 7);
        reopened.verify_conservation().await.unwrap();
        reopened.shutdown().await.unwrap();
    }
}
