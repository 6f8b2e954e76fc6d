//! Read-only reporting queries
//!
//! On-hand snapshots, stock cards (cardex), threshold alerts, and per-item
//! movement detail. Everything here reads the journal and balance store;
//! nothing mutates.

use crate::{
    catalog::{Item, Threshold, Warehouse},
    types::{
        BalanceKey, ItemId, StockTransaction, TransactionCode, TransactionStatus,
        TransactionType, WarehouseId,
    },
    Catalog, Result, Storage,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One row of the on-hand report
#[derive(Debug, Clone, Serialize)]
pub struct StockOnHandRow {
    /// Item identity
    pub item: ItemId,
    /// Item SKU
    pub sku: String,
    /// Item display name
    pub name: String,
    /// Unit of measure
    pub unit: String,
    /// Current on-hand (warehouse-scoped or total)
    pub on_hand: i64,
    /// Cumulative received quantity over the applied journal
    pub received: i64,
    /// Cumulative issued quantity over the applied journal
    pub issued: i64,
    /// on_hand x purchase cost
    pub inventory_value: Decimal,
    /// Threshold for the scoped warehouse, first configured as fallback
    pub threshold: Option<Threshold>,
}

/// One row of a stock card (cardex)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockCardEntry {
    /// Movement date
    pub date: NaiveDate,
    /// Transaction code
    pub code: TransactionCode,
    /// Movement kind
    pub kind: TransactionType,
    /// Transaction note
    pub note: String,
    /// Quantity received at this warehouse by this transaction
    pub received: i64,
    /// Quantity issued from this warehouse by this transaction
    pub issued: i64,
    /// Running balance after this transaction
    pub balance: i64,
}

/// Which bound a balance breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Breach {
    /// On-hand below the configured minimum
    Min,
    /// On-hand above the configured maximum
    Max,
}

/// One threshold breach
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Affected warehouse
    pub warehouse: Warehouse,
    /// Affected item
    pub item: Item,
    /// Current on-hand quantity
    pub on_hand: i64,
    /// The configured bounds
    pub threshold: Threshold,
    /// Which bound was breached
    pub breach: Breach,
}

/// One receipt or issue line for an item drill-down
#[derive(Debug, Clone, Serialize)]
pub struct MovementLine {
    /// Transaction code
    pub code: TransactionCode,
    /// Movement date
    pub date: NaiveDate,
    /// Line quantity
    pub quantity: i64,
    /// Line unit cost
    pub unit_cost: Decimal,
    /// quantity x unit cost
    pub total: Decimal,
}

/// Receipt and issue history for one item
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemMovements {
    /// Receipt lines, journal order
    pub receipts: Vec<MovementLine>,
    /// Issue lines, journal order
    pub issues: Vec<MovementLine>,
}

/// Read-only queries over the balance store and movement journal
pub struct Reporting {
    storage: Arc<Storage>,
    catalog: Arc<Catalog>,
}

impl Reporting {
    /// Build a reporting adapter over shared stores
    pub fn new(storage: Arc<Storage>, catalog: Arc<Catalog>) -> Self {
        Self { storage, catalog }
    }

    /// On-hand snapshot: one row per catalog item, optionally scoped to one
    /// warehouse. Received/issued totals come from scanning the applied
    /// journal, not from the net balance.
    pub fn stock_on_hand(&self, warehouse: Option<WarehouseId>) -> Result<Vec<StockOnHandRow>> {
        let mut on_hand: BTreeMap<ItemId, i64> = BTreeMap::new();
        for (key, qty) in self.storage.balances_snapshot()? {
            if warehouse.is_some_and(|w| w != key.warehouse) {
                continue;
            }
            *on_hand.entry(key.item).or_insert(0) += qty;
        }

        let mut rows = Vec::new();
        for item in self.catalog.items() {
            let (received, issued) = self.movement_totals(item.id, warehouse)?;
            let qty = on_hand.get(&item.id).copied().unwrap_or(0);
            rows.push(StockOnHandRow {
                item: item.id,
                sku: item.sku.clone(),
                name: item.name.clone(),
                unit: item.unit.clone(),
                on_hand: qty,
                received,
                issued,
                inventory_value: Decimal::from(qty) * item.purchase_cost,
                threshold: item.threshold_or_fallback(warehouse),
            });
        }
        rows.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(rows)
    }

    fn movement_totals(
        &self,
        item: ItemId,
        warehouse: Option<WarehouseId>,
    ) -> Result<(i64, i64)> {
        let mut received = 0;
        let mut issued = 0;
        for txn in self.storage.transactions_for_item(item)? {
            if txn.status != TransactionStatus::Applied {
                continue;
            }
            let qty: i64 = txn
                .lines
                .iter()
                .filter(|l| l.item == item)
                .map(|l| l.quantity)
                .sum();
            match txn.kind {
                TransactionType::Receipt => {
                    if warehouse.is_none() || txn.warehouse_to == warehouse {
                        received += qty;
                    }
                }
                TransactionType::Issue => {
                    if warehouse.is_none() || txn.warehouse_from == warehouse {
                        issued += qty;
                    }
                }
                TransactionType::Transfer => {
                    if warehouse.is_none() || txn.warehouse_from == warehouse {
                        issued += qty;
                    }
                    if warehouse.is_none() || txn.warehouse_to == warehouse {
                        received += qty;
                    }
                }
                // Corrections are neither received nor issued goods
                TransactionType::Adjustment => {}
            }
        }
        Ok((received, issued))
    }

    /// Chronological movement history for one (item, warehouse) pair with a
    /// running balance. The opening balance replays all applied movements
    /// dated before `from`; ties inside the range break by transaction id
    /// (UUIDv7, creation order).
    pub fn stock_card(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StockCardEntry>> {
        let key = BalanceKey::new(warehouse, item);
        let mut txns: Vec<StockTransaction> = self
            .storage
            .transactions_for_pair(item, warehouse)?
            .into_iter()
            .filter(|t| t.status == TransactionStatus::Applied)
            .collect();
        txns.sort_by(|a, b| (a.date, a.id).cmp(&(b.date, b.id)));

        let mut balance: i64 = txns
            .iter()
            .filter(|t| t.date < from)
            .map(|t| t.balance_effects().get(&key).copied().unwrap_or(0))
            .sum();

        let mut entries = Vec::new();
        for txn in txns.iter().filter(|t| t.date >= from && t.date <= to) {
            let delta = txn.balance_effects().get(&key).copied().unwrap_or(0);
            if delta == 0 {
                continue;
            }
            balance += delta;
            entries.push(StockCardEntry {
                date: txn.date,
                code: txn.code.clone(),
                kind: txn.kind,
                note: txn.note.clone(),
                received: delta.max(0),
                issued: (-delta).max(0),
                balance,
            });
        }
        Ok(entries)
    }

    /// Threshold breaches across every balance row with configured bounds.
    /// With min > max (an upstream configuration error) both can fire.
    pub fn alerts(&self) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();
        for (key, on_hand) in self.storage.balances_snapshot()? {
            let Some(item) = self.catalog.item(key.item) else {
                continue;
            };
            let Some(warehouse) = self.catalog.warehouse(key.warehouse) else {
                continue;
            };
            let Some(threshold) = item.thresholds.get(&key.warehouse).copied() else {
                continue;
            };

            if on_hand < threshold.min {
                alerts.push(Alert {
                    warehouse: warehouse.clone(),
                    item: item.clone(),
                    on_hand,
                    threshold,
                    breach: Breach::Min,
                });
            }
            if on_hand > threshold.max {
                alerts.push(Alert {
                    warehouse: warehouse.clone(),
                    item: item.clone(),
                    on_hand,
                    threshold,
                    breach: Breach::Max,
                });
            }
        }
        Ok(alerts)
    }

    /// Receipt/issue line detail for one SKU (drill-down view)
    pub fn item_movements(&self, sku: &str) -> Result<ItemMovements> {
        let Some(item) = self.catalog.item_by_sku(sku) else {
            return Ok(ItemMovements::default());
        };

        let mut txns = self.storage.transactions_for_item(item.id)?;
        txns.sort_by(|a, b| (a.date, a.id).cmp(&(b.date, b.id)));

        let mut movements = ItemMovements::default();
        for txn in txns {
            if txn.status != TransactionStatus::Applied {
                continue;
            }
            for line in txn.lines.iter().filter(|l| l.item == item.id) {
                let detail = MovementLine {
                    code: txn.code.clone(),
                    date: txn.date,
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                    total: Decimal::from(line.quantity) * line.unit_cost,
                };
                match txn.kind {
                    TransactionType::Receipt => movements.receipts.push(detail),
                    TransactionType::Issue => movements.issues.push(detail),
                    _ => {}
                }
            }
        }
        Ok(movements)
    }
}
