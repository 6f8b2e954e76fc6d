//! Read-only reference data
//!
//! Warehouses, items, thresholds, and counterparties are owned by CRUD
//! collaborators outside this crate. The ledger reads them for validation
//! and reporting and never mutates them.

use crate::types::{EmployeeId, ItemId, SupplierId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configured on-hand bounds for one (warehouse, item) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Alert when on-hand drops below this
    pub min: i64,
    /// Alert when on-hand exceeds this
    pub max: i64,
}

/// A storage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    /// Identity
    pub id: WarehouseId,
    /// Short unique code
    pub code: String,
    /// Display name
    pub name: String,
}

/// A stocked product variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identity
    pub id: ItemId,
    /// Unique SKU
    pub sku: String,
    /// Display name
    pub name: String,
    /// Unit of measure
    pub unit: String,
    /// Purchase cost, used for inventory value
    pub purchase_cost: Decimal,
    /// Selling price, informational
    pub selling_price: Decimal,
    /// Per-warehouse alert thresholds
    pub thresholds: BTreeMap<WarehouseId, Threshold>,
}

impl Item {
    /// Threshold for `warehouse`, falling back to the first configured
    /// threshold when none is set for that warehouse (reporting only).
    pub fn threshold_or_fallback(&self, warehouse: Option<WarehouseId>) -> Option<Threshold> {
        match warehouse {
            Some(w) => self
                .thresholds
                .get(&w)
                .copied()
                .or_else(|| self.thresholds.values().next().copied()),
            None => self.thresholds.values().next().copied(),
        }
    }
}

/// A goods supplier (receipt counterparty)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    /// Identity
    pub id: SupplierId,
    /// Short unique code
    pub code: String,
    /// Display name
    pub name: String,
}

/// An employee (issue counterparty)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Identity
    pub id: EmployeeId,
    /// Short unique code
    pub code: String,
    /// Display name
    pub name: String,
}

/// Snapshot of the master data the ledger reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    items: BTreeMap<ItemId, Item>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    employees: BTreeMap<EmployeeId, Employee>,
}

impl Catalog {
    /// Build a catalog from master-data rows
    pub fn new(
        warehouses: Vec<Warehouse>,
        items: Vec<Item>,
        suppliers: Vec<Supplier>,
        employees: Vec<Employee>,
    ) -> Self {
        Self {
            warehouses: warehouses.into_iter().map(|w| (w.id, w)).collect(),
            items: items.into_iter().map(|i| (i.id, i)).collect(),
            suppliers: suppliers.into_iter().map(|s| (s.id, s)).collect(),
            employees: employees.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Look up a warehouse
    pub fn warehouse(&self, id: WarehouseId) -> Option<&Warehouse> {
        self.warehouses.get(&id)
    }

    /// Look up an item
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Look up an item by SKU
    pub fn item_by_sku(&self, sku: &str) -> Option<&Item> {
        self.items.values().find(|i| i.sku == sku)
    }

    /// SKU for an item id, or a placeholder when the id is unknown
    pub fn sku_of(&self, id: ItemId) -> String {
        self.item(id)
            .map(|i| i.sku.clone())
            .unwrap_or_else(|| format!("item-{}", id.0))
    }

    /// All items, ordered by id
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// All warehouses, ordered by id
    pub fn warehouses(&self) -> impl Iterator<Item = &Warehouse> {
        self.warehouses.values()
    }
}
