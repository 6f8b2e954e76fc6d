//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `transactions` - Movement journal (key: transaction id, UUIDv7 so
//!   iteration order is creation order)
//! - `balances` - On-hand quantities (key: warehouse_id BE || item_id BE)
//! - `codes` - Code uniqueness index (key: code bytes, value: transaction id)
//! - `indices` - Pair index for cardex scans
//!   (key: item_id BE || warehouse_id BE || transaction id)
//!
//! Every mutating ledger operation lands here as a single atomic
//! `WriteBatch`: the journal row, all touched balance rows, and the index
//! rows commit together or not at all.

use crate::{
    error::{Error, Result},
    types::{BalanceKey, ItemId, StockTransaction, TransactionCode, WarehouseId},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_TRANSACTIONS: &str = "transactions";
const CF_BALANCES: &str = "balances";
const CF_CODES: &str = "codes";
const CF_INDICES: &str = "indices";

/// One atomic mutation: a journal row plus the balance rows it rewrites.
pub struct CommitBatch<'a> {
    /// Journal row to upsert
    pub transaction: &'a StockTransaction,
    /// Prior version of the row (updates only), used to drop stale
    /// pair-index entries when the line set changed
    pub prior: Option<&'a StockTransaction>,
    /// Absolute new values for every touched balance row
    pub balances: &'a BTreeMap<BalanceKey, i64>,
    /// Register the transaction code in the uniqueness index (create only)
    pub register_code: bool,
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_CODES, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened ledger storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Balance rows are hot; favor read speed over ratio
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {name} not found")))
    }

    // Key encoding

    fn balance_key(key: BalanceKey) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&key.warehouse.0.to_be_bytes());
        buf[4..].copy_from_slice(&key.item.0.to_be_bytes());
        buf
    }

    fn decode_balance_key(bytes: &[u8]) -> Option<BalanceKey> {
        if bytes.len() != 8 {
            return None;
        }
        let warehouse = u32::from_be_bytes(bytes[..4].try_into().ok()?);
        let item = u32::from_be_bytes(bytes[4..].try_into().ok()?);
        Some(BalanceKey::new(WarehouseId(warehouse), ItemId(item)))
    }

    fn index_key(item: ItemId, warehouse: WarehouseId, txn_id: Uuid) -> [u8; 24] {
        let mut buf = [0u8; 24];
        buf[..4].copy_from_slice(&item.0.to_be_bytes());
        buf[4..8].copy_from_slice(&warehouse.0.to_be_bytes());
        buf[8..].copy_from_slice(txn_id.as_bytes());
        buf
    }

    /// (item, warehouse) pairs a transaction's lines touch
    fn index_pairs(txn: &StockTransaction) -> BTreeSet<(ItemId, WarehouseId)> {
        let mut pairs = BTreeSet::new();
        for line in &txn.lines {
            for warehouse in txn.warehouses() {
                pairs.insert((line.item, warehouse));
            }
        }
        pairs
    }

    // Journal reads

    /// Get a journal row by id
    pub fn get_transaction(&self, id: Uuid) -> Result<StockTransaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or(Error::NotFound(id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Whether a code is already registered in the journal
    pub fn code_exists(&self, code: &TransactionCode) -> Result<bool> {
        let cf = self.cf_handle(CF_CODES)?;
        Ok(self.db.get_cf(cf, code.as_str().as_bytes())?.is_some())
    }

    /// All journal rows, newest first
    pub fn transactions(&self) -> Result<Vec<StockTransaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_, value) = item?;
            rows.push(bincode::deserialize(&value)?);
        }
        Ok(rows)
    }

    /// Journal rows whose lines touch `item` at any warehouse
    pub fn transactions_for_item(&self, item: ItemId) -> Result<Vec<StockTransaction>> {
        self.scan_index(&item.0.to_be_bytes())
    }

    /// Journal rows whose lines touch `item` at `warehouse`
    pub fn transactions_for_pair(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> Result<Vec<StockTransaction>> {
        let mut prefix = [0u8; 8];
        prefix[..4].copy_from_slice(&item.0.to_be_bytes());
        prefix[4..].copy_from_slice(&warehouse.0.to_be_bytes());
        self.scan_index(&prefix)
    }

    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<StockTransaction>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let mut ids = BTreeSet::new();
        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if key.len() == 24 {
                let id_bytes: [u8; 16] = key[8..24]
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed index key".to_string()))?;
                ids.insert(Uuid::from_bytes(id_bytes));
            }
        }

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            rows.push(self.get_transaction(id)?);
        }
        Ok(rows)
    }

    // Balance reads

    /// On-hand quantity for one pair; 0 when the row does not exist yet
    pub fn balance(&self, key: BalanceKey) -> Result<i64> {
        let cf = self.cf_handle(CF_BALANCES)?;
        match self.db.get_cf(cf, Self::balance_key(key))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed balance row".to_string()))?;
                Ok(i64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Every existing balance row
    pub fn balances_snapshot(&self) -> Result<Vec<(BalanceKey, i64)>> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let Some(balance_key) = Self::decode_balance_key(&key) else {
                return Err(Error::Storage("Malformed balance key".to_string()));
            };
            let raw: [u8; 8] = value
                .as_ref()
                .try_into()
                .map_err(|_| Error::Storage("Malformed balance row".to_string()))?;
            rows.push((balance_key, i64::from_be_bytes(raw)));
        }
        Ok(rows)
    }

    // Atomic commit

    /// Commit one ledger operation: journal row, balance rows, and indices
    /// land in a single RocksDB `WriteBatch`.
    pub fn commit(&self, commit: CommitBatch<'_>) -> Result<()> {
        let txn = commit.transaction;
        let mut batch = WriteBatch::default();

        let cf_txn = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_txn, txn.id.as_bytes(), bincode::serialize(txn)?);

        let cf_bal = self.cf_handle(CF_BALANCES)?;
        for (&key, &qty) in commit.balances {
            batch.put_cf(cf_bal, Self::balance_key(key), qty.to_be_bytes());
        }

        let cf_codes = self.cf_handle(CF_CODES)?;
        if commit.register_code {
            batch.put_cf(cf_codes, txn.code.as_str().as_bytes(), txn.id.as_bytes());
        }

        let cf_idx = self.cf_handle(CF_INDICES)?;
        let pairs = Self::index_pairs(txn);
        if let Some(prior) = commit.prior {
            for (item, warehouse) in Self::index_pairs(prior).difference(&pairs) {
                batch.delete_cf(cf_idx, Self::index_key(*item, *warehouse, txn.id));
            }
        }
        for (item, warehouse) in &pairs {
            batch.put_cf(cf_idx, Self::index_key(*item, *warehouse, txn.id), [0u8; 0]);
        }

        self.db.write(batch)?;

        tracing::debug!(
            transaction_id = %txn.id,
            code = %txn.code,
            rows = commit.balances.len(),
            "Committed ledger batch"
        );

        Ok(())
    }

    /// Close database (graceful shutdown)
    pub fn close(self: Arc<Self>) {
        drop(self);
        tracing::info!("Ledger storage closed");
    }
}
