use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use bitcoin::OutPoint;
use bon::Builder;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error as ThisError;
use tracing::{info, warn};

use crate::rpc::types::Outpoint;

#[derive(ThisError, Debug)]
pub enum OrderError {
    #[error("Order ledger I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Order record is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No pending order for outpoint {0}")]
    NotFound(Outpoint),
    #[error("Order for outpoint {0} is already final")]
    AlreadyFinal(Outpoint),
}

/// One swap, keyed by the seller's funding outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Order {
    pub asset_id: String,
    pub amount_to_sell: u64,
    #[builder(default = 0)]
    pub amount_sats_to_receive: u64,
    pub outpoint: Outpoint,
    #[builder(default)]
    pub virtual_psbt: String,
    #[builder(default)]
    pub anchor_psbt: String,
    #[builder(default)]
    pub passive_asset_psbts: Vec<String>,
}

impl Order {
    /// Completion data present: the record belongs in the final set.
    pub fn is_complete(&self) -> bool {
        self.amount_sats_to_receive > 0 || !self.anchor_psbt.is_empty()
    }

    pub fn complete(
        self,
        amount_sats_to_receive: u64,
        virtual_psbt: String,
        anchor_psbt: String,
        passive_asset_psbts: Vec<String>,
    ) -> Self {
        Self {
            amount_sats_to_receive,
            virtual_psbt,
            anchor_psbt,
            passive_asset_psbts,
            ..self
        }
    }
}

/// Flat-file order ledger: `orders/pending` holds started swaps and
/// `orders/final` completed ones, one JSON document per outpoint.
#[derive(Debug)]
pub struct OrderStore {
    pending_dir: PathBuf,
    final_dir: PathBuf,
    lock: Mutex<()>,
}

fn file_name(outpoint: &Outpoint) -> String {
    format!("{}_{}.json", outpoint.txid, outpoint.output_index)
}

fn read(path: &Path) -> Result<Option<Order>, OrderError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Readers see either the old file or the new one, never a partial write.
fn write_atomic(path: &Path, order: &Order) -> Result<(), OrderError> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "order path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&serde_json::to_vec_pretty(order)?)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl OrderStore {
    pub fn new(data_dir: &Path) -> Result<Self, OrderError> {
        let orders = data_dir.join("orders");
        let store = Self {
            pending_dir: orders.join("pending"),
            final_dir: orders.join("final"),
            lock: Mutex::new(()),
        };
        fs::create_dir_all(&store.pending_dir)?;
        fs::create_dir_all(&store.final_dir)?;
        Ok(store)
    }

    fn pending_path(&self, outpoint: &Outpoint) -> PathBuf {
        self.pending_dir.join(file_name(outpoint))
    }

    fn final_path(&self, outpoint: &Outpoint) -> PathBuf {
        self.final_dir.join(file_name(outpoint))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a started swap. Restarting the same outpoint overwrites its
    /// pending record; a completed outpoint is never reopened.
    pub fn write_pending(&self, order: &Order) -> Result<(), OrderError> {
        let _guard = self.guard();
        if self.final_path(&order.outpoint).exists() {
            return Err(OrderError::AlreadyFinal(order.outpoint.clone()));
        }
        write_atomic(&self.pending_path(&order.outpoint), order)?;
        info!("Pending order written for {}", order.outpoint);
        Ok(())
    }

    pub fn read_pending(&self, outpoint: &OutPoint) -> Result<Order, OrderError> {
        let outpoint = Outpoint::from(*outpoint);
        read(&self.pending_path(&outpoint))?.ok_or(OrderError::NotFound(outpoint))
    }

    pub fn read_final(&self, outpoint: &OutPoint) -> Result<Option<Order>, OrderError> {
        read(&self.final_path(&Outpoint::from(*outpoint)))
    }

    /// Moves a completed order from the pending set to the final set. The
    /// merged record is staged over the pending file, then renamed into
    /// place, so exactly one of the two records exists at any instant.
    pub fn promote(&self, order: &Order) -> Result<(), OrderError> {
        let _guard = self.guard();
        self.promote_locked(order)
    }

    fn promote_locked(&self, order: &Order) -> Result<(), OrderError> {
        let pending = self.pending_path(&order.outpoint);
        let final_path = self.final_path(&order.outpoint);
        if final_path.exists() {
            return Err(OrderError::AlreadyFinal(order.outpoint.clone()));
        }
        if !pending.exists() {
            return Err(OrderError::NotFound(order.outpoint.clone()));
        }
        write_atomic(&pending, order)?;
        fs::rename(&pending, &final_path)?;
        info!("Order for {} is final", order.outpoint);
        Ok(())
    }

    pub fn list_final(&self) -> Result<Vec<Order>, OrderError> {
        let mut orders = Vec::new();
        for entry in fs::read_dir(&self.final_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(order) = read(&path)? {
                    orders.push(order);
                }
            }
        }
        orders.sort_by(|a, b| {
            (&a.outpoint.txid, a.outpoint.output_index)
                .cmp(&(&b.outpoint.txid, b.outpoint.output_index))
        });
        Ok(orders)
    }

    /// Finishes promotions interrupted between staging and the final rename.
    /// Returns how many records were promoted.
    pub fn recover(&self) -> Result<usize, OrderError> {
        let _guard = self.guard();
        let mut promoted = 0;
        for entry in fs::read_dir(&self.pending_dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(order) = read(&path)? else {
                continue;
            };
            if !order.is_complete() {
                continue;
            }
            match self.promote_locked(&order) {
                Ok(()) => promoted += 1,
                Err(OrderError::AlreadyFinal(outpoint)) => {
                    warn!("Discarding staged order for {}: already final", outpoint);
                    fs::remove_file(&path)?;
                }
                Err(e) => return Err(e),
            }
        }
        if promoted > 0 {
            info!("Recovered {} staged orders", promoted);
        }
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::test_utils::outpoint;

    fn pending(index: u32) -> Order {
        Order::builder()
            .asset_id("aa11".to_string())
            .amount_to_sell(1200)
            .outpoint(outpoint(index).into())
            .build()
    }

    fn completed(index: u32) -> Order {
        pending(index).complete(
            50_000,
            "signed-vpsbt".to_string(),
            "70736274ff".to_string(),
            vec!["passive".to_string()],
        )
    }

    #[test]
    fn test_pending_round_trip_and_overwrite() -> Result<()> {
        let dir = TempDir::new()?;
        let store = OrderStore::new(dir.path())?;

        let order = pending(0);
        assert!(!order.is_complete());
        store.write_pending(&order)?;
        assert_eq!(store.read_pending(&outpoint(0))?, order);

        let restarted = Order {
            amount_to_sell: 500,
            ..order
        };
        store.write_pending(&restarted)?;
        assert_eq!(store.read_pending(&outpoint(0))?.amount_to_sell, 500);

        let file = dir
            .path()
            .join("orders/pending")
            .join(format!("{}_0.json", outpoint(0).txid));
        assert!(file.exists());
        Ok(())
    }

    #[test]
    fn test_promote_moves_record() -> Result<()> {
        let dir = TempDir::new()?;
        let store = OrderStore::new(dir.path())?;
        store.write_pending(&pending(1))?;

        let order = completed(1);
        store.promote(&order)?;

        assert!(matches!(
            store.read_pending(&outpoint(1)),
            Err(OrderError::NotFound(_))
        ));
        assert_eq!(store.read_final(&outpoint(1))?, Some(order.clone()));
        assert_eq!(store.list_final()?, vec![order.clone()]);

        // final records are never reopened or rewritten
        assert!(matches!(
            store.write_pending(&pending(1)),
            Err(OrderError::AlreadyFinal(_))
        ));
        assert!(matches!(
            store.promote(&order),
            Err(OrderError::AlreadyFinal(_))
        ));
        Ok(())
    }

    #[test]
    fn test_promote_requires_pending() -> Result<()> {
        let dir = TempDir::new()?;
        let store = OrderStore::new(dir.path())?;
        assert!(matches!(
            store.promote(&completed(2)),
            Err(OrderError::NotFound(_))
        ));
        assert_eq!(store.read_final(&outpoint(2))?, None);
        Ok(())
    }

    #[test]
    fn test_recover_promotes_staged_records() -> Result<()> {
        let dir = TempDir::new()?;
        let store = OrderStore::new(dir.path())?;

        // crash after staging, before the final rename
        store.write_pending(&pending(3))?;
        write_atomic(&store.pending_path(&outpoint(3).into()), &completed(3))?;
        store.write_pending(&pending(4))?;

        let store = OrderStore::new(dir.path())?;
        assert_eq!(store.recover()?, 1);
        assert_eq!(store.read_final(&outpoint(3))?, Some(completed(3)));
        assert_eq!(store.read_pending(&outpoint(4))?, pending(4));
        assert_eq!(store.recover()?, 0);
        Ok(())
    }

    #[test]
    fn test_no_temp_files_left_behind() -> Result<()> {
        let dir = TempDir::new()?;
        let store = OrderStore::new(dir.path())?;
        for i in 0..5 {
            store.write_pending(&pending(i))?;
        }
        store.promote(&completed(0))?;

        let pending_files = fs::read_dir(dir.path().join("orders/pending"))?.count();
        let final_files = fs::read_dir(dir.path().join("orders/final"))?.count();
        assert_eq!(pending_files, 4);
        assert_eq!(final_files, 1);
        Ok(())
    }
}
