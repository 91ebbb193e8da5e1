//! RocksDB-specific snapshot type alias.

use super::Column;
use crate::core::storage::snapshot::Snapshot as GenericSnapshot;

/// Snapshot specialized to the RocksDB column set
pub type Snapshot = GenericSnapshot<Column>;
