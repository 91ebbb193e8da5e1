mod column;
mod providers;
mod snapshot;

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, trace};
use loyalty_common::serializer::Serializer;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompactionStyle, DBCompressionType,
    DBWithThreadMode, Env, IteratorMode as InternalIteratorMode, MultiThreaded, Options,
    ReadOptions, SliceTransform, WriteBatch,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::core::{
    config::RocksDBConfig,
    error::LoyaltyError,
    storage::snapshot::Direction,
};

pub use column::*;
pub use snapshot::Snapshot;

use super::Storage;

macro_rules! cf_handle {
    ($db: expr, $column: expr) => {
        $db.cf_handle($column.as_ref())
            .with_context(|| format!("Column {:?} not found", $column))?
    };
}

type InnerDB = DBWithThreadMode<MultiThreaded>;

// Reverse scans without an explicit start seek past every key of the prefix
const MAX_KEY_SUFFIX: usize = 64;

#[derive(Debug, Copy, Clone, Default, clap::ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    None,
    #[default]
    Snappy,
    Zlib,
    Bz2,
    Lz4,
    Lz4hc,
    Zstd,
}

#[derive(Debug, Copy, Clone, Default, clap::ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    None,
    #[default]
    Lru,
    HyperClock,
}

impl CompressionMode {
    pub fn convert(self) -> DBCompressionType {
        match self {
            Self::None => DBCompressionType::None,
            Self::Snappy => DBCompressionType::Snappy,
            Self::Zlib => DBCompressionType::Zlib,
            Self::Bz2 => DBCompressionType::Bz2,
            Self::Lz4 => DBCompressionType::Lz4,
            Self::Lz4hc => DBCompressionType::Lz4hc,
            Self::Zstd => DBCompressionType::Zstd,
        }
    }
}

pub struct RocksStorage {
    db: Arc<InnerDB>,
    snapshot: Option<Snapshot>,
}

impl RocksStorage {
    pub fn new(dir: &str, config: &RocksDBConfig) -> Result<Self, LoyaltyError> {
        let cfs = Column::iter().map(|column| {
            let name = column.to_string();
            let mut opts = Options::default();
            if let Some(len) = column.prefix() {
                opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(len));
            }

            ColumnFamilyDescriptor::new(name, opts)
        });

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compaction_style(DBCompactionStyle::Universal);

        opts.increase_parallelism(config.parallelism as _);
        opts.set_max_background_jobs(config.max_background_jobs as _);
        opts.set_max_subcompactions(config.max_subcompaction_jobs as _);

        opts.set_max_open_files(config.max_open_files);
        opts.set_keep_log_file_num(config.keep_max_log_files);

        let mut env = Env::new().context("Creating new env")?;
        env.set_low_priority_background_threads(config.low_priority_background_threads as _);
        opts.set_env(&env);
        opts.set_compression_type(config.compression_mode.convert());

        let mut block_opts = BlockBasedOptions::default();
        match config.cache_mode {
            CacheMode::None => {
                block_opts.disable_cache();
            }
            CacheMode::Lru => {
                let cache = Cache::new_lru_cache(config.cache_size as _);
                block_opts.set_block_cache(&cache);
            }
            CacheMode::HyperClock => {
                let cache = Cache::new_hyper_clock_cache(config.cache_size as _, 1024);
                block_opts.set_block_cache(&cache);
            }
        };

        opts.set_block_based_table_factory(&block_opts);
        if config.write_buffer_shared {
            opts.set_db_write_buffer_size(config.write_buffer_size as _);
        } else {
            opts.set_write_buffer_size(config.write_buffer_size as _);
        }

        info!("Opening ledger database at {}", dir);
        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, dir, cfs)
            .with_context(|| format!("Failed to open RocksDB at {}", dir))?;

        Ok(Self {
            db: Arc::new(db),
            snapshot: None,
        })
    }

    pub(super) fn insert_into_disk<K: AsRef<[u8]>, V: Serializer>(
        &mut self,
        column: Column,
        key: K,
        value: &V,
    ) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("insert into disk {:?}", column);
        }

        match self.snapshot.as_mut() {
            Some(snapshot) => {
                snapshot.put(column, key.as_ref().to_vec(), value.to_bytes());
            }
            None => {
                let cf = cf_handle!(self.db, column);
                self.db
                    .put_cf(&cf, key.as_ref(), value.to_bytes())
                    .with_context(|| {
                        format!("Error while inserting into disk column {:?}", column)
                    })?;
            }
        };

        Ok(())
    }

    pub(super) fn remove_from_disk<K: AsRef<[u8]>>(
        &mut self,
        column: Column,
        key: K,
    ) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("remove from disk {:?}", column);
        }

        let bytes = key.as_ref();
        match self.snapshot.as_mut() {
            Some(snapshot) => {
                snapshot.delete(column, bytes.to_vec());
            }
            None => {
                let cf = cf_handle!(self.db, column);
                self.db.delete_cf(&cf, bytes).with_context(|| {
                    format!("Error while removing from disk column {:?}", column)
                })?;
            }
        };

        Ok(())
    }

    pub fn contains_data<K: AsRef<[u8]>>(
        &self,
        column: Column,
        key: &K,
    ) -> Result<bool, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("contains data {:?}", column);
        }

        let key_bytes = key.as_ref();
        if let Some(v) = self
            .snapshot
            .as_ref()
            .and_then(|s| s.contains(column, key_bytes))
        {
            return Ok(v);
        }

        let cf = cf_handle!(self.db, column);
        let value = self.db.get_pinned_cf(&cf, key_bytes).with_context(|| {
            format!("Error while checking if key exists in column {:?}", column)
        })?;

        Ok(value.is_some())
    }

    pub fn load_optional_from_disk<K: AsRef<[u8]> + ?Sized, V: Serializer>(
        &self,
        column: Column,
        key: &K,
    ) -> Result<Option<V>, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("load optional {:?} from disk", column);
        }

        if let Some(snapshot) = self.snapshot.as_ref() {
            let state = snapshot.get(column, key.as_ref());
            if state.is_deleted() {
                return Ok(None);
            }
            if let Some(v) = state.stored() {
                return Ok(Some(V::from_bytes(v)?));
            }
        }

        let cf = cf_handle!(self.db, column);
        match self
            .db
            .get_pinned_cf(&cf, key.as_ref())
            .with_context(|| format!("Internal error while reading column {:?}", column))?
        {
            Some(bytes) => Ok(Some(V::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    // Ordered scan over the keys starting with `prefix`.
    // `from` positions the first key returned (inclusive) and must itself
    // start with the prefix. Pending snapshot writes are merged in.
    pub fn scan<K: Serializer, V: Serializer>(
        &self,
        column: Column,
        prefix: &[u8],
        from: Option<&[u8]>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<(K, V)>, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("scan {:?} {:?} limit {}", column, direction, limit);
        }

        if let Some(changes) = self.snapshot.as_ref().and_then(|s| s.changes(&column)) {
            let mut merged = BTreeMap::new();
            for res in self.raw_scan(column, prefix, None, Direction::Forward)? {
                let (key, value) = res?;
                merged.insert(key, value);
            }

            for (key, value) in changes.with_prefix(prefix) {
                match value {
                    Some(value) => merged.insert(key.clone(), value.clone()),
                    None => merged.remove(key),
                };
            }

            let iter: Box<dyn Iterator<Item = (&Bytes, &Bytes)>> = match (direction, from) {
                (Direction::Forward, Some(from)) => {
                    Box::new(merged.range(Bytes::copy_from_slice(from)..))
                }
                (Direction::Forward, None) => Box::new(merged.iter()),
                (Direction::Reverse, Some(from)) => {
                    Box::new(merged.range(..=Bytes::copy_from_slice(from)).rev())
                }
                (Direction::Reverse, None) => Box::new(merged.iter().rev()),
            };

            return iter
                .take(limit)
                .map(|(k, v)| Ok((K::from_bytes(k)?, V::from_bytes(v)?)))
                .collect();
        }

        let mut out = Vec::new();
        for res in self.raw_scan(column, prefix, from, direction)?.take(limit) {
            let (key, value) = res?;
            out.push((K::from_bytes(&key)?, V::from_bytes(&value)?));
        }

        Ok(out)
    }

    // Committed keys only, snapshot writes are ignored
    fn raw_scan<'a>(
        &'a self,
        column: Column,
        prefix: &'a [u8],
        from: Option<&[u8]>,
        direction: Direction,
    ) -> Result<impl Iterator<Item = Result<(Bytes, Bytes), LoyaltyError>> + 'a, LoyaltyError>
    {
        let start = match (from, direction) {
            (Some(from), _) => from.to_vec(),
            (None, Direction::Forward) => prefix.to_vec(),
            (None, Direction::Reverse) => {
                let mut start = prefix.to_vec();
                start.extend_from_slice(&[u8::MAX; MAX_KEY_SUFFIX]);
                start
            }
        };

        let mut opts = ReadOptions::default();
        opts.set_total_order_seek(true);

        let cf = cf_handle!(self.db, column);
        let mode = if start.is_empty() && direction == Direction::Forward {
            InternalIteratorMode::Start
        } else {
            InternalIteratorMode::From(&start, direction.into())
        };
        let iterator = self.db.iterator_cf_opt(&cf, opts, mode);

        Ok(iterator
            .map(move |res| {
                let (key, value) = res.context("Internal read error in scan")?;
                Ok((Bytes::from(key.into_vec()), Bytes::from(value.into_vec())))
            })
            .take_while(move |res: &Result<(Bytes, Bytes), LoyaltyError>| match res {
                Ok((key, _)) => key.starts_with(prefix),
                Err(_) => true,
            }))
    }

    // Write every change of the snapshot in one atomic batch
    fn write_snapshot(&self, snapshot: Snapshot) -> Result<(), LoyaltyError> {
        let mut batch = WriteBatch::default();
        for (column, changes) in snapshot.into_columns() {
            let cf = cf_handle!(self.db, column);
            for (key, value) in changes {
                match value {
                    Some(value) => batch.put_cf(&cf, key, value),
                    None => batch.delete_cf(&cf, key),
                }
            }
        }

        if log::log_enabled!(log::Level::Trace) {
            trace!("writing batch of {} operations", batch.len());
        }

        self.db
            .write(batch)
            .context("Error while writing snapshot batch")?;
        Ok(())
    }
}

#[async_trait]
impl Storage for RocksStorage {
    async fn flush(&mut self) -> Result<(), LoyaltyError> {
        debug!("flushing ledger database");
        for column in Column::iter() {
            let cf = cf_handle!(self.db, column);
            self.db
                .flush_cf(&cf)
                .with_context(|| format!("Error while flushing column {:?}", column))?;
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoyaltyError> {
        info!("Stopping ledger database");
        if self.snapshot.take().is_some() {
            debug!("discarding unfinished snapshot");
        }
        self.flush().await
    }
}
