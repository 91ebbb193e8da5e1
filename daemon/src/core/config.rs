use clap::Args;
use serde::{Deserialize, Serialize};

use super::storage::rocksdb::{CacheMode, CompressionMode};

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn default_max_background_jobs() -> usize {
    8
}

fn default_max_subcompaction_jobs() -> usize {
    2
}

fn default_low_priority_background_threads() -> usize {
    4
}

fn default_max_open_files() -> i32 {
    1024
}

fn default_keep_max_log_files() -> usize {
    4
}

fn default_cache_size() -> u64 {
    64 * 1024 * 1024
}

fn default_write_buffer_size() -> u64 {
    64 * 1024 * 1024
}

/// RocksDB tuning
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Background threads used by RocksDB
    #[clap(name = "rocksdb-background-threads", long, default_value_t = default_parallelism())]
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Max concurrent background jobs (flushes and compactions)
    #[clap(name = "rocksdb-max-background-jobs", long, default_value_t = default_max_background_jobs())]
    #[serde(default = "default_max_background_jobs")]
    pub max_background_jobs: usize,
    /// Max concurrent subcompaction jobs
    #[clap(name = "rocksdb-max-subcompaction-jobs", long, default_value_t = default_max_subcompaction_jobs())]
    #[serde(default = "default_max_subcompaction_jobs")]
    pub max_subcompaction_jobs: usize,
    /// Low priority background threads
    #[clap(name = "rocksdb-low-priority-background-threads", long, default_value_t = default_low_priority_background_threads())]
    #[serde(default = "default_low_priority_background_threads")]
    pub low_priority_background_threads: usize,
    /// Max open files, -1 for unlimited
    #[clap(name = "rocksdb-max-open-files", long, default_value_t = default_max_open_files())]
    #[serde(default = "default_max_open_files")]
    pub max_open_files: i32,
    /// Max info log files kept by RocksDB
    #[clap(name = "rocksdb-keep-max-log-files", long, default_value_t = default_keep_max_log_files())]
    #[serde(default = "default_keep_max_log_files")]
    pub keep_max_log_files: usize,
    /// Compression applied to stored values
    #[clap(name = "rocksdb-compression-mode", long, value_enum, default_value_t = CompressionMode::default())]
    #[serde(default)]
    pub compression_mode: CompressionMode,
    /// Block cache mode
    #[clap(name = "rocksdb-cache-mode", long, value_enum, default_value_t = CacheMode::default())]
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// Block cache size in bytes
    #[clap(name = "rocksdb-cache-size", long, default_value_t = default_cache_size())]
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    /// Write buffer size in bytes
    #[clap(name = "rocksdb-write-buffer-size", long, default_value_t = default_write_buffer_size())]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: u64,
    /// Share the write buffer between all column families
    #[clap(name = "rocksdb-write-buffer-shared", long)]
    #[serde(default)]
    pub write_buffer_shared: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_background_jobs: default_max_background_jobs(),
            max_subcompaction_jobs: default_max_subcompaction_jobs(),
            low_priority_background_threads: default_low_priority_background_threads(),
            max_open_files: default_max_open_files(),
            keep_max_log_files: default_keep_max_log_files(),
            compression_mode: CompressionMode::default(),
            cache_mode: CacheMode::default(),
            cache_size: default_cache_size(),
            write_buffer_size: default_write_buffer_size(),
            write_buffer_shared: false,
        }
    }
}
