use hoststat_core::models::{ColumnDef, MetricSample, TableSchema};
use sysinfo::{Disks, ProcessesToUpdate, System};

use super::Sampler;

pub const STORAGE_SCHEMA: TableSchema = TableSchema {
    table: "storage_metrics",
    columns: &[
        ColumnDef::integer("total"),
        ColumnDef::integer("available"),
        ColumnDef::real("used_percent"),
        ColumnDef::integer("bytes_read"),
        ColumnDef::integer("bytes_written"),
    ],
};

/// 汇总所有磁盘容量；读写字节数为上次采样以来全部进程的磁盘IO之和
pub struct StorageSampler {
    disks: Disks,
    system: System,
}

impl StorageSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        Self {
            disks: Disks::new_with_refreshed_list(),
            system,
        }
    }
}

impl Default for StorageSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for StorageSampler {
    fn schema(&self) -> &'static TableSchema {
        &STORAGE_SCHEMA
    }

    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()> {
        self.disks.refresh();
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        let total: u64 = self.disks.iter().map(|d| d.total_space()).sum();
        let available: u64 = self.disks.iter().map(|d| d.available_space()).sum();
        let used_percent = if total > 0 {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let (bytes_read, bytes_written) = self
            .system
            .processes()
            .values()
            .map(|p| p.disk_usage())
            .fold((0u64, 0u64), |(read, written), usage| {
                (
                    read.saturating_add(usage.read_bytes),
                    written.saturating_add(usage.written_bytes),
                )
            });

        sample
            .set("total", total)
            .set("available", available)
            .set("used_percent", used_percent)
            .set("bytes_read", bytes_read)
            .set("bytes_written", bytes_written);

        Ok(())
    }
}
