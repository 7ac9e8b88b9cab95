use hoststat_core::models::{ColumnDef, MetricSample, TableSchema};
use sysinfo::System;

use super::Sampler;

pub const MEMORY_SCHEMA: TableSchema = TableSchema {
    table: "memory_metrics",
    columns: &[
        ColumnDef::integer("total"),
        ColumnDef::integer("used"),
        ColumnDef::integer("available"),
        ColumnDef::real("used_percent"),
        ColumnDef::integer("swap_used"),
    ],
};

pub struct MemorySampler {
    system: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for MemorySampler {
    fn schema(&self) -> &'static TableSchema {
        &MEMORY_SCHEMA
    }

    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let used_percent = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        sample
            .set("total", total)
            .set("used", used)
            .set("available", self.system.available_memory())
            .set("used_percent", used_percent)
            .set("swap_used", self.system.used_swap());

        if total == 0 {
            anyhow::bail!("内存总量读数为0");
        }
        Ok(())
    }
}
