use hoststat_core::models::{ColumnDef, MetricSample, TableSchema};
use sysinfo::System;

use super::Sampler;

pub const CPU_SCHEMA: TableSchema = TableSchema {
    table: "cpu_metrics",
    columns: &[
        ColumnDef::real("usage"),
        ColumnDef::real("max_core_usage"),
        ColumnDef::integer("frequency_mhz"),
        ColumnDef::real("load_one"),
        ColumnDef::real("load_five"),
        ColumnDef::real("load_fifteen"),
    ],
};

pub struct CpuSampler {
    system: System,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for CpuSampler {
    fn schema(&self) -> &'static TableSchema {
        &CPU_SCHEMA
    }

    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()> {
        self.system.refresh_cpu_all();

        let cpus = self.system.cpus();
        let max_core = cpus.iter().map(|c| c.cpu_usage()).fold(0.0f32, f32::max);
        let frequency = cpus.first().map(|c| c.frequency()).unwrap_or(0);
        let load = System::load_average();

        sample
            .set("usage", self.system.global_cpu_usage())
            .set("max_core_usage", max_core)
            .set("frequency_mhz", frequency)
            .set("load_one", load.one)
            .set("load_five", load.five)
            .set("load_fifteen", load.fifteen);

        if cpus.is_empty() {
            anyhow::bail!("未检测到CPU");
        }
        Ok(())
    }
}
