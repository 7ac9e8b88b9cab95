use hoststat_core::models::{ColumnDef, MetricSample, TableSchema};
use sysinfo::{ProcessesToUpdate, System};

use super::Sampler;

pub const PROCESS_SCHEMA: TableSchema = TableSchema {
    table: "process_metrics",
    columns: &[
        ColumnDef::integer("process_count"),
        ColumnDef::text("top_process"),
        ColumnDef::real("top_process_cpu"),
        ColumnDef::integer("bytes_read"),
        ColumnDef::integer("bytes_written"),
    ],
};

/// 进程总数、CPU占用最高的进程及其自上次采样以来的磁盘IO
pub struct ProcessSampler {
    system: System,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        Self { system }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for ProcessSampler {
    fn schema(&self) -> &'static TableSchema {
        &PROCESS_SCHEMA
    }

    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        let processes = self.system.processes();
        sample.set("process_count", processes.len());

        let top = processes
            .values()
            .max_by(|a, b| a.cpu_usage().total_cmp(&b.cpu_usage()));

        match top {
            Some(process) => {
                let usage = process.disk_usage();
                sample
                    .set("top_process", process.name().to_string_lossy().into_owned())
                    .set("top_process_cpu", process.cpu_usage())
                    .set("bytes_read", usage.read_bytes)
                    .set("bytes_written", usage.written_bytes);
                Ok(())
            }
            None => anyhow::bail!("进程列表为空"),
        }
    }
}
