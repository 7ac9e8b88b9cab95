use hoststat_core::models::{ColumnDef, MetricSample, TableSchema};
use std::collections::HashMap;
use sysinfo::Networks;

use super::Sampler;

pub const NETWORK_SCHEMA: TableSchema = TableSchema {
    table: "network_metrics",
    columns: &[
        ColumnDef::integer("bytes_received"),
        ColumnDef::integer("bytes_sent"),
        ColumnDef::integer("bytes_total"),
        ColumnDef::integer("packets_received"),
        ColumnDef::integer("packets_sent"),
        ColumnDef::integer("errors_received"),
        ColumnDef::integer("errors_sent"),
    ],
};

#[derive(Debug, Clone, Copy, Default)]
struct InterfaceTotals {
    received: u64,
    transmitted: u64,
    packets_received: u64,
    packets_transmitted: u64,
    errors_received: u64,
    errors_transmitted: u64,
}

impl InterfaceTotals {
    fn delta_since(&self, previous: &InterfaceTotals) -> InterfaceTotals {
        InterfaceTotals {
            received: self.received.saturating_sub(previous.received),
            transmitted: self.transmitted.saturating_sub(previous.transmitted),
            packets_received: self.packets_received.saturating_sub(previous.packets_received),
            packets_transmitted: self
                .packets_transmitted
                .saturating_sub(previous.packets_transmitted),
            errors_received: self.errors_received.saturating_sub(previous.errors_received),
            errors_transmitted: self
                .errors_transmitted
                .saturating_sub(previous.errors_transmitted),
        }
    }

    fn add(&mut self, other: &InterfaceTotals) {
        self.received += other.received;
        self.transmitted += other.transmitted;
        self.packets_received += other.packets_received;
        self.packets_transmitted += other.packets_transmitted;
        self.errors_received += other.errors_received;
        self.errors_transmitted += other.errors_transmitted;
    }
}

/// 所有网卡在相邻两次采样之间的流量增量之和，首次采样为0
pub struct NetworkSampler {
    networks: Networks,
    previous: HashMap<String, InterfaceTotals>,
}

impl NetworkSampler {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            previous: HashMap::new(),
        }
    }
}

impl Default for NetworkSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for NetworkSampler {
    fn schema(&self) -> &'static TableSchema {
        &NETWORK_SCHEMA
    }

    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()> {
        self.networks.refresh();

        let mut sum = InterfaceTotals::default();
        for (name, data) in self.networks.iter() {
            let current = InterfaceTotals {
                received: data.total_received(),
                transmitted: data.total_transmitted(),
                packets_received: data.total_packets_received(),
                packets_transmitted: data.total_packets_transmitted(),
                errors_received: data.total_errors_on_received(),
                errors_transmitted: data.total_errors_on_transmitted(),
            };
            let previous = self.previous.get(name).copied().unwrap_or(current);
            sum.add(&current.delta_since(&previous));
            self.previous.insert(name.clone(), current);
        }

        sample
            .set("bytes_received", sum.received)
            .set("bytes_sent", sum.transmitted)
            .set("bytes_total", sum.received.saturating_add(sum.transmitted))
            .set("packets_received", sum.packets_received)
            .set("packets_sent", sum.packets_transmitted)
            .set("errors_received", sum.errors_received)
            .set("errors_sent", sum.errors_transmitted);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_saturates_on_counter_reset() {
        let previous = InterfaceTotals {
            received: 1000,
            transmitted: 500,
            ..Default::default()
        };
        let current = InterfaceTotals {
            received: 200,
            transmitted: 800,
            ..Default::default()
        };

        let delta = current.delta_since(&previous);
        assert_eq!(delta.received, 0);
        assert_eq!(delta.transmitted, 300);
    }
}
