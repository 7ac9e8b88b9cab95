//! 基于 sysinfo 的主机计数器
//!
//! 支持的路径：
//!
//! | 对象 | 实例 | 计数器 |
//! |---|---|---|
//! | `cpu` | 可选核心序号 | `usage`、`frequency` |
//! | `memory` | - | `total`、`used`、`available`、`used_percent` |
//! | `swap` | - | `total`、`used` |
//! | `load` | - | `one`、`five`、`fifteen` |
//! | `system` | - | `uptime`、`processes` |
//! | `disk` | 挂载点（必填） | `total`、`available`、`used`、`used_percent` |
//! | `network` | 可选网卡名 | `received`、`transmitted`、`packets_received`、`packets_transmitted` |
//! | `process` | 进程名（必填） | `cpu`、`memory`、`count` |
//!
//! 网络计数器返回相邻两次采样之间的增量，首次采样为0。

use hoststat_core::{
    models::CounterPath,
    traits::{CounterHandle, CounterProvider},
    HostStatError, HostStatResult,
};
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum MemoryCounter {
    Total,
    Used,
    Available,
    UsedPercent,
    SwapTotal,
    SwapUsed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DiskCounter {
    Total,
    Available,
    Used,
    UsedPercent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NetworkCounter {
    Received,
    Transmitted,
    PacketsReceived,
    PacketsTransmitted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProcessCounter {
    Cpu,
    Memory,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
enum CounterKind {
    CpuUsage(Option<usize>),
    CpuFrequency(Option<usize>),
    Memory(MemoryCounter),
    Load(u8),
    Uptime,
    ProcessTotal,
    Disk(String, DiskCounter),
    Network(Option<String>, NetworkCounter),
    Process(String, ProcessCounter),
}

impl CounterKind {
    fn resolve(path: &CounterPath) -> Result<Self, String> {
        let instance = path.instance();
        let require_instance = || {
            instance
                .map(str::to_string)
                .ok_or_else(|| format!("对象 {} 需要指定实例", path.object))
        };
        let reject_instance = || match instance {
            Some(_) => Err(format!("对象 {} 不支持实例", path.object)),
            None => Ok(()),
        };
        let core_index = || {
            instance
                .map(|i| i.parse::<usize>().map_err(|_| format!("无效的CPU序号: {i}")))
                .transpose()
        };

        let kind = match (path.object.as_str(), path.counter.as_str()) {
            ("cpu", "usage") => CounterKind::CpuUsage(core_index()?),
            ("cpu", "frequency") => CounterKind::CpuFrequency(core_index()?),
            ("memory", counter) => {
                reject_instance()?;
                CounterKind::Memory(match counter {
                    "total" => MemoryCounter::Total,
                    "used" => MemoryCounter::Used,
                    "available" => MemoryCounter::Available,
                    "used_percent" => MemoryCounter::UsedPercent,
                    other => return Err(format!("未知的内存计数器: {other}")),
                })
            }
            ("swap", counter) => {
                reject_instance()?;
                CounterKind::Memory(match counter {
                    "total" => MemoryCounter::SwapTotal,
                    "used" => MemoryCounter::SwapUsed,
                    other => return Err(format!("未知的交换区计数器: {other}")),
                })
            }
            ("load", counter) => {
                reject_instance()?;
                CounterKind::Load(match counter {
                    "one" => 1,
                    "five" => 5,
                    "fifteen" => 15,
                    other => return Err(format!("未知的负载计数器: {other}")),
                })
            }
            ("system", "uptime") => {
                reject_instance()?;
                CounterKind::Uptime
            }
            ("system", "processes") => {
                reject_instance()?;
                CounterKind::ProcessTotal
            }
            ("disk", counter) => {
                let mount = require_instance()?;
                CounterKind::Disk(
                    mount,
                    match counter {
                        "total" => DiskCounter::Total,
                        "available" => DiskCounter::Available,
                        "used" => DiskCounter::Used,
                        "used_percent" => DiskCounter::UsedPercent,
                        other => return Err(format!("未知的磁盘计数器: {other}")),
                    },
                )
            }
            ("network", counter) => CounterKind::Network(
                instance.map(str::to_string),
                match counter {
                    "received" => NetworkCounter::Received,
                    "transmitted" => NetworkCounter::Transmitted,
                    "packets_received" => NetworkCounter::PacketsReceived,
                    "packets_transmitted" => NetworkCounter::PacketsTransmitted,
                    other => return Err(format!("未知的网络计数器: {other}")),
                },
            ),
            ("process", counter) => {
                let name = require_instance()?;
                CounterKind::Process(
                    name,
                    match counter {
                        "cpu" => ProcessCounter::Cpu,
                        "memory" => ProcessCounter::Memory,
                        "count" => ProcessCounter::Count,
                        other => return Err(format!("未知的进程计数器: {other}")),
                    },
                )
            }
            (object, counter) => return Err(format!("不支持的计数器: {object}/{counter}")),
        };

        Ok(kind)
    }
}

/// 一个已打开的 sysinfo 计数器，持有自己的系统句柄
pub struct SysinfoCounter {
    path: String,
    kind: CounterKind,
    system: System,
    disks: Option<Disks>,
    networks: Option<Networks>,
    previous: Option<u64>,
}

impl SysinfoCounter {
    fn new(path: String, kind: CounterKind) -> Self {
        let mut system = System::new();
        let mut disks = None;
        let mut networks = None;

        match &kind {
            CounterKind::CpuUsage(_) | CounterKind::CpuFrequency(_) => system.refresh_cpu_all(),
            CounterKind::Disk(..) => disks = Some(Disks::new_with_refreshed_list()),
            CounterKind::Network(..) => networks = Some(Networks::new_with_refreshed_list()),
            CounterKind::Process(..) | CounterKind::ProcessTotal => {
                system.refresh_processes(ProcessesToUpdate::All, true);
            }
            _ => {}
        }

        Self {
            path,
            kind,
            system,
            disks,
            networks,
            previous: None,
        }
    }

    fn network_total(&self, iface: Option<&str>, counter: NetworkCounter) -> Option<u64> {
        let networks = self.networks.as_ref()?;
        let read = |data: &sysinfo::NetworkData| match counter {
            NetworkCounter::Received => data.total_received(),
            NetworkCounter::Transmitted => data.total_transmitted(),
            NetworkCounter::PacketsReceived => data.total_packets_received(),
            NetworkCounter::PacketsTransmitted => data.total_packets_transmitted(),
        };

        match iface {
            Some(name) => networks
                .iter()
                .find(|(iface_name, _)| iface_name.as_str() == name)
                .map(|(_, data)| read(data)),
            None => Some(networks.iter().map(|(_, data)| read(data)).sum()),
        }
    }
}

impl CounterHandle for SysinfoCounter {
    fn path(&self) -> &str {
        &self.path
    }

    fn sample(&mut self) -> Option<f64> {
        match self.kind.clone() {
            CounterKind::CpuUsage(core) => {
                self.system.refresh_cpu_all();
                match core {
                    Some(index) => self.system.cpus().get(index).map(|c| c.cpu_usage() as f64),
                    None => Some(self.system.global_cpu_usage() as f64),
                }
            }
            CounterKind::CpuFrequency(core) => {
                self.system.refresh_cpu_frequency();
                self.system
                    .cpus()
                    .get(core.unwrap_or(0))
                    .map(|c| c.frequency() as f64)
            }
            CounterKind::Memory(counter) => {
                self.system.refresh_memory();
                let total = self.system.total_memory();
                let value = match counter {
                    MemoryCounter::Total => total as f64,
                    MemoryCounter::Used => self.system.used_memory() as f64,
                    MemoryCounter::Available => self.system.available_memory() as f64,
                    MemoryCounter::UsedPercent if total > 0 => {
                        self.system.used_memory() as f64 / total as f64 * 100.0
                    }
                    MemoryCounter::UsedPercent => 0.0,
                    MemoryCounter::SwapTotal => self.system.total_swap() as f64,
                    MemoryCounter::SwapUsed => self.system.used_swap() as f64,
                };
                Some(value)
            }
            CounterKind::Load(minutes) => {
                let load = System::load_average();
                Some(match minutes {
                    1 => load.one,
                    5 => load.five,
                    _ => load.fifteen,
                })
            }
            CounterKind::Uptime => Some(System::uptime() as f64),
            CounterKind::ProcessTotal => {
                self.system.refresh_processes(ProcessesToUpdate::All, true);
                Some(self.system.processes().len() as f64)
            }
            CounterKind::Disk(mount, counter) => {
                let disks = self.disks.as_mut()?;
                disks.refresh();
                let disk = disks
                    .iter()
                    .find(|d| d.mount_point().to_string_lossy() == mount.as_str())?;
                let total = disk.total_space();
                let available = disk.available_space();
                let used = total.saturating_sub(available);
                Some(match counter {
                    DiskCounter::Total => total as f64,
                    DiskCounter::Available => available as f64,
                    DiskCounter::Used => used as f64,
                    DiskCounter::UsedPercent if total > 0 => used as f64 / total as f64 * 100.0,
                    DiskCounter::UsedPercent => 0.0,
                })
            }
            CounterKind::Network(iface, counter) => {
                self.networks.as_mut()?.refresh();
                let current = self.network_total(iface.as_deref(), counter)?;
                let delta = current.saturating_sub(self.previous.unwrap_or(current));
                self.previous = Some(current);
                Some(delta as f64)
            }
            CounterKind::Process(name, counter) => {
                self.system.refresh_processes(ProcessesToUpdate::All, true);
                let matching: Vec<_> = self
                    .system
                    .processes()
                    .values()
                    .filter(|p| p.name().to_string_lossy() == name.as_str())
                    .collect();
                Some(match counter {
                    ProcessCounter::Cpu => matching.iter().map(|p| p.cpu_usage() as f64).sum(),
                    ProcessCounter::Memory => matching.iter().map(|p| p.memory() as f64).sum(),
                    ProcessCounter::Count => matching.len() as f64,
                })
            }
        }
    }
}

/// 生产环境的计数器工厂
#[derive(Debug, Default, Clone)]
pub struct SysinfoCounterProvider;

impl SysinfoCounterProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CounterProvider for SysinfoCounterProvider {
    fn open(&self, path: &str) -> HostStatResult<Box<dyn CounterHandle>> {
        let parsed: CounterPath = path.parse()?;
        let kind = CounterKind::resolve(&parsed).map_err(|message| {
            HostStatError::InvalidCounterPath {
                path: path.to_string(),
                message,
            }
        })?;

        let counter = SysinfoCounter::new(parsed.to_string(), kind);

        if let CounterKind::CpuUsage(Some(index)) | CounterKind::CpuFrequency(Some(index)) =
            counter.kind
        {
            let cores = counter.system.cpus().len();
            if index >= cores {
                return Err(HostStatError::CounterUnavailable {
                    path: path.to_string(),
                    message: format!("CPU序号超出范围: {index}，共{cores}个核心"),
                });
            }
        }

        debug!("已打开计数器: {}", counter.path);
        Ok(Box::new(counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_supported_paths() {
        for raw in [
            "cpu/usage",
            "cpu[0]/usage",
            "cpu/frequency",
            "memory/available",
            "memory/used_percent",
            "swap/used",
            "load/one",
            "system/uptime",
            "system/processes",
            "disk[/]/used_percent",
            "network/received",
            "network[eth0]/packets_transmitted",
            "process[init]/count",
        ] {
            let path: CounterPath = raw.parse().unwrap();
            assert!(CounterKind::resolve(&path).is_ok(), "{raw} should resolve");
        }
    }

    #[test]
    fn test_resolve_rejects_unsupported() {
        for raw in [
            "gpu/usage",
            "memory/bogus",
            "memory[0]/used",
            "disk/used",
            "process/cpu",
            "cpu[first]/usage",
            "load/seven",
        ] {
            let path: CounterPath = raw.parse().unwrap();
            assert!(CounterKind::resolve(&path).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_open_and_sample_memory() {
        let provider = SysinfoCounterProvider::new();
        let mut counter = provider.open("memory/total").unwrap();
        assert_eq!(counter.path(), "memory/total");
        assert!(counter.sample().unwrap() > 0.0);
    }

    #[test]
    fn test_open_rejects_unknown_object() {
        let provider = SysinfoCounterProvider::new();
        assert!(matches!(
            provider.open("gpu/usage"),
            Err(HostStatError::InvalidCounterPath { .. })
        ));
        assert!(matches!(
            provider.open("cpu[100000]/usage"),
            Err(HostStatError::CounterUnavailable { .. })
        ));
    }

    #[test]
    fn test_missing_instance_samples_none() {
        let provider = SysinfoCounterProvider::new();
        let mut counter = provider.open("disk[/no/such/mount]/used").unwrap();
        assert_eq!(counter.sample(), None);

        let mut counter = provider.open("network[no-such-iface0]/received").unwrap();
        assert_eq!(counter.sample(), None);
    }

    #[test]
    fn test_network_first_sample_is_zero_delta() {
        let provider = SysinfoCounterProvider::new();
        let mut counter = provider.open("network/received").unwrap();
        assert_eq!(counter.sample(), Some(0.0));
    }
}
