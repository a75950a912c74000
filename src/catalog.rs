//! Fixed metric catalogue.
//!
//! The catalogue is the single source of truth for which metrics exist, the
//! order they appear in log records, their column labels and how their values
//! are formatted. Every consumer iterates [`CATALOG`] instead of matching on
//! key strings, so adding a metric means adding one table entry.

use crate::engine::readings::{CycleReadings, SourceError};
use crate::engine::sources;

/// Key-name prefix that marks the monitored-process partition.
pub const PROCESS_KEY_PREFIX: &str = "MonitoredProcesses";

/// Stable identifier for one measurable quantity.
///
/// Declaration order is catalogue order; it defines record column order and
/// must not change, because existing log files depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    NodeName,
    IpNumber,
    CpuProcessorTime,
    CpuPrivilegedTime,
    CpuInterruptTime,
    CpuDpcTime,
    MemAvailable,
    MemCommitted,
    MemCommitLimit,
    MemCommittedPerc,
    MemPoolPaged,
    MemPoolNonPaged,
    MemCached,
    PageFile,
    ProcessorQueueLength,
    DiskQueueLength,
    DiskRead,
    DiskWrite,
    DiskAverageTimeRead,
    DiskAverageTimeWrite,
    DiskTime,
    HandleCount,
    ThreadCount,
    ContextSwitches,
    SystemCalls,
    NumProcess,
    NetTrafficSend,
    NetTrafficReceive,
    SamplingTime,
    ProcessCpuTime,
    ProcessMemUsed,
}

impl MetricKey {
    /// The persisted key string. These are frozen: settings files and
    /// downstream log consumers match on them.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::NodeName => "NodeName",
            MetricKey::IpNumber => "IpNumber",
            MetricKey::CpuProcessorTime => "CPUProcessorTime",
            MetricKey::CpuPrivilegedTime => "CPUPrivilegedTime",
            MetricKey::CpuInterruptTime => "CPUInterruptTime",
            MetricKey::CpuDpcTime => "CPUDPCTime",
            MetricKey::MemAvailable => "MEMAvailable",
            MetricKey::MemCommitted => "MEMCommited",
            MetricKey::MemCommitLimit => "MEMCommitLimit",
            MetricKey::MemCommittedPerc => "MEMCommitedPerc",
            MetricKey::MemPoolPaged => "MEMPoolPaged",
            MetricKey::MemPoolNonPaged => "MEMPoolNonPaged",
            MetricKey::MemCached => "MEMCached",
            MetricKey::PageFile => "PageFile",
            MetricKey::ProcessorQueueLength => "ProcessorQueueLengh",
            MetricKey::DiskQueueLength => "DISCQueueLengh",
            MetricKey::DiskRead => "DISKRead",
            MetricKey::DiskWrite => "DISKWrite",
            MetricKey::DiskAverageTimeRead => "DISKAverageTimeRead",
            MetricKey::DiskAverageTimeWrite => "DISKAverageTimeWrite",
            MetricKey::DiskTime => "DISKTime",
            MetricKey::HandleCount => "HANDLECountCounter",
            MetricKey::ThreadCount => "THREADCount",
            MetricKey::ContextSwitches => "CONTENTSwitches",
            MetricKey::SystemCalls => "SYSTEMCalls",
            MetricKey::NumProcess => "NumProcess",
            MetricKey::NetTrafficSend => "NetTrafficSend",
            MetricKey::NetTrafficReceive => "NetTrafficReceive",
            MetricKey::SamplingTime => "SamplingTime",
            MetricKey::ProcessCpuTime => "MonitoredProcessesCPUProcessorTime",
            MetricKey::ProcessMemUsed => "MonitoredProcessesMEMUsed",
        }
    }

    /// Inverse of [`MetricKey::as_str`]. Unknown strings yield `None`; stale
    /// settings keys are tolerated by being unparsable.
    pub fn parse(s: &str) -> Option<MetricKey> {
        CATALOG.iter().map(|d| d.key).find(|k| k.as_str() == s)
    }

    /// Whether the key belongs to the monitored-process partition.
    pub fn is_process_metric(self) -> bool {
        self.as_str().starts_with(PROCESS_KEY_PREFIX)
    }

    /// Column label for this key. For process keys this is the per-process
    /// suffix; the full title also carries the process name.
    pub fn label(self) -> &'static str {
        descriptor(self).label
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sampled value before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    F64(f64),
    I64(i64),
    Text(String),
}

/// How a value renders into a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Rounded to one decimal; integral results print without the fraction.
    Dec1,
    /// Whole number.
    Int,
    /// Verbatim text.
    Text,
}

/// Renders a value for a log record field.
pub fn format_value(format: ValueFormat, value: &Value) -> String {
    match (format, value) {
        (ValueFormat::Dec1, Value::F64(v)) => {
            let rounded = (v * 10.0).round() / 10.0;
            format!("{rounded}")
        }
        (ValueFormat::Dec1, Value::I64(v)) => v.to_string(),
        (ValueFormat::Int, Value::F64(v)) => (v.round() as i64).to_string(),
        (ValueFormat::Int, Value::I64(v)) => v.to_string(),
        (_, Value::Text(s)) => s.clone(),
        (ValueFormat::Text, Value::F64(v)) => v.to_string(),
        (ValueFormat::Text, Value::I64(v)) => v.to_string(),
    }
}

/// Reader bound to a key: either a system extraction function over one
/// cycle's readings, or one of the per-process aggregates.
#[derive(Clone, Copy)]
pub enum Source {
    System(SourceFn),
    ProcessCpu,
    ProcessMem,
}

pub type SourceFn = fn(&CycleReadings) -> Result<Value, SourceError>;

/// One catalogue entry: key, column label, value format and bound source.
pub struct MetricDescriptor {
    pub key: MetricKey,
    pub label: &'static str,
    pub format: ValueFormat,
    pub source: Source,
}

/// The full catalogue in record order.
///
/// Labels are frozen as shipped by the original logger, misspellings
/// included; consumers parse log headers against these exact strings.
pub static CATALOG: [MetricDescriptor; 31] = [
    MetricDescriptor {
        key: MetricKey::NodeName,
        label: "NameNode",
        format: ValueFormat::Text,
        source: Source::System(sources::node_name),
    },
    MetricDescriptor {
        key: MetricKey::IpNumber,
        label: "IP Number",
        format: ValueFormat::Text,
        source: Source::System(sources::ip_number),
    },
    MetricDescriptor {
        key: MetricKey::CpuProcessorTime,
        label: "CPU time %",
        format: ValueFormat::Dec1,
        source: Source::System(sources::cpu_processor_time),
    },
    MetricDescriptor {
        key: MetricKey::CpuPrivilegedTime,
        label: "CPU Privileged %",
        format: ValueFormat::Dec1,
        source: Source::System(sources::cpu_privileged_time),
    },
    MetricDescriptor {
        key: MetricKey::CpuInterruptTime,
        label: "CPU Interrupt %",
        format: ValueFormat::Dec1,
        source: Source::System(sources::cpu_interrupt_time),
    },
    MetricDescriptor {
        key: MetricKey::CpuDpcTime,
        label: "CPU deferred %",
        format: ValueFormat::Dec1,
        source: Source::System(sources::cpu_dpc_time),
    },
    MetricDescriptor {
        key: MetricKey::MemAvailable,
        label: "Mem Avaialable %",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_available),
    },
    MetricDescriptor {
        key: MetricKey::MemCommitted,
        label: "Mem commited MB",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_committed),
    },
    MetricDescriptor {
        key: MetricKey::MemCommitLimit,
        label: "Mem commitLimit MB",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_commit_limit),
    },
    MetricDescriptor {
        key: MetricKey::MemCommittedPerc,
        label: "Mem commitedPerc  MB",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_committed_perc),
    },
    MetricDescriptor {
        key: MetricKey::MemPoolPaged,
        label: "Mem Pool Paged (MB)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_pool_paged),
    },
    MetricDescriptor {
        key: MetricKey::MemPoolNonPaged,
        label: "Mem PoolNonPaged (MB)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_pool_non_paged),
    },
    MetricDescriptor {
        key: MetricKey::MemCached,
        label: "Mem cache (MB)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::mem_cached),
    },
    MetricDescriptor {
        key: MetricKey::PageFile,
        label: "PageFile (MB)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::page_file),
    },
    MetricDescriptor {
        key: MetricKey::ProcessorQueueLength,
        label: "ProcessorQueue",
        format: ValueFormat::Int,
        source: Source::System(sources::processor_queue_length),
    },
    MetricDescriptor {
        key: MetricKey::DiskQueueLength,
        label: "DiskQueueLengh",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_queue_length),
    },
    MetricDescriptor {
        key: MetricKey::DiskRead,
        label: "Disk Read (KB/s)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_read),
    },
    MetricDescriptor {
        key: MetricKey::DiskWrite,
        label: "Disk Write (KB/s)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_write),
    },
    MetricDescriptor {
        key: MetricKey::DiskAverageTimeRead,
        label: "Disk ms/Read",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_average_time_read),
    },
    MetricDescriptor {
        key: MetricKey::DiskAverageTimeWrite,
        label: "Disk ms/Write",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_average_time_write),
    },
    MetricDescriptor {
        key: MetricKey::DiskTime,
        label: "Disk time (%)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::disk_time),
    },
    MetricDescriptor {
        key: MetricKey::HandleCount,
        label: "Handle Count",
        format: ValueFormat::Int,
        source: Source::System(sources::handle_count),
    },
    MetricDescriptor {
        key: MetricKey::ThreadCount,
        label: "Thread Count",
        format: ValueFormat::Int,
        source: Source::System(sources::thread_count),
    },
    MetricDescriptor {
        key: MetricKey::ContextSwitches,
        label: "Content Switches/s",
        format: ValueFormat::Int,
        source: Source::System(sources::context_switches),
    },
    MetricDescriptor {
        key: MetricKey::SystemCalls,
        label: "System Calls/s",
        format: ValueFormat::Int,
        source: Source::System(sources::system_calls),
    },
    MetricDescriptor {
        key: MetricKey::NumProcess,
        label: "NumProcesses",
        format: ValueFormat::Int,
        source: Source::System(sources::num_process),
    },
    MetricDescriptor {
        key: MetricKey::NetTrafficSend,
        label: "NetTrafficSent(kbps)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::net_traffic_send),
    },
    MetricDescriptor {
        key: MetricKey::NetTrafficReceive,
        label: "NetTrafficRecv(kbps)",
        format: ValueFormat::Dec1,
        source: Source::System(sources::net_traffic_receive),
    },
    MetricDescriptor {
        key: MetricKey::SamplingTime,
        label: "Sampling Time",
        format: ValueFormat::Text,
        source: Source::System(sources::sampling_time),
    },
    MetricDescriptor {
        key: MetricKey::ProcessCpuTime,
        label: "CPU time %",
        format: ValueFormat::Dec1,
        source: Source::ProcessCpu,
    },
    MetricDescriptor {
        key: MetricKey::ProcessMemUsed,
        label: "Mem Used MB",
        format: ValueFormat::Dec1,
        source: Source::ProcessMem,
    },
];

/// Looks up the catalogue entry for a key.
pub fn descriptor(key: MetricKey) -> &'static MetricDescriptor {
    &CATALOG[key as usize]
}

/// Keys of the system partition in catalogue order.
pub fn system_keys() -> impl Iterator<Item = MetricKey> {
    CATALOG
        .iter()
        .map(|d| d.key)
        .filter(|k| !k.is_process_metric())
}

/// Keys of the monitored-process partition in catalogue order.
pub fn process_keys() -> impl Iterator<Item = MetricKey> {
    CATALOG
        .iter()
        .map(|d| d.key)
        .filter(|k| k.is_process_metric())
}
