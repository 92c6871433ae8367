//! Best-effort host snapshot attached to every report.

use serde::{Deserialize, Serialize};
use sysinfo::System;

const BYTES_PER_MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,

    /// Total physical memory in MiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_physical_memory: Option<u64>,

    /// Available physical memory in MiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_physical_memory: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl EnvironmentMessage {
    /// Snapshot the current host. Fields the platform cannot report are left
    /// empty.
    pub fn capture() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();

        let processor_count = match system.cpus().len() {
            0 => std::thread::available_parallelism()
                .ok()
                .map(|count| count.get()),
            count => Some(count),
        };

        let cpu = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty());

        let os_version = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
            (Some(name), None) => Some(name),
            (None, version) => version,
        };

        Self {
            processor_count,
            architecture: System::cpu_arch()
                .or_else(|| Some(std::env::consts::ARCH.to_string())),
            cpu,
            os_version,
            kernel_version: System::kernel_version(),
            total_physical_memory: to_mib(system.total_memory()),
            available_physical_memory: to_mib(system.available_memory()),
            runtime: Some(format!("rust ({})", std::env::consts::OS)),
        }
    }
}

/// Host name of the current machine, if the platform exposes one.
pub fn machine_name() -> Option<String> {
    System::host_name().filter(|name| !name.is_empty())
}

fn to_mib(bytes: u64) -> Option<u64> {
    match bytes {
        0 => None,
        bytes => Some(bytes / BYTES_PER_MIB),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_reports_processor_count_and_architecture() {
        let environment = EnvironmentMessage::capture();

        assert!(environment.processor_count.unwrap_or(1) >= 1);
        assert!(environment.architecture.is_some());
        assert!(environment.runtime.unwrap().starts_with("rust"));
    }

    #[test]
    fn test_unavailable_fields_are_omitted_from_json() {
        let environment = EnvironmentMessage {
            processor_count: Some(4),
            ..Default::default()
        };

        let value = serde_json::to_value(&environment).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["processorCount"], 4);
    }

    #[test]
    fn test_zero_memory_is_treated_as_unknown() {
        assert_eq!(to_mib(0), None);
        assert_eq!(to_mib(8 * BYTES_PER_MIB), Some(8));
    }
}
