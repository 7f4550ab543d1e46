//! Processor discovery from `/proc/cpuinfo`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{info, warn};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::error::TopologyError;

pub const CPUINFO: &str = "/proc/cpuinfo";

/// Processor identifiers present on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    present: Vec<bool>,
}

impl Topology {
    /// Build from an explicit id list. Used by tests and the `num_cpus`
    /// fallback.
    pub fn from_ids(ids: &[u32]) -> Self {
        let max = ids.iter().copied().max().unwrap_or(0) as usize;
        let mut present = vec![false; max + 1];
        for &id in ids {
            present[id as usize] = true;
        }
        Self { present }
    }

    pub fn detect() -> Result<Self, TopologyError> {
        Self::from_cpuinfo(Path::new(CPUINFO))
    }

    pub fn from_cpuinfo(path: &Path) -> Result<Self, TopologyError> {
        let file = File::open(path).map_err(|source| TopologyError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let ids = parse_cpuinfo(BufReader::new(file), path)?;
        if ids.is_empty() {
            let n = num_cpus::get().max(1) as u32;
            warn!(
                "{} lists no processor entries, assuming CPUs 0..{}",
                path.display(),
                n
            );
            return Ok(Self::from_ids(&(0..n).collect::<Vec<_>>()));
        }
        Ok(Self::from_ids(&ids))
    }

    pub fn max_id(&self) -> u32 {
        (self.present.len() - 1) as u32
    }

    pub fn is_present(&self, id: u32) -> bool {
        self.present.get(id as usize).copied().unwrap_or(false)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter(|(_, p)| **p)
            .map(|(i, _)| i as u32)
    }
}

/// Collect the ids of every `processor : N` line. Lines that start with
/// `processor` but don't match that shape are rejected with their line
/// number.
pub fn parse_cpuinfo<R: BufRead>(reader: R, path: &Path) -> Result<Vec<u32>, TopologyError> {
    let invalid = |line: usize| TopologyError::InvalidLine {
        path: PathBuf::from(path),
        line,
    };

    let mut ids = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.map_err(|_| invalid(lineno))?;
        if !line.starts_with("processor") {
            continue;
        }
        let (_, value) = line.split_once(':').ok_or_else(|| invalid(lineno))?;
        let value = value.trim_start();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(lineno));
        }
        let id: u32 = value.parse().map_err(|_| invalid(lineno))?;
        ids.push(id);
    }
    Ok(ids)
}

/// One-line host description for the startup banner.
pub fn log_host_summary(topo: &Topology) {
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
    );
    let brand = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "unknown CPU".to_string());
    info!(
        "{}: {} logical CPUs, {} present in {} (max id {})",
        brand,
        sys.cpus().len(),
        topo.ids().count(),
        CPUINFO,
        topo.max_id()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
model name\t: Intel(R) Xeon(R)

processor\t: 1
vendor_id\t: GenuineIntel

processor\t: 3
vendor_id\t: GenuineIntel
";

    fn parse(text: &str) -> Result<Vec<u32>, TopologyError> {
        parse_cpuinfo(Cursor::new(text), Path::new("cpuinfo"))
    }

    #[test]
    fn collects_processor_ids() {
        assert_eq!(parse(SAMPLE).unwrap(), vec![0, 1, 3]);
    }

    #[test]
    fn holes_are_not_present() {
        let topo = Topology::from_ids(&parse(SAMPLE).unwrap());
        assert_eq!(topo.max_id(), 3);
        assert!(topo.is_present(1));
        assert!(!topo.is_present(2));
        assert!(!topo.is_present(17));
        assert_eq!(topo.ids().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn rejects_malformed_processor_line() {
        let err = parse("processor\t: 0\nprocessor\t: x1\n").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidLine { line: 2, .. }));
        assert_eq!(err.to_string(), "cpuinfo:2 - Invalid processor line format");

        let err = parse("processor 0\n").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidLine { line: 1, .. }));

        let err = parse("processor\t:   \n").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidLine { line: 1, .. }));

        let err = parse("processor\t: 4 \n").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidLine { line: 1, .. }));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = Topology::from_cpuinfo(Path::new("/nonexistent/cpuinfo")).unwrap_err();
        assert!(matches!(err, TopologyError::Open { .. }));
        assert!(err.to_string().starts_with("Unable to open"));
    }

    #[test]
    fn no_entries_yields_empty_list() {
        assert!(parse("Processor\t: ARMv7\nBogoMIPS: 38.40\n").unwrap().is_empty());
    }
}
