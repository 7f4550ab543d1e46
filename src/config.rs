//! Command-line options and the slot table they resolve to.

use clap::Parser;
use log::debug;

use crate::control::SyncMode;
use crate::error::ConfigError;
use crate::phase::Utilization;
use crate::slot::ProcessorSlot;
use crate::topology::Topology;

fn parse_percent_arg(text: &str) -> Result<Utilization, ConfigError> {
    Utilization::parse_percent(text)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "use-cpu",
    version,
    about = "Use cpu time on the system",
    long_about = "Load each selected CPU to a fixed percentage every second, \
                  reporting any second in which the busy phase overran."
)]
pub struct Opts {
    /// Default percentage to use on each CPU.
    #[arg(short, long, default_value = "50", value_parser = parse_percent_arg)]
    pub percent: Utilization,

    /// Real-time priority to run the threads at, or 0 for normal priority.
    #[arg(short = 'r', long, default_value_t = 0)]
    pub prio: u32,

    /// CPUs to run on, optionally with a percent each:
    /// <cpu#>[:<percent>][,<cpu#>[:<percent>]]...
    /// Defaults to every CPU at the default percentage.
    #[arg(short, long)]
    pub cpus: Option<String>,

    /// Seconds to run the test; 0 means forever.
    #[arg(short, long, default_value_t = 0)]
    pub duration: u64,

    /// Spin on a flag released by the main thread instead of reading the
    /// clock in every thread. Quieter under tracing, less reliable close to
    /// 100%.
    #[arg(short = 's', long = "nogettodspin", visible_alias = "barrier")]
    pub barrier: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Opts {
    pub fn sync_mode(&self) -> SyncMode {
        if self.barrier {
            SyncMode::Barrier
        } else {
            SyncMode::Independent
        }
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            default_utilization: self.percent,
            priority: self.prio,
            cpus: self.cpus.clone(),
            duration_secs: self.duration,
            mode: self.sync_mode(),
        }
    }
}

/// Everything the coordinator needs, independent of how it was parsed.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub default_utilization: Utilization,
    pub priority: u32,
    pub cpus: Option<String>,
    pub duration_secs: u64,
    pub mode: SyncMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuOverride {
    pub cpu: u32,
    pub utilization: Option<Utilization>,
}

/// Parse `cpu[:percent][,cpu[:percent]]...`. Specifiers are numbered from 1
/// in errors. A single trailing comma is tolerated.
pub fn parse_cpu_list(spec: &str, topo: &Topology) -> Result<Vec<CpuOverride>, ConfigError> {
    let body = spec.strip_suffix(',').unwrap_or(spec);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut overrides = Vec::new();
    for (idx, item) in body.split(',').enumerate() {
        let count = idx + 1;
        let (cpu_text, percent_text) = match item.split_once(':') {
            Some((cpu, percent)) => (cpu, Some(percent)),
            None => (item, None),
        };

        if cpu_text.is_empty() || !cpu_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidCpuSpecifier(count));
        }
        let cpu: u32 = cpu_text
            .parse()
            .map_err(|_| ConfigError::CpuOutOfRange(count))?;
        if cpu > topo.max_id() {
            return Err(ConfigError::CpuOutOfRange(count));
        }
        if !topo.is_present(cpu) {
            return Err(ConfigError::CpuNotPresent(count));
        }

        let utilization = percent_text
            .map(|text| {
                Utilization::parse_percent(text).map_err(|err| match err {
                    ConfigError::PercentTooLarge => ConfigError::CpuPercentTooLarge,
                    _ => ConfigError::InvalidCpuSpecifier(count),
                })
            })
            .transpose()?;

        overrides.push(CpuOverride { cpu, utilization });
    }
    Ok(overrides)
}

/// Resolve the settings against the host into one slot per processor id.
///
/// A CPU named more than once keeps the last percent given for it.
pub fn build_slots(
    topo: &Topology,
    settings: &RunSettings,
) -> Result<Vec<ProcessorSlot>, ConfigError> {
    let mut slots: Vec<ProcessorSlot> = (0..=topo.max_id())
        .map(|id| ProcessorSlot::new(id, topo.is_present(id)))
        .collect();

    match &settings.cpus {
        Some(spec) => {
            let mut chosen: Vec<Option<Utilization>> = vec![None; slots.len()];
            let mut used = vec![false; slots.len()];
            for ov in parse_cpu_list(spec, topo)? {
                used[ov.cpu as usize] = true;
                if ov.utilization.is_some() {
                    chosen[ov.cpu as usize] = ov.utilization;
                }
            }
            for (slot, (used, util)) in slots.iter_mut().zip(used.into_iter().zip(chosen)) {
                if used {
                    slot.select(
                        util.unwrap_or(settings.default_utilization),
                        settings.priority,
                    );
                }
            }
        }
        None => {
            for slot in slots.iter_mut().filter(|s| s.is_valid()) {
                slot.select(settings.default_utilization, settings.priority);
            }
        }
    }

    if !slots.iter().any(|s| s.is_selected()) {
        return Err(ConfigError::NoProcessors);
    }
    for slot in slots.iter().filter(|s| s.is_selected()) {
        debug!(
            "CPU {}: {:.1}% at priority {}",
            slot.id(),
            slot.utilization().percent(),
            slot.priority()
        );
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topo() -> Topology {
        Topology::from_ids(&[0, 1, 3])
    }

    fn pct(p: f64) -> Utilization {
        Utilization::from_percent(p).unwrap()
    }

    #[test]
    fn parses_plain_and_percent_entries() {
        let list = parse_cpu_list("0:90,1", &topo()).unwrap();
        assert_eq!(
            list,
            vec![
                CpuOverride {
                    cpu: 0,
                    utilization: Some(pct(90.0))
                },
                CpuOverride {
                    cpu: 1,
                    utilization: None
                },
            ]
        );
    }

    #[test]
    fn trailing_comma_is_accepted() {
        assert_eq!(parse_cpu_list("3,", &topo()).unwrap().len(), 1);
        assert!(parse_cpu_list("", &topo()).unwrap().is_empty());
    }

    #[test]
    fn errors_name_the_specifier() {
        let t = topo();
        assert_eq!(
            parse_cpu_list("0,x", &t),
            Err(ConfigError::InvalidCpuSpecifier(2))
        );
        assert_eq!(
            parse_cpu_list("0,,1", &t),
            Err(ConfigError::InvalidCpuSpecifier(2))
        );
        assert_eq!(parse_cpu_list("1,4", &t), Err(ConfigError::CpuOutOfRange(2)));
        assert_eq!(parse_cpu_list("2", &t), Err(ConfigError::CpuNotPresent(1)));
        assert_eq!(
            parse_cpu_list("0:", &t),
            Err(ConfigError::InvalidCpuSpecifier(1))
        );
        assert_eq!(
            parse_cpu_list("0:50x", &t),
            Err(ConfigError::InvalidCpuSpecifier(1))
        );
        assert_eq!(
            parse_cpu_list("0:-5", &t),
            Err(ConfigError::InvalidCpuSpecifier(1))
        );
        assert_eq!(
            parse_cpu_list("1:100", &t),
            Err(ConfigError::CpuPercentTooLarge)
        );
    }

    #[test]
    fn override_wins_and_others_inherit_default() {
        let settings = RunSettings {
            default_utilization: pct(20.0),
            cpus: Some("0:90,1".into()),
            ..Default::default()
        };
        let slots = build_slots(&topo(), &settings).unwrap();
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].utilization(), pct(90.0));
        assert_eq!(slots[1].utilization(), pct(20.0));
        assert!(!slots[2].is_selected());
        assert!(!slots[2].is_valid());
        assert!(!slots[3].is_selected());
    }

    #[test]
    fn without_cpu_list_every_present_cpu_is_used() {
        let settings = RunSettings {
            priority: 5,
            ..Default::default()
        };
        let slots = build_slots(&topo(), &settings).unwrap();
        let used: Vec<u32> = slots
            .iter()
            .filter(|s| s.is_selected())
            .map(|s| s.id())
            .collect();
        assert_eq!(used, vec![0, 1, 3]);
        assert!(slots.iter().filter(|s| s.is_selected()).all(|s| s.priority() == 5));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let settings = RunSettings {
            cpus: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            build_slots(&topo(), &settings),
            Err(ConfigError::NoProcessors)
        ));
    }

    #[test]
    fn cli_defaults() {
        let opts = Opts::try_parse_from(["use-cpu"]).unwrap();
        assert_eq!(opts.percent, Utilization::default());
        assert_eq!(opts.prio, 0);
        assert_eq!(opts.duration, 0);
        assert_eq!(opts.cpus, None);
        assert_eq!(opts.sync_mode(), SyncMode::Independent);
    }

    #[test]
    fn cli_options() {
        let opts = Opts::try_parse_from([
            "use-cpu",
            "--percent",
            "20",
            "--cpus",
            "0:90,1",
            "-d",
            "2",
            "--prio",
            "10",
            "--nogettodspin",
        ])
        .unwrap();
        let settings = opts.settings();
        assert_eq!(settings.default_utilization, pct(20.0));
        assert_eq!(settings.cpus.as_deref(), Some("0:90,1"));
        assert_eq!(settings.duration_secs, 2);
        assert_eq!(settings.priority, 10);
        assert_eq!(settings.mode, SyncMode::Barrier);

        let opts = Opts::try_parse_from(["use-cpu", "--barrier"]).unwrap();
        assert_eq!(opts.sync_mode(), SyncMode::Barrier);
    }

    #[test]
    fn cli_rejects_bad_values() {
        assert!(Opts::try_parse_from(["use-cpu", "--percent", "100"]).is_err());
        assert!(Opts::try_parse_from(["use-cpu", "--percent", "5o"]).is_err());
        assert!(Opts::try_parse_from(["use-cpu", "--duration", "1.5"]).is_err());
        assert!(Opts::try_parse_from(["use-cpu", "--prio", "-1"]).is_err());
    }
}
