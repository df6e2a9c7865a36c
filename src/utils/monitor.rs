use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// One finished phase of a batch run.
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub items: usize,
    pub elapsed: Duration,
    pub memory_mb: Option<u64>,
}

/// Records per-phase timings of a run. When enabled (and built with the
/// `cli` feature) each checkpoint also samples the process memory.
pub struct RunMonitor {
    enabled: bool,
    start_time: Instant,
    last_checkpoint: Mutex<Instant>,
    phases: Mutex<Vec<PhaseStats>>,
    peak_memory_mb: Mutex<u64>,
    #[cfg(feature = "cli")]
    system: Option<(Mutex<System>, Pid)>,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();

        #[cfg(feature = "cli")]
        let system = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new_with_specifics(RefreshKind::everything());
                    system.refresh_all();
                    Some((Mutex::new(system), pid))
                }
                Err(e) => {
                    tracing::warn!("Memory sampling disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            enabled,
            start_time: now,
            last_checkpoint: Mutex::new(now),
            phases: Mutex::new(Vec::new()),
            peak_memory_mb: Mutex::new(0),
            #[cfg(feature = "cli")]
            system,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn sample_memory_mb(&self) -> Option<u64> {
        let (system, pid) = self.system.as_ref()?;
        let mut system = system.lock().ok()?;
        system.refresh_all();
        let memory_mb = system.process(*pid)?.memory() / 1024 / 1024;

        let mut peak = self.peak_memory_mb.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }
        Some(memory_mb)
    }

    #[cfg(not(feature = "cli"))]
    fn sample_memory_mb(&self) -> Option<u64> {
        None
    }

    /// Closes the current phase: everything since the previous checkpoint
    /// is attributed to `phase`.
    pub fn checkpoint(&self, phase: &str, items: usize) {
        let now = Instant::now();
        let elapsed = match self.last_checkpoint.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => Duration::ZERO,
        };

        let memory_mb = self.sample_memory_mb();
        let stats = PhaseStats {
            phase: phase.to_string(),
            items,
            elapsed,
            memory_mb,
        };

        if self.enabled {
            match stats.memory_mb {
                Some(mb) => tracing::info!(
                    "📊 {} - {} items in {:?}, Memory: {}MB",
                    stats.phase,
                    stats.items,
                    stats.elapsed,
                    mb
                ),
                None => tracing::info!(
                    "📊 {} - {} items in {:?}",
                    stats.phase,
                    stats.items,
                    stats.elapsed
                ),
            }
        }

        if let Ok(mut phases) = self.phases.lock() {
            phases.push(stats);
        }
    }

    pub fn phases(&self) -> Vec<PhaseStats> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_final_stats(&self) {
        let peak = self.peak_memory_mb.lock().map(|p| *p).unwrap_or(0);
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.elapsed(),
            peak
        );
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_are_recorded_in_order() {
        let monitor = RunMonitor::new(false);
        monitor.checkpoint("extract", 10);
        monitor.checkpoint("transform", 8);

        let phases = monitor.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].phase, "extract");
        assert_eq!(phases[1].items, 8);
        assert!(phases[0].memory_mb.is_none());
    }

    #[test]
    fn test_enabled_flag_is_kept() {
        assert!(RunMonitor::new(true).is_enabled());
        assert!(!RunMonitor::new(false).is_enabled());
        assert!(!RunMonitor::default().is_enabled());
    }
}
