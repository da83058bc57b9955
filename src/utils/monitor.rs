#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ResourceStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
struct Sampler {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

/// 每個階段結束後記錄一次行程的 CPU / 記憶體用量
#[cfg(feature = "cli")]
pub struct ResourceMonitor {
    sampler: Option<Mutex<Sampler>>,
    start_time: Instant,
}

#[cfg(feature = "cli")]
impl ResourceMonitor {
    pub fn new(enabled: bool) -> Self {
        let sampler = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new_with_specifics(RefreshKind::everything());
                    system.refresh_all();
                    Some(Mutex::new(Sampler {
                        system,
                        pid,
                        peak_memory_mb: 0,
                    }))
                }
                Err(e) => {
                    tracing::warn!("⚠️ Resource monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            sampler,
            start_time: Instant::now(),
        }
    }

    pub fn sample(&self) -> Option<ResourceStats> {
        let mut sampler = self.sampler.as_ref()?.lock().ok()?;
        sampler.system.refresh_all();

        let pid = sampler.pid;
        let (cpu_usage, memory_mb) = {
            let process = sampler.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        sampler.peak_memory_mb = sampler.peak_memory_mb.max(memory_mb);

        Some(ResourceStats {
            cpu_usage,
            memory_usage_mb: memory_mb,
            peak_memory_mb: sampler.peak_memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn log_stage(&self, stage: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                stage,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_some()
    }
}

// 沒有 cli feature 時不做任何量測
#[cfg(not(feature = "cli"))]
pub struct ResourceMonitor;

#[cfg(not(feature = "cli"))]
impl ResourceMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stage(&self, _stage: &str) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
