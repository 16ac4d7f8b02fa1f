//! End-of-run statistics.

use std::time::Duration;

use capture::{CaptureReport, Termination};
use observability::StatsSummary;

/// Summary of one capture run
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub termination: Termination,

    /// State updates written
    pub frames: u64,

    pub first_frame: Option<u64>,
    pub last_frame: Option<u64>,

    /// Wall-clock duration of the session (provisioning included)
    pub duration: Duration,

    /// Tick wait (ms)
    pub tick_latency: StatsSummary,

    /// Trace directory (None for dry runs)
    pub output: Option<String>,
}

impl CaptureSummary {
    pub fn new(report: &CaptureReport, duration: Duration, output: Option<String>) -> Self {
        Self {
            termination: report.termination,
            frames: report.stats.frames,
            first_frame: report.stats.first_frame,
            last_frame: report.stats.last_frame,
            duration,
            tick_latency: report.stats.tick_latency.summary(),
            output,
        }
    }

    /// Captured frames per wall-clock second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Capture Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Termination: {:?}", self.termination);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames captured: {}", self.frames);
        match (self.first_frame, self.last_frame) {
            (Some(first), Some(last)) => println!("   ├─ Frame range: {first}..={last}"),
            _ => println!("   ├─ Frame range: N/A"),
        }
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Tick latency (ms): {}", self.tick_latency);

        if let Some(ref output) = self.output {
            println!("\n📁 Trace: {output}");
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use capture::CaptureStats;

    use super::*;

    #[test]
    fn summary_from_report() {
        let mut stats = CaptureStats {
            frames: 60,
            first_frame: Some(1),
            last_frame: Some(60),
            ..Default::default()
        };
        stats.tick_latency.push(30.0);

        let report = CaptureReport {
            termination: Termination::FrameLimit,
            stats,
        };
        let summary = CaptureSummary::new(&report, Duration::from_secs(2), None);

        assert_eq!(summary.frames, 60);
        assert!((summary.fps() - 30.0).abs() < 1e-9);
        assert_eq!(summary.tick_latency.count, 1);
        assert_eq!(
            CaptureSummary::new(&report, Duration::ZERO, None).fps(),
            0.0
        );
    }
}
