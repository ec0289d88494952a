//! Console progress for runs

use colored::Colorize;
use converge::{Outcome, Phase, RunObserver};

/// Prints one line per resource as the orchestrator walks the graph
///
/// The preflight pass is only shown when `verbose` is set.
pub struct ConsoleObserver {
    verbose: bool,
    index: usize,
    total: usize,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            index: 0,
            total: 0,
        }
    }

    fn shows(&self, phase: Phase) -> bool {
        self.verbose || phase == Phase::Apply
    }
}

impl RunObserver for ConsoleObserver {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        self.index = 0;
        self.total = count;
        if self.shows(phase) {
            println!();
            println!(
                "  {} {} {}",
                "→".cyan(),
                title(phase).bold(),
                crate::ui::count(count, "resource").dimmed()
            );
        }
    }

    fn on_resource_start(&mut self, _phase: Phase, _name: &str, _module: Option<&str>) {
        self.index += 1;
    }

    fn on_resource_complete(&mut self, phase: Phase, name: &str, outcome: &Outcome) {
        if !self.shows(phase) {
            return;
        }
        let marker = match outcome {
            Outcome::Reported | Outcome::Claimed => "✓".green(),
            Outcome::Skipped => "○".yellow(),
            Outcome::Unhandled => "·".dimmed(),
        };
        let note = match (phase, outcome) {
            (_, Outcome::Skipped) => "skipped",
            (Phase::Preflight, Outcome::Reported) => "found",
            (Phase::Preflight, _) => "",
            (Phase::Apply, Outcome::Unhandled) => "group",
            (Phase::Apply, _) => "",
        };
        println!(
            "    {} {} {} {}",
            format!("[{}/{}]", self.index, self.total).dimmed(),
            marker,
            name,
            note.dimmed()
        );
    }

    fn on_delay(&mut self, name: &str, secs: u64) {
        println!(
            "      {} waiting {}s after {}",
            "…".dimmed(),
            secs,
            name
        );
    }

    fn on_phase_complete(&mut self, _phase: Phase) {}
}

fn title(phase: Phase) -> &'static str {
    match phase {
        Phase::Preflight => "Discovering",
        Phase::Apply => "Converging",
    }
}
