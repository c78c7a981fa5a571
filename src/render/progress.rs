use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::models::PipelineEvent;
use crate::utils::formatting::format_duration;

/// Progress bars for a streamed run: one bar over agents, one spinner for the active agent.
pub struct RunProgress {
    multi: MultiProgress,
    agent_bar: ProgressBar,
    spinner: Option<ProgressBar>,
    start_time: Instant,
}

impl RunProgress {
    pub fn new(agent_count: usize) -> Self {
        Self::with_target(agent_count, ProgressDrawTarget::stderr())
    }

    /// Same bookkeeping, nothing drawn. Used for `--json` output.
    pub fn hidden(agent_count: usize) -> Self {
        Self::with_target(agent_count, ProgressDrawTarget::hidden())
    }

    fn with_target(agent_count: usize, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let agent_bar = multi.add(ProgressBar::new(agent_count as u64));
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("  {bar:30.cyan/dark_gray} {pos}/{len} agents | {msg}")
        {
            agent_bar.set_style(bar_style.progress_chars("█▓░"));
        }
        agent_bar.set_message("Connecting...");
        Self { multi, agent_bar, spinner: None, start_time: Instant::now() }
    }

    pub fn handle_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Start(p) => {
                if p.agents as u64 > self.agent_bar.length().unwrap_or(0) {
                    self.agent_bar.set_length(p.agents as u64);
                }
                let source = if p.mock { "sandbox" } else { "live" };
                self.agent_bar.set_message(format!("Started ({})", source));
            }
            PipelineEvent::AgentStart(p) => {
                self.clear_spinner();
                let spinner = self.multi.add(ProgressBar::new_spinner());
                if let Ok(spinner_style) = ProgressStyle::default_spinner().template("    {spinner:.yellow} {msg}") {
                    spinner.set_style(spinner_style);
                }
                spinner.set_message(p.agent.clone());
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.spinner = Some(spinner);
                self.agent_bar.set_message(p.agent.clone());
            }
            PipelineEvent::AgentDone(p) => {
                self.clear_spinner();
                self.agent_bar.inc(1);
                let duration = p.duration_ms.map(format_duration).unwrap_or_default();
                self.println(&format!("  {} {} {}", style("✓").green(), p.agent, style(duration).dim()));
            }
            PipelineEvent::Error(p) => {
                self.clear_spinner();
                self.agent_bar.abandon_with_message(format!("Failed: {}", p.message));
            }
            PipelineEvent::Complete(_) => {
                self.clear_spinner();
                let elapsed = self.start_time.elapsed().as_millis() as u64;
                self.agent_bar
                    .finish_with_message(format!("Complete in {}", format_duration(elapsed)));
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.agent_bar.position()
    }

    pub fn is_finished(&self) -> bool {
        self.agent_bar.is_finished()
    }

    /// Print above the bars without tearing them.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
