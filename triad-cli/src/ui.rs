//! Terminal presentation of pipeline events
//!
//! Consumes [`PipelineEvent`]s and prints them; it never influences the run.

use std::collections::HashSet;

use console::{style, Color, Style};
use triad_core::agent::{APPROVED, CHANGES_REQUESTED, PHASE_COMPLETE};
use triad_core::pipeline::Round;
use triad_core::{EventSink, OutcomeStatus, Phase, PipelineEvent};

const WIDTH: usize = 60;
const AGENT_LINES: usize = 10;
const VERDICT_LINES: usize = 12;

/// Connection details shown in the header
#[derive(Debug, Clone)]
pub struct Header<'a> {
    pub jira_url: &'a str,
    pub project: &'a str,
    pub repo: &'a str,
    pub base_branch: &'a str,
    pub assignee: &'a str,
}

/// Prints pipeline progress to stdout
#[derive(Debug, Default)]
pub struct TerminalUi {
    completed: HashSet<Phase>,
    current: Option<Phase>,
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::ProductManager => Color::Cyan,
        Phase::Developer => Color::Blue,
        Phase::ArchitectReview => Color::Yellow,
        Phase::DeveloperFix => Color::Magenta,
        Phase::Done => Color::Green,
    }
}

fn agent_color(agent: &str) -> Color {
    match agent {
        "product_manager" => Color::Cyan,
        "developer" => Color::Blue,
        "architect" => Color::Yellow,
        _ => Color::White,
    }
}

/// `PM ── DEV ── ARCH ── DONE` with the current phase marked
pub(crate) fn progress_strip(
    current: Phase,
    completed: &HashSet<Phase>,
    show_fix: bool,
) -> String {
    let mut phases = vec![Phase::ProductManager, Phase::Developer, Phase::ArchitectReview];
    if show_fix {
        phases.push(Phase::DeveloperFix);
    }
    phases.push(Phase::Done);

    let parts: Vec<String> = phases
        .into_iter()
        .map(|p| {
            if p == current {
                style(format!("◉ {}", p.short_name()))
                    .fg(phase_color(p))
                    .bold()
                    .to_string()
            } else if completed.contains(&p) {
                style(format!("● {}", p.short_name())).green().to_string()
            } else {
                style(format!("○ {}", p.short_name())).dim().to_string()
            }
        })
        .collect();

    parts.join(&format!(" {} ", style("────").dim()))
}

/// Agent text with terminal tokens removed, split for display
///
/// Returns the lines to show and how many were hidden.
pub(crate) fn agent_lines(text: &str, limit: usize) -> Option<(Vec<String>, usize)> {
    let clean = text
        .replace(PHASE_COMPLETE, "")
        .replace(CHANGES_REQUESTED, "")
        .trim()
        .to_string();
    if clean.is_empty() {
        return None;
    }
    let lines: Vec<String> = clean.lines().map(str::to_string).collect();
    let hidden = lines.len().saturating_sub(limit);
    Some((lines.into_iter().take(limit).collect(), hidden))
}

/// Verdict text lines with the verdict tokens removed
pub(crate) fn verdict_lines(text: &str, limit: usize) -> (Vec<String>, usize) {
    let lines: Vec<&str> = text.trim().lines().collect();
    let hidden = lines.len().saturating_sub(limit);
    let shown = lines
        .into_iter()
        .take(limit)
        .map(|l| l.replace(CHANGES_REQUESTED, "").replace(APPROVED, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    (shown, hidden)
}

impl TerminalUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run header with tracker and repository
    pub fn header(&self, header: &Header<'_>) {
        let bar = style("═".repeat(WIDTH)).cyan().bold();
        println!();
        println!("  {}", bar);
        println!(
            "  {}",
            style(format!("{:^WIDTH$}", "TRIAD DEVELOPMENT PIPELINE"))
                .cyan()
                .bold()
        );
        println!("  {}", bar);
        println!(
            "  {}",
            style(format!("  Jira     : {} ({})", header.jira_url, header.project)).dim()
        );
        println!(
            "  {}",
            style(format!(
                "  GitHub   : {}  (base: {})",
                header.repo, header.base_branch
            ))
            .dim()
        );
        println!(
            "  {}",
            style(format!("  Assignee : {}", header.assignee)).dim()
        );
        println!();
    }

    fn phase_start(&mut self, phase: Phase, model: &str, round: Option<Round>) {
        self.current = Some(phase);
        let color = Style::new().fg(phase_color(phase)).bold();
        let mut label = phase.to_string();
        if let Some(round) = round {
            label.push_str(&format!("  (round {}/{})", round.number, round.max));
        }

        println!();
        println!("  {}", color.apply_to("━".repeat(WIDTH)));
        println!("  {}", color.apply_to(format!("  ▶ {}", label)));
        println!(
            "  {}",
            Style::new()
                .fg(phase_color(phase))
                .apply_to(format!("    Model: {}  │  Context: independent", model))
        );
        println!("  {}", color.apply_to("━".repeat(WIDTH)));
        println!();

        let show_fix = phase == Phase::DeveloperFix || self.completed.contains(&Phase::DeveloperFix);
        println!("    {}", progress_strip(phase, &self.completed, show_fix));
        println!();
    }

    fn phase_end(&mut self, phase: Phase) {
        self.completed.insert(phase);
        println!();
        println!("  {}", style(format!("  ✓ {} completed", phase)).green());
        println!();
    }

    fn tool_call(&self, tool: &str, brief: &str) {
        println!("    {}", style(format!("⚡ {}({})", tool, brief)).dim());
    }

    fn tool_result(&self, summary: &str, is_error: bool) {
        if is_error {
            println!("    {}", style(format!("✗ {}", summary)).red());
        } else {
            println!("    {}", style(format!("✓ {}", summary)).green());
        }
    }

    fn agent_message(&self, agent: &str, text: &str) {
        let Some((lines, hidden)) = agent_lines(text, AGENT_LINES) else {
            return;
        };
        let color = Style::new().fg(agent_color(agent));
        println!();
        println!("    {}", color.clone().bold().apply_to(format!("{}:", agent)));
        for line in lines {
            println!("    {}", color.apply_to(line));
        }
        if hidden > 0 {
            println!("    {}", style(format!("... ({} more lines)", hidden)).dim());
        }
        println!();
    }

    fn artifact(&self, label: &str, value: &str) {
        println!(
            "  {}",
            style(format!("  ──▶ {}: {}", label, value)).white().bold()
        );
        println!();
    }

    fn budget_exhausted(&self, phase: Phase, limit: usize) {
        println!(
            "  {} {} stopped after {} messages without finishing",
            style("Budget exhausted:").red().bold(),
            phase,
            limit
        );
    }

    fn verdict(&self, text: &str, approved: bool) {
        let (color, icon, label) = if approved {
            (Color::Green, "✓", "P R   A P P R O V E D")
        } else {
            (Color::Yellow, "↻", "C H A N G E S   R E Q U E S T E D")
        };
        let boxed = Style::new().fg(color).bold();
        let inner = 50;

        println!();
        println!("  {}", boxed.apply_to(format!("  ╔{}╗", "═".repeat(inner))));
        println!(
            "  {}",
            boxed.apply_to(format!("  ║{:^inner$}║", format!("{}  {}", icon, label)))
        );
        println!("  {}", boxed.apply_to(format!("  ╚{}╝", "═".repeat(inner))));

        let (lines, hidden) = verdict_lines(text, VERDICT_LINES);
        for line in lines {
            println!("    {}", style(line).dim());
        }
        if hidden > 0 {
            println!("    {}", style(format!("... ({} more lines)", hidden)).dim());
        }
        println!();
    }

    fn summary(
        &mut self,
        issue_url: Option<&str>,
        pr_url: &str,
        rounds: u32,
        status: OutcomeStatus,
    ) {
        self.current = Some(Phase::Done);
        self.completed.insert(Phase::Done);

        let (color, title) = match status {
            OutcomeStatus::Approved => (Color::Green, "PIPELINE COMPLETE"),
            OutcomeStatus::MaxRoundsReached => (Color::Yellow, "MAX REVIEW ROUNDS REACHED"),
        };
        let bar = Style::new().fg(color).bold();

        println!();
        println!("  {}", bar.apply_to("═".repeat(WIDTH)));
        println!("  {}", bar.apply_to(format!("{:^WIDTH$}", title)));
        println!("  {}", bar.apply_to("═".repeat(WIDTH)));
        println!();
        if let Some(url) = issue_url {
            println!("    {}", style(format!("Jira : {}", url)).white());
        }
        println!("    {}", style(format!("PR   : {}", pr_url)).white());
        println!(
            "    {}",
            style(format!("Review rounds: {}", rounds)).white()
        );
        println!(
            "    {}",
            style("Status: PR is open - NOT merged (manual merge required)").yellow()
        );
        if status == OutcomeStatus::MaxRoundsReached {
            println!(
                "    {}",
                style("Review did not converge; manual follow-up needed").yellow()
            );
        }
        println!();
        let show_fix = self.completed.contains(&Phase::DeveloperFix);
        println!(
            "    {}",
            progress_strip(Phase::Done, &self.completed, show_fix)
        );
        println!();
    }
}

impl EventSink for TerminalUi {
    fn emit(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::PhaseStart {
                phase,
                model,
                round,
            } => self.phase_start(phase, &model, round),
            PipelineEvent::ToolCall { tool, brief, .. } => self.tool_call(&tool, &brief),
            PipelineEvent::ToolResult {
                summary, is_error, ..
            } => self.tool_result(&summary, is_error),
            PipelineEvent::AgentMessage { agent, text } => self.agent_message(&agent, &text),
            PipelineEvent::Artifact { artifact, value } => {
                self.artifact(&artifact.to_string(), &value)
            }
            PipelineEvent::BudgetExhausted { phase, limit } => self.budget_exhausted(phase, limit),
            PipelineEvent::Verdict { text, approved, .. } => self.verdict(&text, approved),
            PipelineEvent::PhaseEnd { phase } => self.phase_end(phase),
            PipelineEvent::Summary {
                issue_url,
                pr_url,
                rounds,
                status,
                ..
            } => self.summary(issue_url.as_deref(), &pr_url, rounds, status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_strip_marks_phases() {
        let mut completed = HashSet::new();
        completed.insert(Phase::ProductManager);

        let strip = progress_strip(Phase::Developer, &completed, false);
        assert_eq!(
            console::strip_ansi_codes(&strip),
            "● PM ──── ◉ DEV ──── ○ ARCH ──── ○ DONE"
        );

        let strip = progress_strip(Phase::DeveloperFix, &completed, true);
        assert!(console::strip_ansi_codes(&strip).contains("◉ FIX"));
    }

    #[test]
    fn test_agent_lines_strip_tokens() {
        let (lines, hidden) = agent_lines("Opened PR #17.\nPHASE_COMPLETE", 10).unwrap();
        assert_eq!(lines, vec!["Opened PR #17.".to_string()]);
        assert_eq!(hidden, 0);

        assert!(agent_lines("PHASE_COMPLETE", 10).is_none());
    }

    #[test]
    fn test_agent_lines_truncate() {
        let text = (1..=14).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let (lines, hidden) = agent_lines(&text, 10).unwrap();
        assert_eq!(lines.len(), 10);
        assert_eq!(hidden, 4);
    }

    #[test]
    fn test_verdict_lines_drop_tokens() {
        let (lines, hidden) = verdict_lines("Looks solid.\nAPPROVED", 12);
        assert_eq!(lines, vec!["Looks solid.".to_string()]);
        assert_eq!(hidden, 0);

        let (lines, _) = verdict_lines("Missing tests.\nCHANGES_REQUESTED", 12);
        assert_eq!(lines, vec!["Missing tests.".to_string()]);
    }
}
