use dashmap::DashMap;

/// What the proxy did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Forwarded verbatim (control-plane, unknown, or tolerated-malformed).
    Forwarded,
    /// Key arguments were namespaced before forwarding.
    Rewritten,
    /// Refused with a synthesized error; nothing reached the backend.
    Blocked,
    /// Reply was narrowed to the session's namespace.
    Filtered,
}

/// Process-wide statistics (shared across all client connections).
///
/// The intent is operational visibility: "which commands get touched, and how".
#[derive(Debug, Default)]
pub struct Stats {
    by_action_cmd: DashMap<(Action, String), u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: Action, cmd_upper: &str) {
        let mut entry = self
            .by_action_cmd
            .entry((action, cmd_upper.to_string()))
            .or_default();
        *entry = entry.saturating_add(1);
    }

    /// Render summary lines similar to:
    ///
    /// ```text
    /// BLOCKED   FLUSHDB          3 times
    /// REWRITTEN SET              8056 times
    /// ...
    /// ```
    pub fn render_summary_lines(&self) -> Vec<String> {
        let mut rows: Vec<(Action, String, u64)> = self
            .by_action_cmd
            .iter()
            .map(|e| {
                let (action, cmd) = e.key();
                (*action, cmd.clone(), *e.value())
            })
            .collect();

        rows.sort_by(|a, b| {
            // Interventions first; verbatim traffic last.
            let ra = action_rank(a.0);
            let rb = action_rank(b.0);
            ra.cmp(&rb)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.1.cmp(&b.1))
        });

        rows.into_iter()
            .map(|(action, cmd, total)| {
                let action_s = match action {
                    Action::Blocked => "BLOCKED",
                    Action::Filtered => "FILTERED",
                    Action::Rewritten => "REWRITTEN",
                    Action::Forwarded => "FORWARDED",
                };
                format!("{action_s:<9} {cmd:<16} {total} times")
            })
            .collect()
    }
}

fn action_rank(a: Action) -> u8 {
    match a {
        Action::Blocked => 0,
        Action::Filtered => 1,
        Action::Rewritten => 2,
        Action::Forwarded => 3,
    }
}
