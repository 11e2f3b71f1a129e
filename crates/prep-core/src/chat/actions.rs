//! Preset study prompts and the per-session query allowance.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickAction {
    pub title: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
    /// Subject appended to `prompt` when none is given.
    pub subject: &'static str,
}

impl QuickAction {
    /// The query sent for this action, with `subject` overriding the default.
    pub fn message(&self, subject: Option<&str>) -> String {
        let subject = subject
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.subject);
        format!("{} {subject}", self.prompt)
    }
}

pub const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        title: "Explain Topics",
        description: "Learn concepts & formulas",
        prompt: "Explain in detail the concept of",
        subject: "Percentage in Quantitative Aptitude",
    },
    QuickAction {
        title: "Practice MCQs",
        description: "Subject-wise questions",
        prompt: "Generate practice MCQs on",
        subject: "Time and Work",
    },
    QuickAction {
        title: "Study Plan",
        description: "Create schedule",
        prompt: "Create a study plan for",
        subject: "next 3 months SSC CGL preparation",
    },
    QuickAction {
        title: "Previous Years",
        description: "PYQ analysis & tips",
        prompt: "Analyze previous year questions for",
        subject: "Reasoning section",
    },
    QuickAction {
        title: "Quick Math",
        description: "Shortcuts & tricks",
        prompt: "Show me quick tricks for solving",
        subject: "Profit and Loss shortcuts",
    },
    QuickAction {
        title: "Reasoning",
        description: "Logic puzzles",
        prompt: "Practice questions on reasoning topic",
        subject: "Blood Relations",
    },
    QuickAction {
        title: "English",
        description: "Grammar & vocab",
        prompt: "Practice English questions on",
        subject: "Spotting Errors",
    },
    QuickAction {
        title: "Current GK",
        description: "Important updates",
        prompt: "Give me current affairs for SSC CGL on",
        subject: "last month important events",
    },
];

/// Looks up an action by 1-based number or by title (case-insensitive,
/// `-`/`_` treated as spaces).
pub fn find_action(name: &str) -> Option<&'static QuickAction> {
    let name = name.trim();
    if let Ok(number) = name.parse::<usize>() {
        return number.checked_sub(1).and_then(|i| QUICK_ACTIONS.get(i));
    }
    let wanted = name.replace(['-', '_'], " ");
    QUICK_ACTIONS
        .iter()
        .find(|action| action.title.eq_ignore_ascii_case(&wanted))
}

/// Remaining queries for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryQuota {
    pub total: u32,
    pub remaining: u32,
}

impl QueryQuota {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            remaining: total,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Takes one query. Returns `false`, without change, when none are left.
    pub fn consume(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(rest) => {
                self.remaining = rest;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Display for QueryQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} queries left today", self.remaining, self.total)
    }
}
