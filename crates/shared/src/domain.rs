use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! number_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

number_newtype!(StepNumber, u32);

/// Submission counts as last reported by the analytics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub total_count: u64,
    pub pending_count: u64,
    pub approved_count: u64,
    pub approval_rate: f64,
}

impl DashboardSnapshot {
    pub fn display(&self) -> DisplayedStats {
        DisplayedStats {
            total: self.total_count.to_string(),
            pending: self.pending_count.to_string(),
            approved: self.approved_count.to_string(),
            approval_rate: format!("{}%", self.approval_rate),
        }
    }

    pub fn chart(&self) -> ProportionChart {
        ProportionChart {
            approved: self.approved_count,
            pending: self.pending_count,
        }
    }
}

/// Text rendered in the four stat cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedStats {
    pub total: String,
    pub pending: String,
    pub approved: String,
    pub approval_rate: String,
}

pub const CHART_LABELS: [&str; 2] = ["Approved", "Pending"];

/// Approved vs. pending proportion chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionChart {
    pub approved: u64,
    pub pending: u64,
}

impl ProportionChart {
    pub fn labels(&self) -> [&'static str; 2] {
        CHART_LABELS
    }

    pub fn datapoints(&self) -> [u64; 2] {
        [self.approved, self.pending]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(approval_rate: f64) -> DashboardSnapshot {
        DashboardSnapshot {
            total_count: 40,
            pending_count: 12,
            approved_count: 25,
            approval_rate,
        }
    }

    #[test]
    fn display_renders_counts_and_rate_with_percent_sign() {
        let display = snapshot(62.5).display();
        assert_eq!(display.total, "40");
        assert_eq!(display.pending, "12");
        assert_eq!(display.approved, "25");
        assert_eq!(display.approval_rate, "62.5%");
    }

    #[test]
    fn whole_number_rate_has_no_trailing_decimal() {
        assert_eq!(snapshot(60.0).display().approval_rate, "60%");
    }

    #[test]
    fn chart_orders_approved_before_pending() {
        let chart = snapshot(62.5).chart();
        assert_eq!(chart.datapoints(), [25, 12]);
        assert_eq!(chart.labels(), ["Approved", "Pending"]);
    }

    #[test]
    fn step_number_displays_inner_value() {
        assert_eq!(StepNumber(3).to_string(), "3");
    }
}
