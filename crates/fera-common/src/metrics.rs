//! Dashboard and report figures derived from the lead collection.

use serde::{Deserialize, Serialize};

use crate::models::{Lead, LeadStatus, TeamMember};

pub const DEFAULT_MONTHLY_GOAL: f64 = 100_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total: usize,
    /// Sum of closed deal values.
    pub revenue: f64,
    /// Sum of values still in play (neither closed nor lost).
    pub pipeline: f64,
    pub average_deal: f64,
    pub monthly_goal: f64,
    /// Percentage of the monthly goal reached, capped at 100.
    pub goal_progress: f64,
    pub distribution: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusCount {
    pub status: LeadStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberPerformance {
    pub member_id: String,
    pub name: String,
    pub sales: f64,
    pub deals_closed: usize,
}

pub fn dashboard<L: AsRef<Lead>>(leads: &[L], monthly_goal: f64) -> DashboardStats {
    let closed: Vec<&Lead> = leads
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| l.status == LeadStatus::Closed)
        .collect();
    let revenue: f64 = closed.iter().map(|l| l.value).sum();
    let pipeline: f64 = leads
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| l.status.is_open())
        .map(|l| l.value)
        .sum();
    let average_deal = if closed.is_empty() {
        0.0
    } else {
        revenue / closed.len() as f64
    };
    let goal_progress = if monthly_goal > 0.0 {
        (revenue / monthly_goal * 100.0).min(100.0)
    } else {
        0.0
    };

    DashboardStats {
        total: leads.len(),
        revenue,
        pipeline,
        average_deal,
        monthly_goal,
        goal_progress,
        distribution: status_distribution(leads),
    }
}

/// Lead count per status in board order; empty statuses are omitted.
pub fn status_distribution<L: AsRef<Lead>>(leads: &[L]) -> Vec<StatusCount> {
    LeadStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: leads.iter().filter(|l| l.as_ref().status == *status).count(),
        })
        .filter(|sc| sc.count > 0)
        .collect()
}

/// Closed-deal totals per roster member, matched on the lead owner name.
pub fn team_performance<L: AsRef<Lead>>(
    leads: &[L],
    members: &[TeamMember],
) -> Vec<MemberPerformance> {
    members
        .iter()
        .map(|m| {
            let won: Vec<&Lead> = leads
                .iter()
                .map(AsRef::as_ref)
                .filter(|l| l.status == LeadStatus::Closed && l.owner == m.name)
                .collect();
            MemberPerformance {
                member_id: m.id.clone(),
                name: m.name.clone(),
                sales: won.iter().map(|l| l.value).sum(),
                deals_closed: won.len(),
            }
        })
        .collect()
}
