//! Lead list filtering: free-text search, status filter and named views.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Lead, LeadStatus, ParseError, Priority};

/// Named preset narrowing the lead list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadView {
    #[default]
    All,
    Urgent,
    New,
    Win,
    Loss,
}

impl LeadView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Urgent => "urgent",
            Self::New => "new",
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            Self::All => true,
            Self::Urgent => lead.priority == Priority::High,
            Self::New => lead.status == LeadStatus::New,
            Self::Win => lead.status == LeadStatus::Closed,
            Self::Loss => lead.status == LeadStatus::Lost,
        }
    }
}

impl FromStr for LeadView {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "urgent" => Ok(Self::Urgent),
            "new" => Ok(Self::New),
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            _ => Err(ParseError {
                kind: "lead view",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(LeadStatus),
}

impl StatusFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => lead.status == *status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "all" {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// All three predicates are ANDed; each is independent of the others, so
/// the order of application never changes the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    pub query: String,
    pub status: StatusFilter,
    pub view: LeadView,
}

impl LeadFilter {
    pub fn new(query: impl Into<String>, status: StatusFilter, view: LeadView) -> Self {
        Self {
            query: query.into(),
            status,
            view,
        }
    }

    pub fn matches_text(&self, lead: &Lead) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let query = self.query.to_lowercase();
        lead.name.to_lowercase().contains(&query)
            || lead.company.to_lowercase().contains(&query)
            || lead.email.to_lowercase().contains(&query)
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        self.matches_text(lead) && self.status.matches(lead) && self.view.matches(lead)
    }

    /// Stable filter: matching leads keep their source order.
    pub fn apply<'a, L: AsRef<Lead>>(&self, leads: &'a [L]) -> Vec<&'a L> {
        leads.iter().filter(|l| self.matches(l.as_ref())).collect()
    }

    pub fn apply_owned<L: AsRef<Lead> + Clone>(&self, leads: &[L]) -> Vec<L> {
        self.apply(leads).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn lead(id: &str, name: &str, company: &str, status: LeadStatus, priority: Priority) -> Lead {
        Lead {
            id: id.into(),
            name: name.into(),
            company: company.into(),
            email: format!("{}@example.com", id),
            phone: String::new(),
            status,
            value: 1000.0,
            last_interaction: String::new(),
            priority,
            owner: "Alex".into(),
            tags: vec![],
            history: vec![],
            created_at: String::new(),
        }
    }

    fn sample() -> Vec<Lead> {
        vec![
            lead("l1", "Sarah Costa", "Skynet Systems", LeadStatus::New, Priority::High),
            lead("l2", "John Andrade", "MetaCortex", LeadStatus::Proposal, Priority::High),
            lead("l3", "Eliana Ribeiro", "Weyland Logistics", LeadStatus::Contacted, Priority::Medium),
            lead("l4", "Bruno Wayne", "Wayne Enterprises", LeadStatus::Closed, Priority::Low),
            lead("l5", "Walter White", "Grey Matter", LeadStatus::Lost, Priority::High),
        ]
    }

    fn ids<L: AsRef<Lead>>(leads: &[&L]) -> Vec<String> {
        leads.iter().map(|l| l.as_ref().id.clone()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything_in_order() {
        let leads = sample();
        let out = LeadFilter::default().apply(&leads);
        assert_eq!(ids(&out), vec!["l1", "l2", "l3", "l4", "l5"]);
    }

    #[test]
    fn test_text_match_is_case_insensitive_across_fields() {
        let leads = sample();
        let by_name = LeadFilter::new("SARAH", StatusFilter::All, LeadView::All).apply(&leads);
        assert_eq!(ids(&by_name), vec!["l1"]);

        let by_company = LeadFilter::new("wayne", StatusFilter::All, LeadView::All).apply(&leads);
        assert_eq!(ids(&by_company), vec!["l4"]);

        let by_email = LeadFilter::new("l3@EXAMPLE", StatusFilter::All, LeadView::All).apply(&leads);
        assert_eq!(ids(&by_email), vec!["l3"]);
    }

    #[test]
    fn test_views() {
        let leads = sample();
        let cases = [
            (LeadView::Urgent, vec!["l1", "l2", "l5"]),
            (LeadView::New, vec!["l1"]),
            (LeadView::Win, vec!["l4"]),
            (LeadView::Loss, vec!["l5"]),
        ];
        for (view, expected) in cases {
            let out = LeadFilter::new("", StatusFilter::All, view).apply(&leads);
            assert_eq!(ids(&out), expected, "view {:?}", view);
        }
    }

    #[test]
    fn test_predicates_are_anded() {
        let leads = sample();
        let filter = LeadFilter::new(
            "a",
            StatusFilter::Only(LeadStatus::Proposal),
            LeadView::Urgent,
        );
        assert_eq!(ids(&filter.apply(&leads)), vec!["l2"]);

        let none = LeadFilter::new("", StatusFilter::Only(LeadStatus::Closed), LeadView::Urgent);
        assert!(none.apply(&leads).is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let leads = sample();
        let filter = LeadFilter::new("e", StatusFilter::All, LeadView::Urgent);
        let once = filter.apply_owned(&leads);
        let twice = filter.apply_owned(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_predicate_order_does_not_matter() {
        let leads = sample();
        let text = LeadFilter::new("r", StatusFilter::All, LeadView::All);
        let status = LeadFilter::new("", StatusFilter::Only(LeadStatus::New), LeadView::All);
        let view = LeadFilter::new("", StatusFilter::All, LeadView::Urgent);

        let a = view.apply_owned(&status.apply_owned(&text.apply_owned(&leads)));
        let b = text.apply_owned(&view.apply_owned(&status.apply_owned(&leads)));
        let combined = LeadFilter::new("r", StatusFilter::Only(LeadStatus::New), LeadView::Urgent)
            .apply_owned(&leads);
        assert_eq!(a, b);
        assert_eq!(a, combined);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "closed".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(LeadStatus::Closed)
        );
        assert!("won".parse::<StatusFilter>().is_err());
        assert!("mine".parse::<LeadView>().is_err());
    }
}
