//! Board views: leads partitioned by pipeline stage, tasks by status.

use serde::{Deserialize, Serialize};

use crate::models::{Lead, LeadStatus, Task, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KanbanColumn<L> {
    pub status: LeadStatus,
    pub title: String,
    pub leads: Vec<L>,
    pub count: usize,
    pub total_value: f64,
}

/// Partition leads into one column per status, in board order. Columns are
/// always present even when empty; leads keep their source order.
pub fn build_board<L: AsRef<Lead> + Clone>(leads: &[L]) -> Vec<KanbanColumn<L>> {
    LeadStatus::ALL
        .iter()
        .map(|status| {
            let col_leads: Vec<L> = leads
                .iter()
                .filter(|l| l.as_ref().status == *status)
                .cloned()
                .collect();
            let total_value = col_leads.iter().map(|l| l.as_ref().value).sum();
            KanbanColumn {
                status: *status,
                title: status.label().to_string(),
                count: col_leads.len(),
                leads: col_leads,
                total_value,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
    pub count: usize,
}

pub fn build_task_board(tasks: &[Task]) -> Vec<TaskColumn> {
    TaskStatus::ALL
        .iter()
        .map(|status| {
            let col: Vec<Task> = tasks.iter().filter(|t| t.status == *status).cloned().collect();
            TaskColumn {
                status: *status,
                count: col.len(),
                tasks: col,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use std::collections::HashSet;

    fn lead(id: &str, status: LeadStatus, value: f64) -> Lead {
        Lead {
            id: id.into(),
            name: id.into(),
            company: String::new(),
            email: String::new(),
            phone: String::new(),
            status,
            value,
            last_interaction: String::new(),
            priority: Priority::Low,
            owner: String::new(),
            tags: vec![],
            history: vec![],
            created_at: String::new(),
        }
    }

    #[test]
    fn test_board_always_has_all_columns() {
        let board = build_board::<Lead>(&[]);
        assert_eq!(board.len(), 6);
        let statuses: Vec<LeadStatus> = board.iter().map(|c| c.status).collect();
        assert_eq!(statuses, LeadStatus::ALL.to_vec());
        assert!(board.iter().all(|c| c.count == 0 && c.total_value == 0.0));
    }

    #[test]
    fn test_board_counts_and_sums() {
        let leads = vec![
            lead("a", LeadStatus::New, 1000.0),
            lead("b", LeadStatus::Closed, 85000.0),
            lead("c", LeadStatus::New, 5000.0),
            lead("d", LeadStatus::Negotiation, 150000.0),
        ];
        let board = build_board(&leads);
        let new_col = &board[0];
        assert_eq!(new_col.count, 2);
        assert_eq!(new_col.total_value, 6000.0);
        assert_eq!(new_col.leads[0].id, "a");
        assert_eq!(new_col.leads[1].id, "c");
        assert_eq!(board[3].total_value, 150000.0);
        assert_eq!(board[4].count, 1);
        assert_eq!(board[5].count, 0);
    }

    #[test]
    fn test_board_is_a_partition() {
        let leads = vec![
            lead("a", LeadStatus::New, 1.0),
            lead("b", LeadStatus::Lost, 2.0),
            lead("c", LeadStatus::Proposal, 3.0),
            lead("d", LeadStatus::Contacted, 4.0),
            lead("e", LeadStatus::Lost, 5.0),
        ];
        let board = build_board(&leads);
        let total: usize = board.iter().map(|c| c.count).sum();
        assert_eq!(total, leads.len());

        let seen: HashSet<String> = board
            .iter()
            .flat_map(|c| c.leads.iter().map(|l| l.id.clone()))
            .collect();
        assert_eq!(seen.len(), leads.len());
        for c in &board {
            assert!(c.leads.iter().all(|l| l.status == c.status));
        }
    }

    #[test]
    fn test_task_board() {
        let task = |id: &str, status| Task {
            id: id.into(),
            title: id.into(),
            description: None,
            due_date: String::new(),
            status,
            priority: Priority::Low,
            assigned_to: String::new(),
            created_at: String::new(),
        };
        let tasks = vec![
            task("t1", TaskStatus::InProgress),
            task("t2", TaskStatus::Pending),
            task("t3", TaskStatus::Pending),
        ];
        let board = build_task_board(&tasks);
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].count, 2);
        assert_eq!(board[1].count, 1);
        assert_eq!(board[2].count, 0);
    }
}
