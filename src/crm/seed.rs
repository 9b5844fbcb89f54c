//! Demo data set: one admin account, two roster members, seven leads and
//! four tasks.

use anyhow::{Context, Result};
use fera_common::{
    ActivityKind, LeadDraft, LeadStatus, Notification, NotificationKind, Priority, TaskDraft,
    TaskStatus,
};

use super::auth::hash_password;
use super::db::{CrmDb, NewActivity};

pub const DEMO_EMAIL: &str = "alex.silva@fera.io";
pub const DEMO_PASSWORD: &str = "fera-demo";
pub const DEMO_NAME: &str = "Alexandre Silva";

const ROSTER: [(&str, &str, &str); 2] = [
    ("Patrícia Potes", "patricia.potes@fera.io", "sales"),
    ("Tainá Moura", "taina.moura@fera.io", "sales"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub account_id: String,
    pub email: String,
    pub leads: usize,
    pub tasks: usize,
    pub members: usize,
    /// True when the demo account already held data and nothing was written.
    pub skipped: bool,
    /// The demo account was found rather than created, so its password
    /// was left as it was.
    pub account_existed: bool,
}

struct DemoLead {
    name: &'static str,
    company: &'static str,
    email: &'static str,
    phone: &'static str,
    status: LeadStatus,
    value: f64,
    last_interaction: &'static str,
    priority: Priority,
    owner: &'static str,
    tags: &'static [&'static str],
    /// Newest first.
    history: &'static [(ActivityKind, &'static str, &'static str, &'static str)],
}

const DEMO_LEADS: [DemoLead; 7] = [
    DemoLead {
        name: "Sarah Costa",
        company: "Skynet Systems",
        email: "sarah@skynet.com",
        phone: "(11) 99999-1234",
        status: LeadStatus::New,
        value: 12_500.0,
        last_interaction: "2 hours ago",
        priority: Priority::High,
        owner: "Alexandre Silva",
        tags: &["Technology", "Enterprise"],
        history: &[
            (
                ActivityKind::Note,
                "Initial contact via LinkedIn.",
                "25/10/2023 10:00",
                "Alexandre Silva",
            ),
            (
                ActivityKind::StatusChange,
                "Status set to New",
                "25/10/2023 09:55",
                "System",
            ),
        ],
    },
    DemoLead {
        name: "João Andrade",
        company: "MetaCortex S.A.",
        email: "joao@metacortex.com",
        phone: "(11) 98888-7777",
        status: LeadStatus::Proposal,
        value: 45_000.0,
        last_interaction: "1 day ago",
        priority: Priority::High,
        owner: "Tainá Moura",
        tags: &["Software", "Referral"],
        history: &[
            (
                ActivityKind::Email,
                "Proposal v2.0 sent",
                "24/10/2023 14:00",
                "Tainá Moura",
            ),
            (
                ActivityKind::Meeting,
                "Discovery meeting with the CTO.",
                "22/10/2023 11:00",
                "Tainá Moura",
            ),
        ],
    },
    DemoLead {
        name: "Eliana Ribeiro",
        company: "Weyland Logistics",
        email: "eliana@weyland.com",
        phone: "(21) 97777-6666",
        status: LeadStatus::Contacted,
        value: 8_000.0,
        last_interaction: "3 days ago",
        priority: Priority::Medium,
        owner: "Alexandre Silva",
        tags: &["Logistics", "Q4"],
        history: &[(
            ActivityKind::Call,
            "Discussed shipping requirements.",
            "20/10/2023 16:30",
            "Alexandre Silva",
        )],
    },
    DemoLead {
        name: "Antônio Stark",
        company: "Stark Industries",
        email: "tony@stark.com",
        phone: "(11) 91111-2222",
        status: LeadStatus::Negotiation,
        value: 150_000.0,
        last_interaction: "5 hours ago",
        priority: Priority::High,
        owner: "Patrícia Potes",
        tags: &["VIP", "Defense"],
        history: &[(
            ActivityKind::Note,
            "Client asked for a 5% discount on the bulk order.",
            "26/10/2023 09:15",
            "Patrícia Potes",
        )],
    },
    DemoLead {
        name: "Bruno Wayne",
        company: "Wayne Enterprises",
        email: "bruce@wayne.com",
        phone: "(11) 92222-3333",
        status: LeadStatus::Closed,
        value: 85_000.0,
        last_interaction: "1 week ago",
        priority: Priority::Low,
        owner: "Alfredo P.",
        tags: &["Finance", "Legacy"],
        history: &[(
            ActivityKind::StatusChange,
            "Deal closed and won!",
            "15/10/2023 17:00",
            "Alfredo P.",
        )],
    },
    DemoLead {
        name: "Diana Prince",
        company: "Themyscira Arts",
        email: "diana@amazon.com",
        phone: "(61) 93333-4444",
        status: LeadStatus::New,
        value: 5_000.0,
        last_interaction: "Just now",
        priority: Priority::Medium,
        owner: "Estevão T.",
        tags: &["Arts", "NGO"],
        history: &[],
    },
    DemoLead {
        name: "Walter Branco",
        company: "Gray Matter",
        email: "heisenberg@chemistry.com",
        phone: "(51) 94444-5555",
        status: LeadStatus::Contacted,
        value: 22_000.0,
        last_interaction: "2 days ago",
        priority: Priority::High,
        owner: "Jesse P.",
        tags: &["Chemistry"],
        history: &[(
            ActivityKind::Email,
            "Product catalog sent.",
            "23/10/2023 13:00",
            "Jesse P.",
        )],
    },
];

fn demo_tasks() -> Vec<TaskDraft> {
    let task = |title: &str, description: &str, due: &str, status, priority, who: &str| TaskDraft {
        title: title.to_string(),
        description: Some(description.to_string()),
        due_date: due.to_string(),
        status,
        priority,
        assigned_to: who.to_string(),
    };
    vec![
        task(
            "Prepare Q3 report",
            "Compile sales figures for the board meeting.",
            "15/11/2023",
            TaskStatus::InProgress,
            Priority::High,
            "Alexandre Silva",
        ),
        task(
            "Follow up with Stark Industries",
            "Send the updated version of the contract.",
            "12/11/2023",
            TaskStatus::Pending,
            Priority::High,
            "Patrícia Potes",
        ),
        task(
            "Clean up CRM contacts",
            "Remove duplicate entries.",
            "20/11/2023",
            TaskStatus::Completed,
            Priority::Low,
            "Intern",
        ),
        task(
            "Schedule Skynet demo",
            "Agree on a time slot with Sarah.",
            "16/11/2023",
            TaskStatus::Pending,
            Priority::Medium,
            "Alexandre Silva",
        ),
    ]
}

/// Notifications every new session starts with.
pub fn demo_notifications() -> Vec<Notification> {
    vec![
        Notification {
            id: "n1".into(),
            title: "New lead assigned".into(),
            message: "You were assigned to the lead Sarah Costa".into(),
            time: "10 min ago".into(),
            read: false,
            kind: NotificationKind::Info,
        },
        Notification {
            id: "n2".into(),
            title: "Task overdue".into(),
            message: "Follow-up with Stark Industries was due yesterday".into(),
            time: "2 hours ago".into(),
            read: false,
            kind: NotificationKind::Alert,
        },
        Notification {
            id: "n3".into(),
            title: "Deal closed".into(),
            message: "Deal with Bruno Wayne marked as won".into(),
            time: "1 day ago".into(),
            read: true,
            kind: NotificationKind::Success,
        },
    ]
}

/// Load the demo data set. Idempotent: an existing demo account that
/// already owns leads is left untouched. `password` only applies when the
/// demo account is created.
pub fn seed_demo(db: &CrmDb, password: &str) -> Result<SeedReport> {
    let (account, account_existed) = match db.find_profile_by_email(DEMO_EMAIL)? {
        Some(profile) => (profile, true),
        None => {
            let hash = hash_password(password)?;
            let profile = db
                .create_profile(DEMO_EMAIL, Some(DEMO_NAME), Some("admin"), &hash)
                .context("Failed to create demo account")?;
            (profile, false)
        }
    };

    if !db.list_leads(&account.id)?.is_empty() {
        return Ok(SeedReport {
            account_id: account.id,
            email: account.email,
            leads: 0,
            tasks: 0,
            members: 0,
            skipped: true,
            account_existed,
        });
    }

    let mut members = 0;
    for (name, email, role) in ROSTER {
        if db.find_profile_by_email(email)?.is_none() {
            // No password: roster entries cannot sign in.
            db.create_profile(email, Some(name), Some(role), "")
                .with_context(|| format!("Failed to create roster member {}", email))?;
            members += 1;
        }
    }

    // Listing is newest first, so insert in reverse to keep the demo order.
    for demo in DEMO_LEADS.iter().rev() {
        let draft = LeadDraft {
            name: demo.name.to_string(),
            company: demo.company.to_string(),
            email: demo.email.to_string(),
            phone: demo.phone.to_string(),
            status: demo.status,
            value: demo.value,
            priority: demo.priority,
            owner: Some(demo.owner.to_string()),
            tags: demo.tags.iter().map(|t| t.to_string()).collect(),
        };
        let lead = db.create_lead(
            &account.id,
            &draft,
            demo.owner,
            demo.last_interaction,
            None,
        )?;
        for (kind, content, date, user) in demo.history.iter().rev() {
            let activity = NewActivity {
                kind: *kind,
                content: content.to_string(),
                date: date.to_string(),
                user: user.to_string(),
            };
            db.add_activity(&account.id, &lead.id, &activity, demo.last_interaction)?;
        }
    }

    let tasks = demo_tasks();
    for task in tasks.iter().rev() {
        db.create_task(&account.id, task)?;
    }

    Ok(SeedReport {
        account_id: account.id,
        email: account.email,
        leads: DEMO_LEADS.len(),
        tasks: tasks.len(),
        members,
        skipped: false,
        account_existed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fera_common::metrics;

    #[test]
    fn test_seed_loads_demo_set_in_order() -> Result<()> {
        let db = CrmDb::new_in_memory()?;
        let report = seed_demo(&db, DEMO_PASSWORD)?;
        assert!(!report.skipped);
        assert_eq!(report.leads, 7);
        assert_eq!(report.tasks, 4);
        assert_eq!(report.members, 2);

        let leads = db.list_leads(&report.account_id)?;
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names[0], "Sarah Costa");
        assert_eq!(names[6], "Walter Branco");

        let sarah = &leads[0];
        assert_eq!(sarah.history.len(), 2);
        assert_eq!(sarah.history[0].content, "Initial contact via LinkedIn.");
        assert_eq!(sarah.last_interaction, "2 hours ago");
        assert_eq!(sarah.score(), 47.5);

        let tasks = db.list_tasks(&report.account_id)?;
        assert_eq!(tasks[0].title, "Prepare Q3 report");
        assert_eq!(db.list_profiles()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_seed_is_idempotent() -> Result<()> {
        let db = CrmDb::new_in_memory()?;
        let first = seed_demo(&db, DEMO_PASSWORD)?;
        let second = seed_demo(&db, DEMO_PASSWORD)?;
        assert!(!first.account_existed);
        assert!(second.skipped);
        assert!(second.account_existed);
        assert_eq!(first.account_id, second.account_id);
        assert_eq!(db.list_leads(&first.account_id)?.len(), 7);
        Ok(())
    }

    #[test]
    fn test_reseed_keeps_existing_password() -> Result<()> {
        let db = CrmDb::new_in_memory()?;
        let first = seed_demo(&db, DEMO_PASSWORD)?;
        let hash = db.find_profile_by_email(DEMO_EMAIL)?.expect("demo").password_hash;

        let ids: Vec<String> = db
            .list_leads(&first.account_id)?
            .into_iter()
            .map(|l| l.id)
            .collect();
        db.delete_leads(&first.account_id, &ids)?;

        let second = seed_demo(&db, "another-password")?;
        assert!(!second.skipped);
        assert!(second.account_existed);
        assert_eq!(second.leads, 7);
        let after = db.find_profile_by_email(DEMO_EMAIL)?.expect("demo").password_hash;
        assert_eq!(after, hash);
        Ok(())
    }

    #[test]
    fn test_dashboard_on_demo_data() -> Result<()> {
        let db = CrmDb::new_in_memory()?;
        let report = seed_demo(&db, DEMO_PASSWORD)?;
        let leads = db.list_leads(&report.account_id)?;
        let stats = metrics::dashboard(&leads, metrics::DEFAULT_MONTHLY_GOAL);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.revenue, 85_000.0);
        assert_eq!(stats.pipeline, 242_500.0);
        assert_eq!(stats.average_deal, 85_000.0);
        assert_eq!(stats.goal_progress, 85.0);
        Ok(())
    }

    #[test]
    fn test_demo_notifications() {
        let n = demo_notifications();
        assert_eq!(n.len(), 3);
        assert_eq!(n.iter().filter(|n| !n.read).count(), 2);
    }
}
