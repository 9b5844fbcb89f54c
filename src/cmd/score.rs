//! Lead score calculator: `fera score`.

use console::style;
use fera_common::{Priority, scoring};

pub fn cmd_score(value: f64, priority: Priority, activities: usize) {
    let score = scoring::score(value, priority, activities);

    println!("Score: {}", style(format_score(score)).bold());
    println!(
        "  value       {:>6}",
        format_score(scoring::value_points(value))
    );
    println!(
        "  priority    {:>6}",
        format_score(scoring::priority_bonus(priority))
    );
    println!(
        "  activities  {:>6}",
        format_score(activities as f64 * scoring::POINTS_PER_ACTIVITY)
    );
}

fn format_score(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{:.1}", points)
    }
}
