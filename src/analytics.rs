//! Dashboard aggregates over the idea feed

use crate::model::{AutomationFit, Idea, ImpactType, Status};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Count for one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub count: usize,
}

/// Submissions in one calendar month (`YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    /// Done or Approved
    pub completed: usize,
    pub in_progress: usize,
    /// Mean score rounded to one decimal
    pub average_score: f64,
    pub by_status: Vec<Bucket>,
    pub by_category: Vec<Bucket>,
    pub by_automation_fit: Vec<Bucket>,
    pub by_impact_type: Vec<Bucket>,
    pub by_department: Vec<Bucket>,
    pub timeline: Vec<MonthCount>,
}

impl Summary {
    pub fn compute(ideas: &[Idea]) -> Self {
        let total = ideas.len();
        let completed = ideas
            .iter()
            .filter(|i| matches!(i.status, Status::Done | Status::Approved))
            .count();
        let in_progress = ideas.iter().filter(|i| i.status == Status::InProgress).count();

        let average_score = if total == 0 {
            0.0
        } else {
            let sum: i64 = ideas.iter().map(|i| i64::from(i.score)).sum();
            (sum as f64 / total as f64 * 10.0).round() / 10.0
        };

        let mut timeline: BTreeMap<String, usize> = BTreeMap::new();
        for idea in ideas {
            *timeline
                .entry(idea.created_at.format("%Y-%m").to_string())
                .or_default() += 1;
        }

        Self {
            total,
            completed,
            in_progress,
            average_score,
            by_status: group(ideas, |i| i.status.as_str()),
            by_category: group(ideas, |i| i.category.as_str()),
            by_automation_fit: group(ideas, |i| {
                i.automation_fit.unwrap_or(AutomationFit::Unsure).as_str()
            }),
            by_impact_type: group(ideas, |i| i.impact_type.unwrap_or(ImpactType::Other).as_str()),
            by_department: group(ideas, |i| i.department.as_str()),
            timeline: timeline
                .into_iter()
                .map(|(month, count)| MonthCount { month, count })
                .collect(),
        }
    }
}

fn group<'a>(ideas: &'a [Idea], key: impl Fn(&'a Idea) -> &'a str) -> Vec<Bucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for idea in ideas {
        *counts.entry(key(idea)).or_default() += 1;
    }
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(name, count)| Bucket {
            name: name.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    buckets
}
