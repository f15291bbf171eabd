//! Kanban grouping of ideas by status

use crate::model::{Idea, Status};
use serde::Serialize;
use std::cmp::Reverse;

/// One status column
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub status: Status,
    pub ideas: Vec<Idea>,
}

/// Every status column in pipeline order, including empty ones
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    /// Group ideas; each column is ordered by score, then newest first
    pub fn from_ideas(ideas: impl IntoIterator<Item = Idea>) -> Self {
        let mut columns: Vec<Column> = Status::ALL
            .iter()
            .map(|&status| Column {
                status,
                ideas: Vec::new(),
            })
            .collect();

        for idea in ideas {
            if let Some(column) = columns.iter_mut().find(|c| c.status == idea.status) {
                column.ideas.push(idea);
            }
        }
        for column in &mut columns {
            column
                .ideas
                .sort_by_key(|i| (Reverse(i.score), Reverse(i.created_at), Reverse(i.id)));
        }

        Self { columns }
    }

    pub fn column(&self, status: Status) -> Option<&Column> {
        self.columns.iter().find(|c| c.status == status)
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.ideas.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use chrono::DateTime;

    fn idea(id: i32, status: Status, score: i32, created_at: &str) -> Idea {
        let created_at = DateTime::parse_from_rfc3339(created_at).unwrap();
        Idea {
            id,
            title: format!("Idea {}", id),
            problem: String::new(),
            desired_outcome: String::new(),
            category: "Other".to_string(),
            department: "Operations".to_string(),
            impact_type: None,
            automation_fit: None,
            status,
            score,
            author: Author {
                id: "a".to_string(),
                name: "A".to_string(),
                email: None,
                photo: None,
            },
            attachments: vec![],
            process_frequency: None,
            time_spent_hours_per_week: None,
            estimated_benefit: None,
            review_notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_columns_in_pipeline_order() {
        let board = Board::from_ideas(vec![]);
        let order: Vec<Status> = board.columns.iter().map(|c| c.status).collect();
        assert_eq!(
            order,
            vec![
                Status::Submitted,
                Status::InProgress,
                Status::Approved,
                Status::Rejected,
                Status::Done
            ]
        );
        assert!(board.is_empty());
    }

    #[test]
    fn test_column_sorted_by_score_then_newest() {
        let board = Board::from_ideas(vec![
            idea(1, Status::Submitted, 2, "2024-03-01T09:00:00+00:00"),
            idea(2, Status::Submitted, 5, "2024-03-02T09:00:00+00:00"),
            idea(3, Status::Submitted, 2, "2024-03-05T09:00:00+00:00"),
            idea(4, Status::Done, -1, "2024-03-03T09:00:00+00:00"),
        ]);
        let ids: Vec<i32> = board
            .column(Status::Submitted)
            .unwrap()
            .ideas
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(board.column(Status::Done).unwrap().ideas.len(), 1);
        assert_eq!(board.len(), 4);
    }
}
