//! Распределение списанных часов по типам работ

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::types::{
    HoursBucket, HoursDistributionItem, Project, ProjectId, ProjectStatus, TimeEntry, UserId,
};

/// Часы по корзинам: коммерция, пресейл, внутренние, прочее
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketHours {
    pub commercial: f64,
    pub presale: f64,
    pub internal: f64,
    pub other: f64,
}

impl BucketHours {
    pub fn add(&mut self, bucket: HoursBucket, hours: f64) {
        match bucket {
            HoursBucket::Commercial => self.commercial += hours,
            HoursBucket::Presale => self.presale += hours,
            HoursBucket::Internal => self.internal += hours,
            HoursBucket::Other => self.other += hours,
        }
    }

    pub fn total(&self) -> f64 {
        self.commercial + self.presale + self.internal + self.other
    }

    /// Непустые корзины с долями в процентах
    pub fn into_items(self) -> Vec<HoursDistributionItem> {
        let total = self.total();
        [
            (HoursBucket::Commercial, self.commercial),
            (HoursBucket::Presale, self.presale),
            (HoursBucket::Internal, self.internal),
            (HoursBucket::Other, self.other),
        ]
        .into_iter()
        .filter(|(_, hours)| *hours > 0.0)
        .map(|(kind, hours)| HoursDistributionItem {
            kind,
            hours,
            percentage: if total > 0.0 { hours / total * 100.0 } else { 0.0 },
        })
        .collect()
    }
}

/// Классификатор записей времени по статусу проекта
pub struct HoursClassifier {
    statuses: HashMap<ProjectId, ProjectStatus>,
}

impl HoursClassifier {
    pub fn new(projects: &[Project]) -> Self {
        Self {
            statuses: projects.iter().map(|p| (p.id, p.status)).collect(),
        }
    }

    /// Статус берётся из проекта, при его отсутствии из самой записи
    pub fn status_of(&self, entry: &TimeEntry) -> Option<ProjectStatus> {
        self.statuses
            .get(&entry.project_id)
            .copied()
            .or(entry.project_status)
    }

    pub fn bucket_of(&self, entry: &TimeEntry) -> HoursBucket {
        self.status_of(entry).map_or(HoursBucket::Other, ProjectStatus::bucket)
    }

    /// Суммы по корзинам для записей периода; `users = None` означает всех
    pub fn bucket_hours(
        &self,
        entries: &[TimeEntry],
        start: NaiveDate,
        end: NaiveDate,
        users: Option<&[UserId]>,
    ) -> BucketHours {
        let mut hours = BucketHours::default();
        for entry in entries {
            if entry.date < start || entry.date > end {
                continue;
            }
            if let Some(users) = users {
                if !users.contains(&entry.user_id) {
                    continue;
                }
            }
            hours.add(self.bucket_of(entry), entry.hours);
        }
        hours
    }

    pub fn distribution(
        &self,
        entries: &[TimeEntry],
        start: NaiveDate,
        end: NaiveDate,
        users: Option<&[UserId]>,
    ) -> Vec<HoursDistributionItem> {
        self.bucket_hours(entries, start, end, users).into_items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn project(id: ProjectId, status: ProjectStatus) -> Project {
        Project {
            id,
            name: None,
            status,
            project_type: None,
            start_date: None,
            end_date: None,
            plans: Vec::new(),
            member_ids: Vec::new(),
        }
    }

    fn entry(id: i64, user_id: UserId, project_id: ProjectId, hours: f64) -> TimeEntry {
        TimeEntry { id, user_id, project_id, date: d(2025, 1, 7), hours, project_status: None }
    }

    #[test]
    fn buckets_sum_to_logged_hours() {
        let projects = vec![
            project(1, ProjectStatus::Active),
            project(2, ProjectStatus::Presale),
            project(3, ProjectStatus::Internal),
            project(4, ProjectStatus::OnHold),
        ];
        let entries = vec![
            entry(1, 1, 1, 6.0),
            entry(2, 1, 2, 1.5),
            entry(3, 1, 3, 2.0),
            entry(4, 1, 4, 0.5),
            entry(5, 1, 99, 1.0),
            entry(6, 2, 1, 8.0),
        ];
        let classifier = HoursClassifier::new(&projects);
        let items =
            classifier.distribution(&entries, d(2025, 1, 1), d(2025, 1, 31), Some(&[1][..]));

        let total: f64 = items.iter().map(|i| i.hours).sum();
        assert_eq!(total, 11.0);
        let pct: f64 = items.iter().map(|i| i.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);

        let other = items.iter().find(|i| i.kind == HoursBucket::Other).unwrap();
        assert_eq!(other.hours, 1.5);
    }

    #[test]
    fn empty_buckets_are_omitted() {
        let classifier = HoursClassifier::new(&[project(1, ProjectStatus::Active)]);
        let entries = [entry(1, 1, 1, 4.0)];
        let items = classifier.distribution(&entries, d(2025, 1, 1), d(2025, 1, 31), None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, HoursBucket::Commercial);
        assert_eq!(items[0].percentage, 100.0);
        assert!(classifier.distribution(&[], d(2025, 1, 1), d(2025, 1, 31), None).is_empty());
    }
}
