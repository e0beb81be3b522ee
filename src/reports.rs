//! Report View
//!
//! Filtering, sorting, paging and summary statistics over the events of a
//! task report. Everything here works on an already fetched
//! [`TaskReport`]; fetching lives in [`TasksService::report`].
//!
//! [`TasksService::report`]: crate::services::TasksService::report

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::api::dto::{ReportEvent, TaskReport};

pub const EVENTS_PER_PAGE: usize = 10;
pub const MAX_VISIBLE_PAGES: usize = 5;

/// Summary over all events, regardless of filters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStats {
    pub total_events: usize,
    pub unique_clients: usize,
    pub positive_reactions: usize,
    pub negative_reactions: usize,
    pub error_count: usize,
    /// Percentage of events without an error
    pub success_rate: f64,
}

impl ReportStats {
    pub fn from_events(events: &[ReportEvent]) -> Self {
        let total_events = events.len();
        let palette_count = |name: &str| {
            events
                .iter()
                .filter(|e| e.palette.as_deref() == Some(name))
                .count()
        };
        let error_count = events.iter().filter(|e| e.has_error()).count();
        let success_rate = if total_events > 0 {
            (total_events - error_count) as f64 / total_events as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_events,
            unique_clients: events
                .iter()
                .map(|e| e.client.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            positive_reactions: palette_count("positive"),
            negative_reactions: palette_count("negative"),
            error_count,
            success_rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Substring of the client (account phone number)
    pub client: Option<String>,
    /// Exact palette name
    pub palette: Option<String>,
    /// `Some(true)`: only failed events, `Some(false)`: only successful ones
    pub has_error: Option<bool>,
    /// Inclusive from midnight UTC
    pub start_date: Option<NaiveDate>,
    /// Inclusive through 23:59:59.999 UTC
    pub end_date: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn matches(&self, event: &ReportEvent) -> bool {
        if let Some(client) = self.client.as_deref().filter(|c| !c.is_empty()) {
            if !event.client.contains(client) {
                return false;
            }
        }
        if let Some(palette) = self.palette.as_deref().filter(|p| !p.is_empty()) {
            if event.palette.as_deref() != Some(palette) {
                return false;
            }
        }
        if let Some(wanted) = self.has_error {
            if event.has_error() != wanted {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.datetime < start_of_day(start) {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.datetime > end_of_day(end) {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn start_of_day(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn end_of_day(date: NaiveDate) -> i64 {
    start_of_day(date) + 24 * 3600 * 1000 - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Datetime,
    Client,
    Palette,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "datetime" | "date" | "time" => Ok(SortField::Datetime),
            "client" => Ok(SortField::Client),
            "palette" => Ok(SortField::Palette),
            other => Err(format!("Unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filtered, sorted and paged view of one report
#[derive(Debug, Clone)]
pub struct ReportView {
    events: Vec<ReportEvent>,
    stats: ReportStats,
    filter: ReportFilter,
    visible: Vec<usize>,
    sort_by: SortField,
    direction: SortDirection,
    page: usize,
}

impl ReportView {
    pub fn new(report: TaskReport) -> Self {
        let stats = ReportStats::from_events(&report.report);
        let mut view = Self {
            events: report.report,
            stats,
            filter: ReportFilter::default(),
            visible: Vec::new(),
            sort_by: SortField::default(),
            direction: SortDirection::default(),
            page: 1,
        };
        view.refresh();
        view
    }

    pub fn stats(&self) -> &ReportStats {
        &self.stats
    }

    pub fn filter(&self) -> &ReportFilter {
        &self.filter
    }

    pub fn sort(&self) -> (SortField, SortDirection) {
        (self.sort_by, self.direction)
    }

    /// Sorted distinct clients across all events
    pub fn clients(&self) -> Vec<&str> {
        self.events
            .iter()
            .map(|e| e.client.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Apply a new filter; paging restarts at the first page
    pub fn set_filter(&mut self, filter: ReportFilter) {
        self.filter = filter;
        self.refresh();
    }

    pub fn clear_filter(&mut self) {
        self.set_filter(ReportFilter::default());
    }

    /// Sort by `field`: the same field flips direction, a new one starts
    /// descending
    pub fn toggle_sort(&mut self, field: SortField) {
        if self.sort_by == field {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.sort_by = field;
            self.direction = SortDirection::Desc;
        }
        self.sort_visible();
    }

    pub fn set_sort(&mut self, field: SortField, direction: SortDirection) {
        self.sort_by = field;
        self.direction = direction;
        self.sort_visible();
    }

    /// Events passing the filter, in sort order
    pub fn filtered(&self) -> impl Iterator<Item = &ReportEvent> {
        self.visible.iter().map(|&i| &self.events[i])
    }

    pub fn filtered_len(&self) -> usize {
        self.visible.len()
    }

    pub fn total_pages(&self) -> usize {
        self.visible.len().div_ceil(EVENTS_PER_PAGE)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_events(&self) -> Vec<&ReportEvent> {
        self.filtered()
            .skip((self.page - 1) * EVENTS_PER_PAGE)
            .take(EVENTS_PER_PAGE)
            .collect()
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.page > 1 && self.go_to_page(self.page - 1)
    }

    /// Out-of-range pages are ignored
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page >= 1 && page <= self.total_pages() {
            self.page = page;
            true
        } else {
            false
        }
    }

    /// Page numbers to show around the current one
    pub fn visible_pages(&self) -> Vec<usize> {
        let total = self.total_pages();
        if total == 0 {
            return Vec::new();
        }
        let mut start = self.page.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
        let end = (start + MAX_VISIBLE_PAGES - 1).min(total);
        if end + 1 - start < MAX_VISIBLE_PAGES {
            start = (end + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
        }
        (start..=end).collect()
    }

    fn refresh(&mut self) {
        self.visible = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| self.filter.matches(e))
            .map(|(i, _)| i)
            .collect();
        self.page = 1;
        self.sort_visible();
    }

    fn sort_visible(&mut self) {
        let events = &self.events;
        let field = self.sort_by;
        let direction = self.direction;
        self.visible.sort_by(|&a, &b| {
            let ordering = compare(&events[a], &events[b], field);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

fn compare(a: &ReportEvent, b: &ReportEvent, field: SortField) -> Ordering {
    match field {
        SortField::Datetime => a.datetime.cmp(&b.datetime),
        SortField::Client => a.client.cmp(&b.client),
        SortField::Palette => a.palette.cmp(&b.palette),
    }
}

/// `MMM dd, yyyy HH:mm:ss` in UTC; empty for missing timestamps
pub fn format_timestamp(millis: i64) -> String {
    if millis <= 0 {
        return String::new();
    }
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%b %d, %Y %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Pretty-print North American numbers; anything else is returned as is
pub fn format_phone(phone: &str) -> String {
    let ascii = phone.is_ascii();
    if ascii && phone.len() == 10 {
        format!("({}) {}-{}", &phone[..3], &phone[3..6], &phone[6..])
    } else if ascii && phone.len() == 12 && phone.starts_with("+1") {
        format!(
            "{} ({}) {}-{}",
            &phone[..2],
            &phone[2..5],
            &phone[5..8],
            &phone[8..]
        )
    } else {
        phone.to_string()
    }
}
