//! Windowing and pagination over a chronologically sorted timeline.

use serde::{Deserialize, Serialize};

use crate::models::TimelinePoint;
use crate::timeframe::{days_to_seconds, Timeframe};

pub const MAX_PAGE_LIMIT: usize = 5_000;
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// Range selection for one request.
///
/// An explicit bound (either side) takes precedence over the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub window_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Windowed {
    pub points: Vec<TimelinePoint>,
    /// True only when a trailing day window was actually applied
    pub window_applied: bool,
}

pub fn apply_window(points: Vec<TimelinePoint>, timeframe: Timeframe, request: &WindowRequest) -> Windowed {
    if request.start.is_some() || request.end.is_some() {
        let start = request.start.unwrap_or(i64::MIN);
        let end = request.end.unwrap_or(i64::MAX);
        return Windowed {
            points: points
                .into_iter()
                .filter(|p| p.time >= start && p.time <= end)
                .collect(),
            window_applied: false,
        };
    }

    // an explicit non-positive window disables trailing windowing
    let window_days = match request.window_days {
        Some(days) => Some(days).filter(|d| *d > 0),
        None => timeframe.default_window_days(),
    };

    let (Some(days), Some(latest)) = (window_days, points.last().map(|p| p.time)) else {
        return Windowed {
            points,
            window_applied: false,
        };
    };

    let window_start = latest.saturating_sub(days_to_seconds(days));
    Windowed {
        points: points.into_iter().filter(|p| p.time >= window_start).collect(),
        window_applied: true,
    }
}

/// One page of a timeline, newest page first
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub points: Vec<TimelinePoint>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Reverse-chronological paging over ascending points.
///
/// Page 1 holds the most recent `limit` points, page 2 the `limit` before
/// those, and so on. Each page is itself ascending.
pub fn paginate(points: &[TimelinePoint], page: usize, limit: usize) -> Page {
    let total = points.len();
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);

    let end_index = total.saturating_sub((page - 1).saturating_mul(limit));
    let start_index = end_index.saturating_sub(limit);

    Page {
        points: points[start_index..end_index].to_vec(),
        page,
        limit,
        total,
        has_more: start_index > 0,
    }
}
