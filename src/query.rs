//! Query shaping: filter -> sort -> paginate -> annotate.
//!
//! Everything in this module is pure and synchronous. List endpoints load
//! their full result set from the repository first, then hand it here to be
//! cut down to one client-facing page with deterministic ordering, count
//! metadata, and navigation links. The API and the server-rendered pages
//! both go through these helpers so the two surfaces can never disagree on
//! what page 3 of a filtered listing contains.

use serde::Serialize;

use crate::models::{Device, SensorData};

// ---

/// Page size used when the caller omits or zeroes `pageSize`.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Normalized 1-based pagination request.
///
/// Zero inputs are clamped rather than rejected: `pageNumber=0` becomes 1
/// and `pageSize=0` becomes [`DEFAULT_PAGE_SIZE`]. Negative values never
/// reach this type because the query parameters parse as `u32` upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_number: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page_number: page_number.unwrap_or(1).max(1),
            page_size: match page_size {
                Some(0) | None => DEFAULT_PAGE_SIZE,
                Some(n) => n,
            },
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ---

/// A follow-up request available from the current result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavLink {
    pub href: String,
    pub rel: &'static str,
    pub method: &'static str,
}

impl NavLink {
    pub fn get(href: String, rel: &'static str) -> Self {
        Self {
            href,
            rel,
            method: "GET",
        }
    }
}

/// One shaped page of a collection, with pagination metadata and links.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub sort_by: &'static str,
    pub sort_descending: bool,
    pub links: Vec<NavLink>,
}

/// Slice an already filtered and sorted collection into one page.
///
/// `total_count` reflects the pre-pagination set; the slice is
/// `skip((page_number-1) * page_size).take(page_size)`, so an out-of-range
/// page yields an empty item list, not an error. `total_pages` uses ceiling
/// division.
pub fn paginate<T>(
    items: Vec<T>,
    page: PageRequest,
    sort_by: &'static str,
    sort_descending: bool,
) -> Page<T> {
    // ---
    let total_count = items.len();
    let total_pages = total_count.div_ceil(page.page_size as usize) as u32;
    let skip = (page.page_number as usize - 1).saturating_mul(page.page_size as usize);

    let items: Vec<T> = items
        .into_iter()
        .skip(skip)
        .take(page.page_size as usize)
        .collect();

    Page {
        items,
        total_count,
        page_number: page.page_number,
        page_size: page.page_size,
        total_pages,
        has_previous_page: page.page_number > 1,
        has_next_page: page.page_number < total_pages,
        sort_by,
        sort_descending,
        links: Vec::new(),
    }
}

impl<T> Page<T> {
    /// Attach self/previous/next links.
    ///
    /// `make_href` maps a page number to a URL reproducing this query at
    /// that page; previous and next only appear when the corresponding
    /// page exists.
    pub fn with_nav_links(mut self, make_href: impl Fn(u32) -> String) -> Self {
        // ---
        self.links.push(NavLink::get(make_href(self.page_number), "self"));
        if self.has_previous_page {
            self.links
                .push(NavLink::get(make_href(self.page_number - 1), "previous"));
        }
        if self.has_next_page {
            self.links
                .push(NavLink::get(make_href(self.page_number + 1), "next"));
        }
        self
    }
}

// ---

/// Whitelisted sort keys for the devices listing. Default: `name`, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSortField {
    #[default]
    Name,
    Status,
    LastSeen,
}

impl DeviceSortField {
    /// Map a caller-supplied field name; anything unrecognized falls back
    /// to the default field instead of erroring.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("status") => Self::Status,
            Some("lastseen") => Self::LastSeen,
            _ => Self::Name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Status => "status",
            Self::LastSeen => "lastseen",
        }
    }
}

/// Whitelisted sort keys for sensor data. Default: `timestamp`, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingSortField {
    #[default]
    Timestamp,
    Value,
    SensorType,
}

impl ReadingSortField {
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("value") => Self::Value,
            Some("sensortype") => Self::SensorType,
            _ => Self::Timestamp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Value => "value",
            Self::SensorType => "sensortype",
        }
    }
}

// ---

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

/// Conjunctive device filters: case-insensitive exact match on status,
/// case-insensitive substring match on location. Empty strings count as
/// absent, matching how blank query parameters behave.
pub fn filter_devices(
    devices: Vec<Device>,
    status: Option<&str>,
    location: Option<&str>,
) -> Vec<Device> {
    // ---
    devices
        .into_iter()
        .filter(|d| match status {
            Some(s) if !s.is_empty() => d.status.as_str().eq_ignore_ascii_case(s),
            _ => true,
        })
        .filter(|d| match location {
            Some(l) if !l.is_empty() => contains_ignore_case(&d.location, l),
            _ => true,
        })
        .collect()
}

/// Optional case-insensitive substring filter on sensor type. The mandatory
/// device id and the time range are applied at the repository.
pub fn filter_readings(readings: Vec<SensorData>, sensor_type: Option<&str>) -> Vec<SensorData> {
    // ---
    readings
        .into_iter()
        .filter(|r| match sensor_type {
            Some(t) if !t.is_empty() => contains_ignore_case(&r.sensor_type, t),
            _ => true,
        })
        .collect()
}

pub fn sort_devices(devices: &mut [Device], field: DeviceSortField, descending: bool) {
    // ---
    devices.sort_by(|a, b| {
        let ord = match field {
            DeviceSortField::Name => a.name.cmp(&b.name),
            DeviceSortField::Status => a.status.as_str().cmp(b.status.as_str()),
            DeviceSortField::LastSeen => a.last_seen.cmp(&b.last_seen),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

pub fn sort_readings(readings: &mut [SensorData], field: ReadingSortField, descending: bool) {
    // ---
    readings.sort_by(|a, b| {
        let ord = match field {
            ReadingSortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            ReadingSortField::Value => a.value.cmp(&b.value),
            ReadingSortField::SensorType => a.sensor_type.cmp(&b.sensor_type),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
