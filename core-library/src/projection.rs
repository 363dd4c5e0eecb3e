//! # Aggregation & Projection Engine
//!
//! Pure functions that turn catalog snapshots into sorted, grouped views for
//! display. No I/O happens here; dates are rendered in UTC.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::projection::{project, GroupBy, SortKey};
//!
//! let view = project(items, SortKey::TakenAt, false, GroupBy::TakenMonth);
//! for group in &view.groups {
//!     println!("{} ({} items)", group.label, group.items.len());
//! }
//! ```

use crate::models::{display_name, extension_of, parent_of, DirectoryAggregate, KindMask, MediaItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    SizeBytes,
    #[default]
    ModifiedAt,
    TakenAt,
    Extension,
    Path,
}

/// How consecutive runs of a sorted listing are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroupBy {
    #[default]
    None,
    Folder,
    ModifiedDay,
    ModifiedMonth,
    TakenDay,
    TakenMonth,
    Kind,
    Extension,
}

/// Anything that can be sorted, grouped and labelled by the engine.
pub trait Projectable {
    fn path(&self) -> &str;
    fn name(&self) -> &str;
    fn size_bytes(&self) -> u64;
    fn modified_at(&self) -> i64;
    fn taken_at(&self) -> i64;
    fn kind_mask(&self) -> KindMask;

    /// Lower-cased extension; empty when there is none.
    fn extension(&self) -> String {
        extension_of(self.path())
    }

    /// Folder the entry is listed under.
    fn folder(&self) -> String {
        parent_of(self.path())
    }
}

impl Projectable for MediaItem {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn modified_at(&self) -> i64 {
        self.modified_at
    }

    fn taken_at(&self) -> i64 {
        self.taken_at
    }

    fn kind_mask(&self) -> KindMask {
        KindMask::of(self.kind)
    }

    fn folder(&self) -> String {
        self.parent_path.clone()
    }
}

impl Projectable for DirectoryAggregate {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    fn modified_at(&self) -> i64 {
        self.latest_modified_at
    }

    fn taken_at(&self) -> i64 {
        self.latest_taken_at
    }

    fn kind_mask(&self) -> KindMask {
        self.kind_mask
    }

    // Directory names like "2024.03" are not file extensions.
    fn extension(&self) -> String {
        String::new()
    }
}

/// A labelled run of consecutive entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedGroup<T> {
    pub label: String,
    pub items: Vec<T>,
}

/// Sorted and grouped listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedView<T> {
    pub sort_key: SortKey,
    pub ascending: bool,
    pub group_by: GroupBy,
    pub groups: Vec<ProjectedGroup<T>>,
}

impl<T> ProjectedView<T> {
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.items.is_empty())
    }

    /// Entries in display order with grouping flattened away.
    pub fn flatten(self) -> Vec<T> {
        self.groups.into_iter().flat_map(|g| g.items).collect()
    }
}

/// Sort `items` by `sort_key` (ties by path ascending) and bucket consecutive runs
/// that share a `group_by` key. With [`GroupBy::None`] a non-empty input yields a
/// single unlabeled group.
pub fn project<T: Projectable>(
    mut items: Vec<T>,
    sort_key: SortKey,
    ascending: bool,
    group_by: GroupBy,
) -> ProjectedView<T> {
    items.sort_by(|a, b| compare(a, b, sort_key, ascending));

    let mut groups: Vec<ProjectedGroup<T>> = Vec::new();
    let mut current_key: Option<String> = None;

    for item in items {
        let key = group_key(&item, group_by);
        match (&current_key, groups.last_mut()) {
            (Some(k), Some(group)) if *k == key => group.items.push(item),
            _ => {
                groups.push(ProjectedGroup {
                    label: group_label(&item, group_by),
                    items: vec![item],
                });
                current_key = Some(key);
            }
        }
    }

    ProjectedView {
        sort_key,
        ascending,
        group_by,
        groups,
    }
}

/// Entries whose kinds intersect `mask`.
pub fn filter_by_kind<T: Projectable>(items: Vec<T>, mask: KindMask) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| item.kind_mask().0 & mask.0 != 0)
        .collect()
}

pub fn filter_favorites(items: Vec<MediaItem>) -> Vec<MediaItem> {
    items.into_iter().filter(|item| item.is_favorite).collect()
}

/// Short label shown on the fast-scroll bubble for `item` under `sort_key`.
pub fn bubble_label<T: Projectable>(item: &T, sort_key: SortKey) -> String {
    match sort_key {
        SortKey::Name => first_letter(item.name()),
        SortKey::SizeBytes => format_size(item.size_bytes()),
        SortKey::ModifiedAt => format_day(item.modified_at()),
        SortKey::TakenAt => format_day(item.taken_at()),
        SortKey::Extension => item.extension().to_uppercase(),
        SortKey::Path => first_letter(&display_name(&item.folder())),
    }
}

/// Human-readable size with a 1024 base, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Case-insensitive comparison that orders embedded numbers by value (`img2` < `img10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ord = compare_digit_runs(&ln, &rn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        // "01" after "1" so equal values still order deterministically
        .then_with(|| a.len().cmp(&b.len()))
}

fn compare<T: Projectable>(a: &T, b: &T, sort_key: SortKey, ascending: bool) -> Ordering {
    let primary = match sort_key {
        SortKey::Name => natural_cmp(a.name(), b.name()),
        SortKey::SizeBytes => a.size_bytes().cmp(&b.size_bytes()),
        SortKey::ModifiedAt => a.modified_at().cmp(&b.modified_at()),
        SortKey::TakenAt => a.taken_at().cmp(&b.taken_at()),
        SortKey::Extension => a.extension().cmp(&b.extension()),
        SortKey::Path => a.path().cmp(b.path()),
    };
    let primary = if ascending { primary } else { primary.reverse() };
    primary.then_with(|| a.path().cmp(b.path()))
}

fn group_key<T: Projectable>(item: &T, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::None => String::new(),
        GroupBy::Folder => item.folder(),
        GroupBy::ModifiedDay => format_day(item.modified_at()),
        GroupBy::ModifiedMonth => month_key(item.modified_at()),
        GroupBy::TakenDay => format_day(item.taken_at()),
        GroupBy::TakenMonth => month_key(item.taken_at()),
        GroupBy::Kind => item.kind_mask().0.to_string(),
        GroupBy::Extension => item.extension(),
    }
}

fn group_label<T: Projectable>(item: &T, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::None => String::new(),
        GroupBy::Folder => item.folder(),
        GroupBy::ModifiedDay => format_day(item.modified_at()),
        GroupBy::ModifiedMonth => format_month(item.modified_at()),
        GroupBy::TakenDay => format_day(item.taken_at()),
        GroupBy::TakenMonth => format_month(item.taken_at()),
        GroupBy::Kind => kind_label(item.kind_mask()),
        GroupBy::Extension => {
            let ext = item.extension();
            if ext.is_empty() {
                "Other".to_string()
            } else {
                ext.to_uppercase()
            }
        }
    }
}

fn kind_label(mask: KindMask) -> String {
    match mask.kinds().as_slice() {
        [single] => single.label().to_string(),
        [] => "Other".to_string(),
        _ => "Mixed".to_string(),
    }
}

fn first_letter(text: &str) -> String {
    text.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

fn to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn format_day(millis: i64) -> String {
    to_utc(millis).format("%Y-%m-%d").to_string()
}

fn month_key(millis: i64) -> String {
    to_utc(millis).format("%Y-%m").to_string()
}

fn format_month(millis: i64) -> String {
    to_utc(millis).format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn item(path: &str, size: u64, modified: i64) -> MediaItem {
        MediaItem::new(path, size, modified, MediaKind::Image)
    }

    fn paths<T: Projectable>(items: &[T]) -> Vec<&str> {
        items.iter().map(|i| i.path()).collect()
    }

    #[test]
    fn test_taken_month_descending() {
        let items = vec![
            item("/d/a.jpg", 1, 0).with_taken_at(at(2024, 3, 15)),
            item("/d/b.jpg", 1, 0).with_taken_at(at(2024, 3, 20)),
            item("/d/c.jpg", 1, 0).with_taken_at(at(2024, 1, 2)),
            item("/d/d.jpg", 1, 0).with_taken_at(at(2023, 12, 31)),
        ];

        let view = project(items, SortKey::TakenAt, false, GroupBy::TakenMonth);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["March 2024", "January 2024", "December 2023"]);
        assert_eq!(paths(&view.groups[0].items), vec!["/d/b.jpg", "/d/a.jpg"]);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn test_ties_break_by_path() {
        let items = vec![item("/d/c.jpg", 5, 1), item("/d/a.jpg", 5, 1), item("/d/b.jpg", 5, 1)];
        let asc = project(items.clone(), SortKey::SizeBytes, true, GroupBy::None);
        assert_eq!(paths(&asc.groups[0].items), vec!["/d/a.jpg", "/d/b.jpg", "/d/c.jpg"]);

        let desc = project(items, SortKey::SizeBytes, false, GroupBy::None);
        assert_eq!(paths(&desc.groups[0].items), vec!["/d/a.jpg", "/d/b.jpg", "/d/c.jpg"]);
    }

    #[test]
    fn test_natural_name_order() {
        let items = vec![
            item("/d/IMG10.jpg", 1, 1),
            item("/d/img2.jpg", 1, 1),
            item("/d/img1.jpg", 1, 1),
            item("/d/Beach.jpg", 1, 1),
        ];
        let view = project(items, SortKey::Name, true, GroupBy::None);
        assert_eq!(
            paths(&view.flatten()),
            vec!["/d/Beach.jpg", "/d/img1.jpg", "/d/img2.jpg", "/d/IMG10.jpg"]
        );
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Greater);
        assert_eq!(natural_cmp("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn test_groups_follow_sort_order() {
        // Folder grouping over a size sort yields non-contiguous folders as separate runs.
        let items = vec![
            item("/x/a.jpg", 1, 1),
            item("/y/b.jpg", 2, 1),
            item("/x/c.jpg", 3, 1),
        ];
        let view = project(items, SortKey::SizeBytes, true, GroupBy::Folder);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["/x", "/y", "/x"]);
    }

    #[test]
    fn test_kind_and_extension_groups() {
        let items = vec![
            item("/d/a.jpg", 1, 1),
            MediaItem::new("/d/b.mp4", 1, 1, MediaKind::Video),
            item("/d/c.png", 1, 1),
        ];
        let view = project(items.clone(), SortKey::Extension, true, GroupBy::Extension);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["JPG", "MP4", "PNG"]);

        let view = project(items, SortKey::Path, true, GroupBy::Kind);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Image", "Video", "Image"]);
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        let view = project(Vec::<MediaItem>::new(), SortKey::Name, true, GroupBy::None);
        assert!(view.groups.is_empty());
        assert!(view.is_empty());
    }

    #[test]
    fn test_bubble_labels() {
        let media = item("/dcim/camera/beach.jpg", 1_572_864, at(2024, 3, 15));
        assert_eq!(bubble_label(&media, SortKey::Name), "B");
        assert_eq!(bubble_label(&media, SortKey::SizeBytes), "1.5 MB");
        assert_eq!(bubble_label(&media, SortKey::ModifiedAt), "2024-03-15");
        assert_eq!(bubble_label(&media, SortKey::Extension), "JPG");
        assert_eq!(bubble_label(&media, SortKey::Path), "C");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_directories_project() {
        let dir = |path: &str, count: u64, mask: KindMask| DirectoryAggregate {
            path: path.to_string(),
            display_name: display_name(path),
            thumbnail_ref: format!("{}/x.jpg", path),
            item_count: count,
            total_size_bytes: count * 10,
            latest_modified_at: 1,
            latest_taken_at: 1,
            kind_mask: mask,
        };
        let dirs = vec![
            dir("/dcim/Camera", 3, KindMask::of(MediaKind::Image)),
            dir("/dcim/clips", 1, KindMask::of(MediaKind::Video)),
            dir(
                "/pictures/mixed",
                2,
                [MediaKind::Image, MediaKind::Gif].into_iter().collect(),
            ),
        ];

        let view = project(dirs.clone(), SortKey::SizeBytes, false, GroupBy::Kind);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Image", "Mixed", "Video"]);

        let videos = filter_by_kind(dirs, KindMask::of(MediaKind::Video));
        assert_eq!(paths(&videos), vec!["/dcim/clips"]);
    }

    #[test]
    fn test_filter_favorites() {
        let items = vec![item("/d/a.jpg", 1, 1).with_favorite(true), item("/d/b.jpg", 1, 1)];
        let favs = filter_favorites(items);
        assert_eq!(paths(&favs), vec!["/d/a.jpg"]);
    }
}
