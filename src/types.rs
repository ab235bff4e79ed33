/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Cached resources owned by the application store.
/// Used by request guards, loading flags, and change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Users,
    Notifications,
    Stats,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Notifications => "notifications",
            Resource::Stats => "stats",
        }
    }
}

/// One page of a remote collection plus its total size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, count: u64, page: u32, page_size: u32) -> Self {
        Self {
            data,
            count,
            page,
            page_size,
            total_pages: total_pages(count, page_size),
        }
    }

    /// Zero-valued envelope used when a fetch falls back
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }
}

/// ceil(count / page_size); zero when page_size is zero
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let page: Paginated<u8> = Paginated::new(vec![1, 2], 12, 1, 2);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageSize"], 2);
        assert_eq!(json["totalPages"], 6);
    }
}
