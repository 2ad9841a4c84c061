//! Prefix filtering, ordering and cursor pagination shared by all backends.

use crate::types::{BlobProperties, ListOptions, ListingPage};

/// Turn an unordered set of blob properties into one listing page.
///
/// Items are sorted by identifier, filtered by prefix, resumed strictly
/// after the continuation cursor and truncated to `max_results`. A cursor
/// that matches no remaining identifier restarts from the beginning.
pub fn paginate(mut items: Vec<BlobProperties>, options: &ListOptions) -> ListingPage {
    if let Some(prefix) = options.prefix.as_deref() {
        items.retain(|p| p.identifier.as_str().starts_with(prefix));
    }
    items.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    let start = options
        .continuation_cursor
        .as_ref()
        .and_then(|cursor| items.iter().position(|p| &p.identifier == cursor))
        .map_or(0, |pos| pos + 1);

    let limit = match options.max_results {
        Some(0) | None => usize::MAX,
        Some(n) => n,
    };

    let remaining = items.len() - start;
    let has_more = remaining > limit;

    let items: Vec<BlobProperties> = items.into_iter().skip(start).take(limit).collect();
    let continuation_cursor = if has_more {
        items.last().map(|p| p.identifier.clone())
    } else {
        None
    };

    ListingPage {
        items,
        continuation_cursor,
    }
}
