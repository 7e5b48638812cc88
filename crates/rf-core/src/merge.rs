//! Merge engine: combine feeds into one synthetic feed.

use std::collections::HashSet;

use rf_model::{sort_items, Feed, Group, Item, ModelError, NEUTRAL_COLOR};
use tracing::debug;

use crate::config::MergePolicy;

/// Combine the items of every plain feed in `feeds` under `title`.
///
/// Group outputs among the inputs are skipped. Items keep their source identity in
/// `belong`, are sorted newest first, and duplicate `(title, link)` pairs
/// are dropped in favor of the newest.
pub fn merge<'a>(
    feeds: impl IntoIterator<Item = &'a Feed>,
    title: &str,
    policy: MergePolicy,
) -> Result<Feed, ModelError> {
    let mut feed_links: Vec<String> = Vec::new();
    let mut items: Vec<Item> = Vec::new();

    for feed in feeds {
        if feed.is_group_output() {
            debug!(group = title, skipped = %feed.title, "not merging a group output");
            continue;
        }
        let identity = feed.identity()?;
        if feed_links.iter().any(|l| l == identity) {
            continue;
        }
        feed_links.push(identity.to_string());
        items.extend(feed.items.iter().map(|item| Item {
            belong: identity.to_string(),
            ..item.clone()
        }));
    }

    sort_items(&mut items);
    let items = dedupe(items);

    let merged = match policy {
        MergePolicy::AlwaysMerged => true,
        // Zero contributors leaves no identity to fall back on.
        MergePolicy::ByContributors => feed_links.len() != 1,
    };

    Ok(Feed {
        title: title.to_string(),
        description: String::new(),
        link: String::new(),
        feed_links,
        color: NEUTRAL_COLOR,
        items,
        merged,
        title_override: None,
        group: Some(title.to_string()),
    })
}

/// Keep the first occurrence of each `(title, link)`; `items` must be sorted.
fn dedupe(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.title.clone(), item.link.clone())))
        .collect()
}

/// Merge the members of `group` found among `feeds`, in membership order.
///
/// Members that are not tracked (or are group outputs themselves) contribute
/// nothing.
pub fn expand(group: &Group, feeds: &[Feed], policy: MergePolicy) -> Result<Feed, ModelError> {
    let members: Vec<&Feed> = group
        .feed_links
        .iter()
        .filter_map(|link| {
            feeds
                .iter()
                .find(|feed| !feed.is_group_output() && feed.identity().is_ok_and(|id| id == link))
        })
        .collect();

    debug!(
        group = %group.title,
        members = group.feed_links.len(),
        found = members.len(),
        "expanding group"
    );
    merge(members, &group.title, policy)
}
