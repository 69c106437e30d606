//! Discovery of fields that need live revalidation.

use crate::config::RuleMetadata;

/// Find the fields that must be revalidated on every tree-wide value change.
///
/// For each descriptor carrying a group validator config: its `subscriber`
/// is tracked (another rule writes that field's errors), and with
/// `subscribe: true` the owning path is tracked as well. The result keeps
/// discovery order and lists each path once.
///
/// A subscriber names a sibling of the owning field, so for an owner at
/// `contact.email` the subscriber `phone` is tracked as `contact.phone`.
pub fn find_controls_requiring_subscription(metadata: &RuleMetadata) -> Vec<String> {
    let mut tracked: Vec<String> = Vec::new();
    let mut track = |path: &str| {
        if !tracked.iter().any(|p| p == path) {
            tracked.push(path.to_string());
        }
    };

    for (path, descriptors) in metadata.iter() {
        for config in descriptors.iter().filter_map(|d| d.group_config()) {
            if let Some(subscriber) = config.subscriber.as_deref() {
                track(&sibling_path(path, subscriber));
            }
            if config.subscribe {
                track(path);
            }
        }
    }

    tracked
}

fn sibling_path(owner: &str, sibling: &str) -> String {
    match owner.rsplit_once('.') {
        Some((group, _)) => format!("{group}.{sibling}"),
        None => sibling.to_string(),
    }
}
