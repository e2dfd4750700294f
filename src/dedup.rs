use std::collections::HashSet;

use crate::model::NewsItem;

/// Keep the first item for each exact title, in first-seen order.
///
/// Titles are compared byte-for-byte: "Fed Holds Rates" and "Fed holds rates"
/// are different stories as far as this pass is concerned. An item whose id
/// was already kept is dropped as well, so ids stay unique in the result.
pub fn dedupe_by_title(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut titles: HashSet<String> = HashSet::with_capacity(items.len());
    let mut ids: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| {
            if titles.contains(&item.title) || ids.contains(&item.id) {
                return false;
            }
            titles.insert(item.title.clone());
            ids.insert(item.id.clone());
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;

    fn item(id: &str, title: &str, source: &str) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            content: String::new(),
            media_url: None,
            source_url: format!("https://{}.com/{}", source, id),
            source_name: source.to_string(),
            media_type: MediaType::Article,
            date_published: None,
            estimated_read_time: "1 min".to_string(),
            relevance_score: 0.0,
            matched_interests: vec![],
        }
    }

    #[test]
    fn test_first_fetched_survives() {
        let items = vec![
            item("1", "Bitcoin tops 100k", "coindesk"),
            item("2", "Oil slides", "oilprice"),
            item("3", "Bitcoin tops 100k", "decrypt"),
        ];

        let unique = dedupe_by_title(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].source_name, "coindesk");
        assert_eq!(unique[1].id, "2");
    }

    #[test]
    fn test_titles_compared_exactly() {
        let items = vec![
            item("1", "Fed Holds Rates", "a"),
            item("2", "Fed holds rates", "b"),
            item("3", "Fed holds rates.", "c"),
        ];
        assert_eq!(dedupe_by_title(items).len(), 3);
    }

    #[test]
    fn test_idempotent() {
        let items = vec![
            item("1", "A", "x"),
            item("2", "B", "x"),
            item("3", "A", "y"),
            item("4", "C", "y"),
            item("5", "B", "z"),
        ];
        let once = dedupe_by_title(items);
        let twice = dedupe_by_title(once.clone());
        assert_eq!(once, twice);
        let ids: Vec<&str> = once.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[test]
    fn test_repeated_id_with_new_title_dropped() {
        let items = vec![
            item("https://x.com/1", "Original headline", "a"),
            item("https://x.com/1", "Updated headline", "b"),
            item("https://x.com/2", "Updated headline", "c"),
        ];
        let unique = dedupe_by_title(items);
        let sources: Vec<&str> = unique.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(sources, vec!["a", "c"]);
    }

    #[test]
    fn test_empty() {
        assert!(dedupe_by_title(vec![]).is_empty());
    }
}
