//! In-memory view engine shared by the store adapters

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{IndexKey, IndexSpec, QueryOptions, Reduction, ViewName, ViewRow, ARCHIVE, TAGS};
use crate::models::Document;

/// Materialized rows of one view.
///
/// Rows are `(key, document id)` pairs, so a document emitting the same key
/// twice contributes a single row.
#[derive(Debug)]
pub struct ViewIndex {
    spec: IndexSpec,
    rows: BTreeSet<(IndexKey, String)>,
    by_doc: HashMap<String, Vec<IndexKey>>,
}

impl ViewIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            rows: BTreeSet::new(),
            by_doc: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> ViewName {
        self.spec.name
    }

    /// Recompute the rows of `id`. `None` removes the document.
    pub fn apply(&mut self, id: &str, document: Option<&Document>) {
        if let Some(keys) = self.by_doc.remove(id) {
            for key in keys {
                self.rows.remove(&(key, id.to_string()));
            }
        }

        let Some(document) = document else {
            return;
        };
        let keys = (self.spec.emit)(document);
        if keys.is_empty() {
            return;
        }
        for key in &keys {
            self.rows.insert((key.clone(), id.to_string()));
        }
        self.by_doc.insert(id.to_string(), keys);
    }

    /// Number of rows currently indexed
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Evaluate a query. Documents are not attached here; stores fill
    /// `doc` when `include_docs` is set.
    #[must_use]
    pub fn query(&self, options: &QueryOptions) -> Vec<ViewRow> {
        let matching = self.rows.iter().filter(|(key, _)| {
            options
                .range
                .as_ref()
                .is_none_or(|range| range.contains(key))
        });
        let limit = options.limit.unwrap_or(usize::MAX);

        let Some(level) = options.group_level else {
            let rows = matching.map(|(key, id)| ViewRow {
                key: key.clone(),
                id: Some(id.clone()),
                value: 1,
                doc: None,
            });
            return if options.descending {
                rows.rev().take(limit).collect()
            } else {
                rows.take(limit).collect()
            };
        };

        let mut groups: BTreeMap<IndexKey, u64> = BTreeMap::new();
        for (key, _) in matching {
            let group = key[..level.min(key.len())].to_vec();
            match self.spec.reduce {
                Reduction::Count => *groups.entry(group).or_default() += 1,
            }
        }
        let rows = groups.into_iter().map(|(key, value)| ViewRow {
            key,
            id: None,
            value,
            doc: None,
        });
        if options.descending {
            rows.rev().take(limit).collect()
        } else {
            rows.take(limit).collect()
        }
    }
}

/// Every view a store maintains
#[derive(Debug)]
pub struct ViewSet {
    views: Vec<ViewIndex>,
}

impl ViewSet {
    /// The archive and tag views
    #[must_use]
    pub fn standard() -> Self {
        Self::with_specs(&[ARCHIVE, TAGS])
    }

    #[must_use]
    pub fn with_specs(specs: &[IndexSpec]) -> Self {
        Self {
            views: specs.iter().copied().map(ViewIndex::new).collect(),
        }
    }

    /// Recompute every view for one document
    pub fn apply(&mut self, id: &str, document: Option<&Document>) {
        for view in &mut self.views {
            view.apply(id, document);
        }
    }

    #[must_use]
    pub fn get(&self, name: ViewName) -> Option<&ViewIndex> {
        self.views.iter().find(|view| view.name() == name)
    }
}

impl Default for ViewSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, Revision};
    use crate::views::{KeyPart, KeyRange};
    use pretty_assertions::assert_eq;

    fn document(created_at: i64, tags: &[&str]) -> Document {
        let tags: Vec<String> = tags.iter().map(|tag| (*tag).to_string()).collect();
        let draft = EntryDraft::new("body", &tags, created_at);
        Document {
            id: draft.id.as_str(),
            revision: Revision::first(),
            body: draft.body().unwrap(),
        }
    }

    fn ids(rows: &[ViewRow]) -> Vec<String> {
        rows.iter().filter_map(|row| row.id.clone()).collect()
    }

    #[test]
    fn apply_replaces_previous_rows() {
        let mut index = ViewIndex::new(TAGS);
        let mut doc = document(1, &["a", "b"]);
        index.apply(&doc.id, Some(&doc));
        assert_eq!(index.len(), 2);

        let draft = EntryDraft::new("body", &["c".to_string()], 1);
        doc.body = draft.body().unwrap();
        index.apply(&doc.id, Some(&doc));
        assert_eq!(index.len(), 1);

        index.apply(&doc.id, None);
        assert!(index.is_empty());
    }

    #[test]
    fn duplicate_keys_collapse_to_one_row() {
        let mut index = ViewIndex::new(TAGS);
        let doc = document(1, &["a", "a"]);
        index.apply(&doc.id, Some(&doc));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn query_orders_and_limits() {
        let mut index = ViewIndex::new(ARCHIVE);
        let docs = [document(1_000, &[]), document(2_000, &[]), document(3_000, &[])];
        for doc in &docs {
            index.apply(&doc.id, Some(doc));
        }

        let ascending = index.query(&QueryOptions::default());
        assert_eq!(ids(&ascending), vec![docs[0].id.clone(), docs[1].id.clone(), docs[2].id.clone()]);

        let newest_two = index.query(&QueryOptions {
            descending: true,
            limit: Some(2),
            ..QueryOptions::default()
        });
        assert_eq!(ids(&newest_two), vec![docs[2].id.clone(), docs[1].id.clone()]);
    }

    #[test]
    fn grouped_query_counts_by_prefix() {
        let mut index = ViewIndex::new(TAGS);
        for doc in [document(1, &["a", "b"]), document(2, &["a"]), document(3, &["c"])] {
            index.apply(&doc.id, Some(&doc));
        }

        let rows = index.query(&QueryOptions {
            group_level: Some(1),
            ..QueryOptions::default()
        });
        let counts: Vec<(IndexKey, u64)> = rows.into_iter().map(|row| (row.key, row.value)).collect();
        assert_eq!(
            counts,
            vec![
                (vec![KeyPart::from("a")], 2),
                (vec![KeyPart::from("b")], 1),
                (vec![KeyPart::from("c")], 1),
            ]
        );
    }

    #[test]
    fn group_level_zero_counts_everything() {
        let mut index = ViewIndex::new(ARCHIVE);
        for doc in [document(1, &[]), document(2, &[])] {
            index.apply(&doc.id, Some(&doc));
        }
        let rows = index.query(&QueryOptions {
            group_level: Some(0),
            ..QueryOptions::default()
        });
        assert_eq!(rows.len(), 1);
        assert!(rows[0].key.is_empty());
        assert_eq!(rows[0].value, 2);
    }

    #[test]
    fn prefix_range_filters_rows() {
        let mut index = ViewIndex::new(TAGS);
        let tagged = document(1, &["rust"]);
        let other = document(2, &["go"]);
        index.apply(&tagged.id, Some(&tagged));
        index.apply(&other.id, Some(&other));

        let rows = index.query(&QueryOptions {
            range: Some(KeyRange::Prefix(vec!["rust".into()])),
            ..QueryOptions::default()
        });
        assert_eq!(ids(&rows), vec![tagged.id]);
    }

    #[test]
    fn view_set_updates_all_views() {
        let mut views = ViewSet::standard();
        let doc = document(1, &["a"]);
        views.apply(&doc.id, Some(&doc));
        assert_eq!(views.get(ViewName::Archive).map(ViewIndex::len), Some(1));
        assert_eq!(views.get(ViewName::Tags).map(ViewIndex::len), Some(1));

        views.apply(&doc.id, None);
        assert_eq!(views.get(ViewName::Archive).map(ViewIndex::len), Some(0));
    }
}
