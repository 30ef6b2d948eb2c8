//! Reference expansion ("population") over stored documents.
//!
//! Each [`Population`] path names a field holding an id or a list of ids and
//! the collection those ids live in. Paths are applied in order, one store
//! query per path, so a dotted path such as `messages.sender` can walk into
//! objects that an earlier `messages` path has just populated. Targets are
//! inserted as stored, never recursively expanded.

use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::{Document, RecordStore, Rule, document_id};
use crate::domain::Population;

type Targets = HashMap<String, Document>;

pub async fn populate(
    store: &dyn RecordStore,
    mut documents: Vec<Document>,
    paths: &[Population],
) -> Result<Vec<Document>> {
    if documents.is_empty() {
        return Ok(documents);
    }

    for population in paths {
        let segments: Vec<&str> = population.path.split('.').collect();

        let mut ids = BTreeSet::new();
        for document in &documents {
            collect_ids(document, &segments, &mut ids);
        }

        let targets: Targets = if ids.is_empty() {
            HashMap::new()
        } else {
            let rule = Rule::field_in("id", ids.into_iter().map(Value::String).collect());
            store
                .get_documents_by_rule(population.collection, &rule)
                .await?
                .into_iter()
                .filter_map(|d| document_id(&d).map(str::to_string).map(|id| (id, d)))
                .collect()
        };

        for document in &mut documents {
            expand(document, &segments, &targets);
        }
    }

    Ok(documents)
}

pub async fn populate_one(
    store: &dyn RecordStore,
    document: Document,
    paths: &[Population],
) -> Result<Document> {
    let mut populated = populate(store, vec![document], paths).await?;
    Ok(populated.remove(0))
}

/// Collapses populated references back to ids before a document is persisted.
pub fn dehydrate(document: &mut Document, paths: &[Population]) {
    for population in paths.iter().filter(|p| !p.is_nested()) {
        if let Some(value) = document.get_mut(population.path) {
            collapse(value);
        }
    }
}

fn collapse(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get("id").cloned() {
                *value = id;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(collapse),
        _ => {}
    }
}

fn collect_ids(object: &Document, segments: &[&str], ids: &mut BTreeSet<String>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = object.get(*first) else {
        return;
    };

    if rest.is_empty() {
        match value {
            Value::String(id) => {
                ids.insert(id.clone());
            }
            Value::Array(items) => {
                ids.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
        return;
    }

    match value {
        Value::Object(child) => collect_ids(child, rest, ids),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .for_each(|child| collect_ids(child, rest, ids)),
        _ => {}
    }
}

fn expand(object: &mut Document, segments: &[&str], targets: &Targets) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = object.get_mut(*first) else {
        return;
    };

    if rest.is_empty() {
        expand_leaf(value, targets);
        return;
    }

    match value {
        Value::Object(child) => expand(child, rest, targets),
        Value::Array(items) => items
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .for_each(|child| expand(child, rest, targets)),
        _ => {}
    }
}

/// Single references that do not resolve become `null`; unresolved entries
/// in a list are dropped.
fn expand_leaf(value: &mut Value, targets: &Targets) {
    match value {
        Value::String(id) => {
            let replacement = targets
                .get(id.as_str())
                .cloned()
                .map_or(Value::Null, Value::Object);
            *value = replacement;
        }
        Value::Array(items) => {
            let expanded = std::mem::take(items)
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(id) => targets.get(&id).cloned().map(Value::Object),
                    other => Some(other),
                })
                .collect();
            *items = expanded;
        }
        _ => {}
    }
}
