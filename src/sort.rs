//! Stable multi-key item ordering for section indexes and tag pages.

use crate::model::Item;
use anyhow::{Result, bail};
use std::borrow::Borrow;
use std::cmp::Ordering;

enum SortKey {
    Id,
    Title,
    Date,
    User(String),
}

impl SortKey {
    fn parse(name: &str) -> Self {
        match name {
            "id" => Self::Id,
            "title" => Self::Title,
            "date" => Self::Date,
            other => Self::User(other.to_string()),
        }
    }
}

/// Sort `items` by the configured key list. Keys beyond the first break
/// ties; the sort is stable, so equal runs keep collection order. A
/// leading `-` on the FIRST key reverses the entire ordering.
///
/// User keys must exist on every item with one scalar type throughout,
/// otherwise the whole build fails.
pub fn sort_items_by<T: Borrow<Item>>(items: &mut [T], keys: &[String]) -> Result<()> {
    if keys.is_empty() || items.is_empty() {
        return Ok(());
    }

    let reverse = keys[0].starts_with('-');
    let keys: Vec<SortKey> = keys
        .iter()
        .map(|k| SortKey::parse(k.strip_prefix('-').unwrap_or(k)))
        .collect();

    // Cross-type user values make the ordering meaningless, so they are
    // rejected up front instead of surfacing mid-sort.
    for key in &keys {
        let SortKey::User(name) = key else { continue };
        let mut first = None;
        for item in items.iter() {
            let item: &Item = item.borrow();
            let Some(value) = item.user.get(name) else {
                bail!("cannot sort `{}` by `{name}`: field is missing", item.rel);
            };
            match first {
                None => first = Some((value, &item.rel)),
                Some((probe, probe_rel)) => {
                    if let Err(err) = probe.try_cmp(value) {
                        bail!("cannot sort by `{name}` ({probe_rel} vs {}): {err}", item.rel);
                    }
                }
            }
        }
    }

    items.sort_by(|a, b| {
        let (a, b): (&Item, &Item) = (a.borrow(), b.borrow());
        let mut order = Ordering::Equal;
        for key in &keys {
            order = match key {
                SortKey::Id => a.id.cmp(&b.id),
                SortKey::Title => a.title.cmp(&b.title),
                // None (no date at all) sorts before every real date.
                SortKey::Date => a.date().cmp(&b.date()),
                SortKey::User(name) => match (a.user.get(name), b.user.get(name)) {
                    // Validated above; unreachable in practice.
                    (Some(x), Some(y)) => x.try_cmp(y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                },
            };
            if order != Ordering::Equal {
                break;
            }
        }
        if reverse { order.reverse() } else { order }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateField, RuleId, Scalar};
    use chrono::{TimeZone, Utc};

    fn item(rel: &str) -> Item {
        Item::new(rel, RuleId { section: 0, rule: 0 })
    }

    fn dated(rel: &str, y: i32, m: u32, d: u32) -> Item {
        let mut it = item(rel);
        it.date = DateField::Resolved(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap());
        it
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_date_ascending_with_absent_first() {
        let mut items = vec![
            dated("b.md", 2023, 5, 1),
            item("undated.md"),
            dated("a.md", 2021, 1, 1),
        ];
        sort_items_by(&mut items, &keys(&["date"])).unwrap();
        let rels: Vec<&str> = items.iter().map(|i| i.rel.as_str()).collect();
        assert_eq!(rels, ["undated.md", "a.md", "b.md"]);
    }

    #[test]
    fn test_leading_dash_reverses_everything() {
        let mut a = item("a.md");
        a.title = "apple".into();
        let mut b = item("b.md");
        b.title = "banana".into();
        let mut items = vec![a, b];
        sort_items_by(&mut items, &keys(&["-title"])).unwrap();
        assert_eq!(items[0].title, "banana");
    }

    #[test]
    fn test_only_first_key_dash_triggers_reversal() {
        // `-` on a later key does not flip the order; the key itself is
        // still read with the dash stripped.
        let mut a = item("a.md");
        a.id = 1;
        a.title = "zz".into();
        let mut b = item("b.md");
        b.id = 2;
        b.title = "aa".into();
        let mut items = vec![a, b];
        sort_items_by(&mut items, &keys(&["id", "-title"])).unwrap();
        assert_eq!(items[0].id, 1);
    }

    #[test]
    fn test_later_keys_break_ties() {
        let mut a = dated("a.md", 2022, 1, 1);
        a.title = "beta".into();
        let mut b = dated("b.md", 2022, 1, 1);
        b.title = "alpha".into();
        let mut items = vec![a, b];
        sort_items_by(&mut items, &keys(&["date", "title"])).unwrap();
        assert_eq!(items[0].title, "alpha");
    }

    #[test]
    fn test_user_key_int_order() {
        let mut a = item("a.md");
        a.user.insert("weight".into(), Scalar::Int(10));
        let mut b = item("b.md");
        b.user.insert("weight".into(), Scalar::Int(2));
        let mut items = vec![a, b];
        sort_items_by(&mut items, &keys(&["weight"])).unwrap();
        assert_eq!(items[0].rel, "b.md");
    }

    #[test]
    fn test_mixed_user_types_fatal() {
        let mut a = item("a.md");
        a.user.insert("weight".into(), Scalar::Int(1));
        let mut b = item("b.md");
        b.user.insert("weight".into(), Scalar::Text("low".into()));
        let mut items = vec![a, b];
        let err = sort_items_by(&mut items, &keys(&["weight"])).unwrap_err();
        assert!(err.to_string().contains("weight"));
    }

    #[test]
    fn test_missing_user_key_fatal() {
        let mut a = item("a.md");
        a.user.insert("weight".into(), Scalar::Int(1));
        let b = item("b.md");
        let mut items = vec![a, b];
        assert!(sort_items_by(&mut items, &keys(&["weight"])).is_err());
    }

    #[test]
    fn test_sorts_through_references() {
        let zero = dated("a.md", 2020, 1, 1);
        let one = dated("b.md", 2019, 1, 1);
        let storage = [zero, one];
        let mut refs: Vec<&Item> = storage.iter().collect();
        sort_items_by(&mut refs, &keys(&["date"])).unwrap();
        assert_eq!(refs[0].rel, "b.md");
    }
}
