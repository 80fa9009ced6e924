use std::{collections::BTreeMap, future::Future};

use crate::core::db::model::EntityKind;

/// Favorite id lists, one per entity kind, kept as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Favorites {
    lists: BTreeMap<EntityKind, Vec<String>>,
}

impl Favorites {
    pub fn ids(&self, kind: EntityKind) -> &[String] {
        self.lists.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.ids(kind).iter().any(|fav| fav == id)
    }

    pub(crate) fn set(&mut self, kind: EntityKind, mut ids: Vec<String>) {
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        self.lists.insert(kind, ids);
    }

    /// Drops the given ids; returns whether the list changed.
    pub(crate) fn forget<'a, I>(&mut self, kind: EntityKind, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let Some(list) = self.lists.get_mut(&kind) else {
            return false;
        };
        let doomed: std::collections::HashSet<&String> = ids.into_iter().collect();
        let before = list.len();
        list.retain(|id| !doomed.contains(id));
        list.len() != before
    }
}

/// Stable reorder putting favorites first.
pub fn sort_favorites_first<T, F>(items: &mut [T], favorite_ids: &[String], id_of: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by_key(|item| {
        let id = id_of(item);
        !favorite_ids.iter().any(|fav| fav == id)
    });
}

pub trait FavoriteRepository {
    /// Favorite ids of live entities only; ids of deleted entities that
    /// linger in storage are skipped.
    fn favorites(&self, kind: EntityKind) -> Vec<String>;
    fn is_favorite(&self, kind: EntityKind, id: &str) -> bool;
    /// Replace the whole favorite list of one kind.
    fn set_favorites(
        &self,
        kind: EntityKind,
        ids: Vec<String>,
    ) -> impl Future<Output = anyhow::Result<()>>;
    /// Flip membership of every id; returns the resulting live list.
    fn toggle_favorites(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> impl Future<Output = anyhow::Result<Vec<String>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorites_sort_first_and_keep_order() {
        let mut names = vec!["a", "b", "c", "d"];
        sort_favorites_first(&mut names, &["c".to_string(), "a".to_string()], |n| *n);
        assert_eq!(names, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn set_deduplicates_and_forget_reports_change() {
        let mut favorites = Favorites::default();
        favorites.set(
            EntityKind::Shutter,
            vec!["s1".into(), "s2".into(), "s1".into()],
        );
        assert_eq!(favorites.ids(EntityKind::Shutter), ["s1", "s2"]);
        assert!(favorites.ids(EntityKind::Note).is_empty());

        assert!(!favorites.forget(EntityKind::Shutter, &["zz".to_string()]));
        assert!(favorites.forget(EntityKind::Shutter, &["s1".to_string()]));
        assert!(!favorites.contains(EntityKind::Shutter, "s1"));
        assert!(!favorites.forget(EntityKind::Project, &["s2".to_string()]));
    }
}
