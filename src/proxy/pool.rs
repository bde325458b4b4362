//
// src/proxy/pool.rs
//

use super::backend::{normalize_all, Backend};
use crate::config::{BackendSpecs, ConfigError};
use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Immutable, priority-ordered snapshot of the backend list. Index 0 is the
/// most preferred backend.
pub type BackendList = Arc<Vec<Backend>>;

/// Holds the current priority order of backends.
///
/// Readers take a snapshot with [`current_list`](Self::current_list) and keep
/// iterating it even while rotations publish newer lists. Every write replaces
/// the whole list, so a snapshot is never edited in place.
#[derive(Debug)]
pub struct BackendRegistry {
    list: ArcSwap<Vec<Backend>>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Backend>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyBackendList);
        }

        Ok(Self {
            list: ArcSwap::from_pointee(backends),
        })
    }

    /// Normalize raw specs and build a registry, optionally shuffling the
    /// initial order once.
    pub fn from_specs(specs: Option<&BackendSpecs>, shuffle: bool) -> Result<Self, ConfigError> {
        let mut backends = normalize_all(specs)?;

        if shuffle {
            backends.shuffle(&mut rand::thread_rng());
            tracing::debug!(order = %display_list(&backends), "Shuffled initial backend order");
        }

        Self::new(backends)
    }

    pub fn current_list(&self) -> BackendList {
        self.list.load_full()
    }

    pub fn replace_list(&self, backends: Vec<Backend>) -> Result<(), ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyBackendList);
        }
        self.list.store(Arc::new(backends));
        Ok(())
    }

    /// Move `target` and everything after it to the front of the list.
    ///
    /// Returns `false` when `target` is already first or not present; the
    /// list is left untouched in both cases.
    pub fn rotate(&self, target: &Backend) -> bool {
        let mut rotated = false;

        self.list.rcu(|current| match rotate_to_front(current, target) {
            Some(next) => {
                rotated = true;
                Arc::new(next)
            }
            None => {
                rotated = false;
                Arc::clone(current)
            }
        });

        if rotated {
            tracing::debug!(backend = %target, "Rotated backend to front");
        }
        rotated
    }

    pub fn len(&self) -> usize {
        self.list.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.load().is_empty()
    }
}

/// Returns `list[idx..] ++ list[..idx]` for the first entry equal to
/// `target`, or `None` when no reordering is needed.
pub fn rotate_to_front(list: &[Backend], target: &Backend) -> Option<Vec<Backend>> {
    let idx = list.iter().position(|b| b == target)?;
    if idx == 0 {
        return None;
    }

    let (before, from_target) = list.split_at(idx);
    let mut next = Vec::with_capacity(list.len());
    next.extend_from_slice(from_target);
    next.extend_from_slice(before);
    Some(next)
}

pub(crate) fn display_list(list: &[Backend]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn backend(name: &str) -> Backend {
        Backend::new(name, 80).unwrap()
    }

    fn registry(names: &[&str]) -> BackendRegistry {
        BackendRegistry::new(names.iter().map(|n| backend(n)).collect()).unwrap()
    }

    fn names(list: &[Backend]) -> Vec<&str> {
        list.iter().map(Backend::host).collect()
    }

    #[test]
    fn test_rotate_moves_target_partition_first() {
        let registry = registry(&["a", "b", "c"]);
        assert!(registry.rotate(&backend("b")));
        assert_eq!(names(&registry.current_list()), ["b", "c", "a"]);
    }

    #[test]
    fn test_rotate_first_is_noop() {
        let registry = registry(&["a", "b", "c"]);
        let before = registry.current_list();

        assert!(!registry.rotate(&backend("a")));
        assert_eq!(names(&registry.current_list()), ["a", "b", "c"]);
        assert!(Arc::ptr_eq(&before, &registry.current_list()));
    }

    #[test]
    fn test_rotate_unknown_is_noop() {
        let registry = registry(&["a", "b", "c"]);
        assert!(!registry.rotate(&backend("x")));
        assert_eq!(names(&registry.current_list()), ["a", "b", "c"]);
    }

    #[test]
    fn test_rotate_matches_by_value() {
        let registry = registry(&["a", "b", "c"]);
        let copy = Backend::new("c", 80).unwrap();
        assert!(registry.rotate(&copy));
        assert_eq!(names(&registry.current_list()), ["c", "a", "b"]);
    }

    #[test]
    fn test_snapshot_survives_rotation() {
        let registry = registry(&["a", "b", "c"]);
        let snapshot = registry.current_list();

        registry.rotate(&backend("c"));

        assert_eq!(names(&snapshot), ["a", "b", "c"]);
        assert_eq!(names(&registry.current_list()), ["c", "a", "b"]);
    }

    #[test]
    fn test_empty_list_rejected() {
        assert_eq!(
            BackendRegistry::new(vec![]).unwrap_err(),
            ConfigError::EmptyBackendList
        );

        let registry = registry(&["a"]);
        assert!(registry.replace_list(vec![]).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_list() {
        let registry = registry(&["a", "b"]);
        registry.replace_list(vec![backend("z")]).unwrap();
        assert_eq!(names(&registry.current_list()), ["z"]);
    }

    #[test]
    fn test_duplicates_tolerated() {
        let registry = registry(&["a", "b", "a", "c"]);
        assert!(registry.rotate(&backend("b")));
        assert_eq!(names(&registry.current_list()), ["b", "a", "c", "a"]);
    }

    #[test]
    fn test_shuffle_keeps_members() {
        let specs: BackendSpecs = vec!["a:1", "b:2", "c:3", "d:4", "e:5"].into();
        let registry = BackendRegistry::from_specs(Some(&specs), true).unwrap();

        let shuffled: HashSet<_> = registry.current_list().iter().cloned().collect();
        let expected: HashSet<_> = crate::proxy::normalize_all(Some(&specs))
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn test_from_specs_without_shuffle_keeps_order() {
        let specs: BackendSpecs = vec!["a:1", "b:2", "c:3"].into();
        let registry = BackendRegistry::from_specs(Some(&specs), false).unwrap();
        assert_eq!(names(&registry.current_list()), ["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_rotations_preserve_members() {
        let registry = Arc::new(registry(&["a", "b", "c", "d", "e", "f"]));
        let expected: HashSet<_> = registry.current_list().iter().cloned().collect();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let targets = ["a", "b", "c", "d", "e", "f"];
                    for n in 0..500 {
                        registry.rotate(&backend(targets[(i + n) % targets.len()]));
                        let snapshot = registry.current_list();
                        assert_eq!(snapshot.len(), 6);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let list = registry.current_list();
        assert_eq!(list.len(), 6);
        assert_eq!(list.iter().cloned().collect::<HashSet<_>>(), expected);
    }

    proptest! {
        #[test]
        fn prop_rotation_is_a_permutation(len in 1usize..12, pick in 0usize..16) {
            let list: Vec<Backend> = (0..len).map(|i| Backend::new(format!("h{}", i), 80).unwrap()).collect();
            let target = Backend::new(format!("h{}", pick), 80).unwrap();

            match rotate_to_front(&list, &target) {
                Some(next) => {
                    let idx = list.iter().position(|b| b == &target).unwrap();
                    prop_assert!(idx > 0);
                    prop_assert_eq!(next.len(), list.len());
                    prop_assert_eq!(&next[0], &target);
                    prop_assert_eq!(&next[..len - idx], &list[idx..]);
                    prop_assert_eq!(&next[len - idx..], &list[..idx]);
                }
                None => prop_assert!(pick == 0 || pick >= len),
            }
        }
    }
}
