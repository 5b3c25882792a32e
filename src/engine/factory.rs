// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, sync::Arc};

use crate::engine::state::{State, StateTag};

/// Flyweight registry holding exactly one instance of every state of a
/// machine shape.
///
/// Built once with the complete state list and shared (`Arc`) across every
/// owner of the shape. Registration problems are construction-time
/// programming defects and panic immediately rather than surfacing as
/// recoverable errors.
pub struct StateFactory<O, E, T> {
    states: HashMap<T, Arc<dyn State<O, E, T>>>,
}

impl<O, E, T> StateFactory<O, E, T>
where
    O: 'static,
    E: 'static,
    T: StateTag,
{
    /// Builds the registry from the complete list of states for this shape.
    ///
    /// # Panics
    /// If two states report the same tag.
    pub fn new<I>(states: I) -> Self
    where I: IntoIterator<Item = Arc<dyn State<O, E, T>>> {
        let mut map: HashMap<T, Arc<dyn State<O, E, T>>> = HashMap::new();
        for state in states {
            let tag = state.tag();
            if map.insert(tag, state).is_some() {
                panic!("duplicate state registered for tag {tag:?}");
            }
        }
        Self { states: map }
    }

    /// Returns the shared instance registered under `tag`. Two calls with the
    /// same tag return the identical instance.
    ///
    /// # Panics
    /// If `tag` was never registered; an unregistered tag reaching a lookup
    /// means the factory was constructed with an incomplete state list.
    pub fn get(&self, tag: T) -> Arc<dyn State<O, E, T>> {
        match self.states.get(&tag) {
            Some(state) => state.clone(),
            None => panic!("no state registered for tag {tag:?}"),
        }
    }

    /// Whether `tag` is registered.
    pub fn contains(&self, tag: T) -> bool {
        self.states.contains_key(&tag)
    }

    /// Number of registered states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
