//! Per-cycle state store.
//!
//! A heterogeneous map keyed by typed [`StateKey`] tokens. Keys are
//! namespaced by the owning plugin (`"ResourcesFit/demand"`). Writing
//! needs `&mut CycleState`, which the pipeline only hands out before the
//! Filter fan-out (PreFilter) and after the Score fan-in (Reserve).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::CycleStateError;

/// Typed handle for one slot of the cycle state.
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey({})", self.name)
    }
}

trait StateValue: Any + Send + Sync {
    fn clone_box(&self) -> Box<dyn StateValue>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Clone + Send + Sync> StateValue for T {
    fn clone_box(&self) -> Box<dyn StateValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct CycleState {
    values: HashMap<&'static str, Box<dyn StateValue>>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`.
    ///
    /// Overwriting a slot that holds a value of another type is rejected,
    /// which catches two plugins picking the same key name.
    pub fn write<T>(&mut self, key: &StateKey<T>, value: T) -> Result<(), CycleStateError>
    where
        T: Any + Clone + Send + Sync,
    {
        if let Some(existing) = self.values.get(key.name) {
            if !(**existing).as_any().is::<T>() {
                return Err(CycleStateError::TypeMismatch(key.name));
            }
        }
        self.values.insert(key.name, Box::new(value));
        Ok(())
    }

    pub fn read<T: Any>(&self, key: &StateKey<T>) -> Result<&T, CycleStateError> {
        let value = self
            .values
            .get(key.name)
            .ok_or(CycleStateError::Missing(key.name))?;
        (**value)
            .as_any()
            .downcast_ref::<T>()
            .ok_or(CycleStateError::TypeMismatch(key.name))
    }

    pub fn contains<T>(&self, key: &StateKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Clone for CycleState {
    fn clone(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (*k, (**v).clone_box()))
                .collect(),
        }
    }
}

impl fmt::Debug for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("CycleState").field("keys", &keys).finish()
    }
}
