//! Reusable instance pools keyed by prototype.
//!
//! One idle list per prototype, no eviction. An instance handed out by
//! [`ResourcePool::acquire_with`] remembers the prototype it came from, so a
//! release always lands back in the originating list.

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("instance was not issued by this pool or has already been released")]
    NotIssued,
}

#[derive(Debug, Clone)]
pub struct ResourcePool<K, T> {
    idle: HashMap<K, Vec<T>>,
    issued: HashMap<T, K>,
    created: usize,
}

impl<K, T> Default for ResourcePool<K, T> {
    fn default() -> Self {
        Self {
            idle: HashMap::new(),
            issued: HashMap::new(),
            created: 0,
        }
    }
}

impl<K, T> ResourcePool<K, T>
where
    K: Eq + Hash + Clone,
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an idle instance of `key`, or build a new one with `create`
    /// when that prototype has nothing idle.
    pub fn acquire_with(&mut self, key: &K, create: impl FnOnce(&K) -> T) -> T {
        let instance = match self.idle.get_mut(key).and_then(Vec::pop) {
            Some(instance) => instance,
            None => {
                self.created += 1;
                create(key)
            }
        };
        self.issued.insert(instance.clone(), key.clone());
        instance
    }

    /// Like [`acquire_with`](Self::acquire_with), but the constructor may
    /// refuse (unknown prototype, missing asset). Nothing is recorded then.
    pub fn try_acquire_with(
        &mut self,
        key: &K,
        create: impl FnOnce(&K) -> Option<T>,
    ) -> Option<T> {
        let instance = match self.idle.get_mut(key).and_then(Vec::pop) {
            Some(instance) => instance,
            None => {
                let instance = create(key)?;
                self.created += 1;
                instance
            }
        };
        self.issued.insert(instance.clone(), key.clone());
        Some(instance)
    }

    /// Return an instance to the idle list it was issued from.
    pub fn release(&mut self, instance: T) -> Result<K, PoolError> {
        let key = self.issued.remove(&instance).ok_or(PoolError::NotIssued)?;
        self.idle.entry(key.clone()).or_default().push(instance);
        Ok(key)
    }

    pub fn idle(&self, key: &K) -> usize {
        self.idle.get(key).map_or(0, Vec::len)
    }

    pub fn in_use(&self) -> usize {
        self.issued.len()
    }

    /// Total instances ever constructed through this pool.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn is_issued(&self, instance: &T) -> bool {
        self.issued.contains_key(instance)
    }

    pub fn prototypes(&self) -> impl Iterator<Item = &K> {
        self.idle.keys()
    }

    /// Forget every instance, idle or issued, and return them so the owner
    /// can destroy them.
    pub fn drain(&mut self) -> Vec<T> {
        let mut all: Vec<T> = self.issued.drain().map(|(instance, _)| instance).collect();
        all.extend(self.idle.drain().flat_map(|(_, list)| list));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_builds_only_when_empty() {
        let mut pool: ResourcePool<&str, u32> = ResourcePool::new();
        let mut next = 0;
        let mut make = |_: &&str| {
            next += 1;
            next
        };

        let a = pool.acquire_with(&"spark", &mut make);
        pool.release(a).unwrap();
        let b = pool.acquire_with(&"spark", &mut make);

        assert_eq!(a, b);
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn release_returns_to_originating_prototype() {
        let mut pool: ResourcePool<&str, u32> = ResourcePool::new();
        let blood = pool.acquire_with(&"blood", |_| 10);
        let stars = pool.acquire_with(&"stars", |_| 20);

        assert_eq!(pool.release(blood), Ok("blood"));
        assert_eq!(pool.release(stars), Ok("stars"));
        assert_eq!(pool.idle(&"blood"), 1);
        assert_eq!(pool.idle(&"stars"), 1);

        let again = pool.acquire_with(&"stars", |_| 99);
        assert_eq!(again, 20);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool: ResourcePool<&str, u32> = ResourcePool::new();
        let a = pool.acquire_with(&"spark", |_| 1);
        assert!(pool.release(a).is_ok());
        assert_eq!(pool.release(a), Err(PoolError::NotIssued));
        assert_eq!(pool.idle(&"spark"), 1);
    }

    #[test]
    fn refused_construction_leaves_no_trace() {
        let mut pool: ResourcePool<&str, u32> = ResourcePool::new();
        assert_eq!(pool.try_acquire_with(&"missing", |_| None), None);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.created(), 0);
    }

    #[test]
    fn growth_is_unbounded() {
        let mut pool: ResourcePool<&str, u32> = ResourcePool::new();
        let mut next = 0;
        for _ in 0..64 {
            pool.acquire_with(&"spark", |_| {
                next += 1;
                next
            });
        }
        assert_eq!(pool.in_use(), 64);
        assert_eq!(pool.drain().len(), 64);
        assert_eq!(pool.in_use(), 0);
    }
}
