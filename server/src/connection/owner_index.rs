use std::{
    collections::{BTreeMap, HashMap},
    os::fd::RawFd,
};

/// Live connections per owning pid. A pid is present only while it has at
/// least one connection.
#[derive(Debug, Default)]
pub struct OwnerIndex {
    owners: HashMap<i32, Vec<RawFd>>,
}

impl OwnerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: i32, fd: RawFd) {
        self.owners.entry(pid).or_default().push(fd);
    }

    /// Removes `fd` from `pid`'s set. Returns true when that was the owner's
    /// last connection, in which case the owner is gone from the index.
    pub fn remove(&mut self, pid: i32, fd: RawFd) -> bool {
        let Some(fds) = self.owners.get_mut(&pid) else {
            return false;
        };
        fds.retain(|existing| *existing != fd);
        if fds.is_empty() {
            self.owners.remove(&pid);
            return true;
        }
        false
    }

    pub fn connections(&self, pid: i32) -> &[RawFd] {
        self.owners.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.owners.contains_key(&pid)
    }

    pub fn counts(&self) -> BTreeMap<i32, usize> {
        self.owners
            .iter()
            .map(|(pid, fds)| (*pid, fds.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}
