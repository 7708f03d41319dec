use ::sled::transaction::{ConflictableTransactionError, TransactionalTree};
use ::sled::Tree;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ErrorKind, Error, Result};

use super::{decode, encode, Collectable, Identifiable};

#[derive(Clone, Debug)]
pub struct SledDb {
    inner: ::sled::Db,
}

impl SledDb {
    /// Opens the database as defined in the configuration.
    pub fn new(config: &crate::config::Db) -> Result<Self> {
        if config.temporary {
            return Self::temporary();
        }
        let inner = ::sled::Config::default().path(&config.path).open()?;
        Ok(Self { inner })
    }

    /// Opens a database that gets removed once dropped.
    pub fn temporary() -> Result<Self> {
        let inner = ::sled::Config::new().temporary(true).open()?;
        Ok(Self { inner })
    }

    /// Opens the tree backing the collection defined for the type.
    pub fn tree<T: Collectable>(&self) -> Result<Tree> {
        Ok(self.inner.open_tree(T::get_collection_name())?)
    }

    pub fn get_collection<T: DeserializeOwned + Collectable>(&self) -> Result<Vec<T>> {
        let tree = self.tree::<T>()?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value_bytes) = entry?;
            out.push(decode(&value_bytes)?);
        }
        Ok(out)
    }

    /// Returns the length of the collection as defined for the specified type.
    pub fn len<T: Collectable>(&self) -> Result<usize> {
        Ok(self.tree::<T>()?.len())
    }

    /// Gets an item from the collection defined for the item type.
    pub fn get<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<T> {
        self.try_get(id)?.ok_or_else(|| {
            ErrorKind::NotFound(format!(
                "entity with id '{}' not found in collection {}",
                id,
                T::get_collection_name()
            ))
            .into()
        })
    }

    pub fn try_get<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<Option<T>> {
        match self.tree::<T>()?.get(id)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns the first item of the collection matching the predicate.
    pub fn find<T, F>(&self, predicate: F) -> Result<Option<T>>
    where
        T: DeserializeOwned + Collectable,
        F: Fn(&T) -> bool,
    {
        Ok(self.get_collection::<T>()?.into_iter().find(|t| predicate(t)))
    }

    pub fn set<T: Serialize + Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        let encoded = encode(value)?;
        self.tree::<T>()?.insert(value.get_id(), encoded)?;
        Ok(())
    }

    /// Stores the value only if no entry exists under its id yet. Returns
    /// the entry already present otherwise.
    pub fn insert_if_absent<T>(&self, value: &T) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Identifiable + Collectable,
    {
        self.swap_unless(value, |_| false)
    }

    /// Writes `new` unless an entry already exists under its id that
    /// `replaceable` rejects. The rejected entry is returned and nothing is
    /// written. Atomic with respect to other writers of the same id.
    pub fn swap_unless<T, F>(&self, new: &T, replaceable: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Identifiable + Collectable,
        F: Fn(&T) -> bool,
    {
        let tree = self.tree::<T>()?;
        let encoded = encode(new)?;
        loop {
            let current = tree.get(new.get_id())?;
            if let Some(bytes) = &current {
                let existing: T = decode(bytes)?;
                if !replaceable(&existing) {
                    return Ok(Some(existing));
                }
            }
            match tree.compare_and_swap(new.get_id(), current, Some(encoded.clone()))? {
                Ok(()) => return Ok(None),
                // Lost the race against another writer, re-read and retry
                Err(_) => continue,
            }
        }
    }

    /// Applies `change` to the stored entry and writes the result back. The
    /// entry is re-read and `change` applied again whenever another writer
    /// got in between, so fields `change` leaves alone keep their latest
    /// value. Returns `None` when nothing is stored under the id.
    pub fn update<T, F>(&self, id: Uuid, mut change: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Collectable,
        F: FnMut(T) -> Result<T>,
    {
        let tree = self.tree::<T>()?;
        loop {
            let Some(current) = tree.get(id)? else {
                return Ok(None);
            };
            let updated = change(decode(&current)?)?;
            let encoded = encode(&updated)?;
            match tree.compare_and_swap(id, Some(current), Some(encoded))? {
                Ok(()) => return Ok(Some(updated)),
                Err(_) => continue,
            }
        }
    }

    /// Removes the item with the given id, returning it if it existed.
    pub fn remove<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<Option<T>> {
        match self.tree::<T>()?.remove(id)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Checks that the underlying storage still answers reads.
    pub fn is_healthy(&self) -> bool {
        self.inner.open_tree("__health").and_then(|t| t.get("ping")).is_ok()
    }

    pub async fn flush(&self) -> Result<()> {
        self.inner.flush_async().await?;
        Ok(())
    }
}

/// Stores the value inside a running transaction on the tree backing its
/// collection.
pub fn set_in<T: Serialize + Identifiable>(
    tree: &TransactionalTree,
    value: &T,
) -> std::result::Result<(), ConflictableTransactionError<Error>> {
    let encoded = encode(value).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(value.get_id().as_bytes().to_vec(), encoded)?;
    Ok(())
}
