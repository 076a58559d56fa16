//! # Customer Registry Contract
//!
//! Maps a customer id to the content hash anchored for it.
//!
//! | Function             | Arguments                   | Returns             |
//! |----------------------|-----------------------------|---------------------|
//! | `create_customer`    | `id: String, hash: String`  | `Void`              |
//! | `get_customer_by_id` | `id: String`                | `Map {hash, id}`    |
//! | `update_customer`    | `id: String, hash: Option`  | `Void`              |
//!
//! Entries are stored under `Vec[Symbol("Customer"), String(id)]`.
//!
//! Reads never fail: an unknown id yields a customer whose `id` and `hash`
//! are both empty. Callers must treat an empty hash as "no anchor".
//! `create_customer` overwrites an existing entry, and `update_customer`
//! with no hash rewrites the entry unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use anchorbook_protocol::config::{FN_CREATE_CUSTOMER, FN_GET_CUSTOMER, FN_UPDATE_CUSTOMER};
use anchorbook_protocol::ledger::{ContractHost, ContractStorage, HostError, ScVal};

/// Storage key prefix for customer entries.
pub const CUSTOMER_KEY: &str = "Customer";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument {index} must be a string, got {kind}")]
    NotAString { index: usize, kind: &'static str },

    /// A stored entry does not decode as a customer.
    #[error("corrupt customer entry for {0}")]
    CorruptEntry(String),
}

// ---------------------------------------------------------------------------
// Customer
// ---------------------------------------------------------------------------

/// The on-ledger anchor for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub hash: String,
}

impl Customer {
    /// The value returned for ids that were never registered.
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            hash: String::new(),
        }
    }

    pub fn to_scval(&self) -> ScVal {
        ScVal::map([
            (ScVal::symbol("id"), ScVal::string(&self.id)),
            (ScVal::symbol("hash"), ScVal::string(&self.hash)),
        ])
    }

    pub fn from_scval(value: &ScVal) -> Option<Self> {
        let id = value.get("id")?.as_str()?;
        let hash = value.get("hash")?.as_str()?;
        Some(Self {
            id: id.to_string(),
            hash: hash.to_string(),
        })
    }
}

fn storage_key(id: &str) -> ScVal {
    ScVal::Vec(vec![ScVal::symbol(CUSTOMER_KEY), ScVal::string(id)])
}

// ---------------------------------------------------------------------------
// CustomerRegistry
// ---------------------------------------------------------------------------

/// The customer-registry contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerRegistry;

impl CustomerRegistry {
    pub fn create_customer(storage: &mut ContractStorage, id: String, hash: String) {
        let customer = Customer { id, hash };
        tracing::debug!(id = %customer.id, hash = %customer.hash, "registry: created customer");
        storage.insert(storage_key(&customer.id), customer.to_scval());
    }

    pub fn get_customer_by_id(
        storage: &ContractStorage,
        id: &str,
    ) -> Result<Customer, ContractError> {
        match storage.get(&storage_key(id)) {
            Some(stored) => {
                Customer::from_scval(stored).ok_or_else(|| ContractError::CorruptEntry(id.into()))
            }
            None => Ok(Customer::empty()),
        }
    }

    /// Overwrite the hash of `id`. An unknown id is registered on the fly
    /// with the given hash (or an empty one).
    pub fn update_customer(
        storage: &mut ContractStorage,
        id: &str,
        new_hash: Option<String>,
    ) -> Result<(), ContractError> {
        let mut customer = Self::get_customer_by_id(storage, id)?;
        customer.id = id.to_string();
        if let Some(hash) = new_hash {
            customer.hash = hash;
        }
        storage.insert(storage_key(id), customer.to_scval());
        tracing::debug!(%id, "registry: updated customer");
        Ok(())
    }
}

impl ContractHost for CustomerRegistry {
    fn call(
        &self,
        storage: &mut ContractStorage,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, HostError> {
        let invalid = |e: ContractError| HostError::InvalidArguments {
            function: function.to_string(),
            reason: e.to_string(),
        };

        match function {
            FN_CREATE_CUSTOMER => {
                arity(args, 2).map_err(invalid)?;
                let id = string_arg(args, 0).map_err(invalid)?;
                let hash = string_arg(args, 1).map_err(invalid)?;
                Self::create_customer(storage, id, hash);
                Ok(ScVal::Void)
            }
            FN_GET_CUSTOMER => {
                arity(args, 1).map_err(invalid)?;
                let id = string_arg(args, 0).map_err(invalid)?;
                Self::get_customer_by_id(storage, &id)
                    .map(|c| c.to_scval())
                    .map_err(|e| HostError::Trap(e.to_string()))
            }
            FN_UPDATE_CUSTOMER => {
                arity(args, 2).map_err(invalid)?;
                let id = string_arg(args, 0).map_err(invalid)?;
                let hash = optional_string_arg(args, 1).map_err(invalid)?;
                Self::update_customer(storage, &id, hash)
                    .map_err(|e| HostError::Trap(e.to_string()))?;
                Ok(ScVal::Void)
            }
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

fn arity(args: &[ScVal], expected: usize) -> Result<(), ContractError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ContractError::Arity {
            expected,
            got: args.len(),
        })
    }
}

fn string_arg(args: &[ScVal], index: usize) -> Result<String, ContractError> {
    match &args[index] {
        ScVal::String(s) => Ok(s.clone()),
        other => Err(ContractError::NotAString {
            index,
            kind: other.kind(),
        }),
    }
}

fn optional_string_arg(args: &[ScVal], index: usize) -> Result<Option<String>, ContractError> {
    match &args[index] {
        ScVal::Void => Ok(None),
        _ => string_arg(args, index).map(Some),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_reads_as_empty_customer() {
        let storage = ContractStorage::new();
        let c = CustomerRegistry::get_customer_by_id(&storage, "ghost").unwrap();
        assert_eq!(c, Customer::empty());
    }

    #[test]
    fn create_then_read() {
        let mut storage = ContractStorage::new();
        CustomerRegistry::create_customer(&mut storage, "c1".into(), "h1".into());
        let c = CustomerRegistry::get_customer_by_id(&storage, "c1").unwrap();
        assert_eq!(c.hash, "h1");
        assert_eq!(c.id, "c1");
    }

    #[test]
    fn update_without_hash_keeps_old_hash() {
        let mut storage = ContractStorage::new();
        CustomerRegistry::create_customer(&mut storage, "c1".into(), "h1".into());
        CustomerRegistry::update_customer(&mut storage, "c1", None).unwrap();
        assert_eq!(
            CustomerRegistry::get_customer_by_id(&storage, "c1").unwrap().hash,
            "h1"
        );
    }

    #[test]
    fn storage_key_shape() {
        let mut storage = ContractStorage::new();
        CustomerRegistry::create_customer(&mut storage, "c1".into(), "h1".into());
        let key = ScVal::Vec(vec![ScVal::symbol("Customer"), ScVal::string("c1")]);
        assert!(storage.contains_key(&key));
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let mut storage = ContractStorage::new();
        storage.insert(storage_key("c1"), ScVal::U32(1));
        assert_eq!(
            CustomerRegistry::get_customer_by_id(&storage, "c1").unwrap_err(),
            ContractError::CorruptEntry("c1".into())
        );
    }

    #[test]
    fn customer_scval_round_trip() {
        let c = Customer {
            id: "c1".into(),
            hash: "h1".into(),
        };
        assert_eq!(Customer::from_scval(&c.to_scval()), Some(c));
        assert_eq!(Customer::from_scval(&ScVal::Void), None);
    }
}
