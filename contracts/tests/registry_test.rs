//! Integration tests for the customer-registry contract, driven through
//! the same `ContractHost` dispatch the ledger uses.

use anchorbook_contracts::{Customer, CustomerRegistry};
use anchorbook_protocol::ledger::{ContractHost, ContractStorage, HostError, ScVal};

fn call(storage: &mut ContractStorage, function: &str, args: Vec<ScVal>) -> Result<ScVal, HostError> {
    CustomerRegistry.call(storage, function, &args)
}

fn read(storage: &mut ContractStorage, id: &str) -> Customer {
    let value = call(storage, "get_customer_by_id", vec![ScVal::string(id)]).unwrap();
    Customer::from_scval(&value).expect("customer-shaped map")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn create_returns_void_and_registers_anchor() {
    let mut storage = ContractStorage::new();
    let out = call(
        &mut storage,
        "create_customer",
        vec![ScVal::string("c1"), ScVal::string("h1")],
    )
    .unwrap();
    assert_eq!(out, ScVal::Void);
    assert_eq!(
        read(&mut storage, "c1"),
        Customer {
            id: "c1".into(),
            hash: "h1".into()
        }
    );
}

#[test]
fn get_returns_struct_shaped_map() {
    let mut storage = ContractStorage::new();
    call(
        &mut storage,
        "create_customer",
        vec![ScVal::string("c1"), ScVal::string("h1")],
    )
    .unwrap();

    let value = call(&mut storage, "get_customer_by_id", vec![ScVal::string("c1")]).unwrap();
    assert_eq!(
        value.to_native(),
        serde_json::json!({ "id": "c1", "hash": "h1" })
    );
}

#[test]
fn absent_customer_decodes_with_empty_hash() {
    let mut storage = ContractStorage::new();
    let value = call(&mut storage, "get_customer_by_id", vec![ScVal::string("nope")]).unwrap();
    assert_eq!(value.to_native(), serde_json::json!({ "id": "", "hash": "" }));
}

#[test]
fn update_overwrites_hash() {
    let mut storage = ContractStorage::new();
    call(
        &mut storage,
        "create_customer",
        vec![ScVal::string("c1"), ScVal::string("h1")],
    )
    .unwrap();
    call(
        &mut storage,
        "update_customer",
        vec![ScVal::string("c1"), ScVal::string("h2")],
    )
    .unwrap();
    assert_eq!(read(&mut storage, "c1").hash, "h2");
}

#[test]
fn update_with_void_hash_keeps_anchor() {
    let mut storage = ContractStorage::new();
    call(
        &mut storage,
        "create_customer",
        vec![ScVal::string("c1"), ScVal::string("h1")],
    )
    .unwrap();
    call(
        &mut storage,
        "update_customer",
        vec![ScVal::string("c1"), ScVal::optional(None)],
    )
    .unwrap();
    assert_eq!(read(&mut storage, "c1").hash, "h1");
}

#[test]
fn update_of_unknown_id_registers_it() {
    let mut storage = ContractStorage::new();
    call(
        &mut storage,
        "update_customer",
        vec![ScVal::string("c9"), ScVal::string("h9")],
    )
    .unwrap();
    let c = read(&mut storage, "c9");
    assert_eq!(c.id, "c9");
    assert_eq!(c.hash, "h9");
}

// ---------------------------------------------------------------------------
// Argument Checking
// ---------------------------------------------------------------------------

#[test]
fn unknown_function_is_rejected() {
    let mut storage = ContractStorage::new();
    let err = call(&mut storage, "delete_customer", vec![]).unwrap_err();
    assert_eq!(err, HostError::UnknownFunction("delete_customer".into()));
}

#[test]
fn wrong_arity_is_rejected() {
    let mut storage = ContractStorage::new();
    let err = call(&mut storage, "create_customer", vec![ScVal::string("c1")]).unwrap_err();
    assert!(matches!(err, HostError::InvalidArguments { ref reason, .. } if reason.contains("expected 2")));
}

#[test]
fn non_string_id_is_rejected() {
    let mut storage = ContractStorage::new();
    let err = call(&mut storage, "get_customer_by_id", vec![ScVal::U32(7)]).unwrap_err();
    assert!(matches!(err, HostError::InvalidArguments { ref reason, .. } if reason.contains("u32")));
    assert!(storage.is_empty());
}
