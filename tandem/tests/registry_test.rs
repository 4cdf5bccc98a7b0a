//! Registry wiring: canonical-name lookup and the four
//! multiplexed/swapped adapter combinations.

mod common;

use serde_json::json;

use common::FakeTransport;
use tandem::registry::{AdapterSpec, IndexAdapter, RegistryBuilder};
use tandem::Error;

fn spec() -> AdapterSpec {
    AdapterSpec::new(
        "users",
        "users-v1",
        "user",
        json!({"properties": {"name": {"type": "text"}}}),
    )
}

#[test]
fn single_adapter_serves_the_primary() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(spec())
        .build()
        .unwrap();
    let adapter = registry.adapter("users").unwrap();
    assert!(matches!(adapter, IndexAdapter::Single(_)));
    assert_eq!(adapter.read_adapter().index_name(), "users-v1");
}

#[test]
fn unknown_canonical_name_is_not_found() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(spec())
        .build()
        .unwrap();
    assert!(matches!(registry.adapter("forms"), Err(Error::NotFound(_))));
}

#[test]
fn duplicate_canonical_names_are_rejected() {
    let result = RegistryBuilder::new(FakeTransport::new())
        .register(spec())
        .register(spec())
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn multiplexed_writes_primary_first() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(spec().with_secondary("users-v2").multiplexed(true))
        .build()
        .unwrap();
    let mux = registry.multiplexed("users").unwrap();
    assert_eq!(mux.primary.index_name(), "users-v1");
    assert_eq!(mux.secondary.index_name(), "users-v2");
}

#[test]
fn swapped_multiplexed_reverses_the_roles() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(
            spec()
                .with_secondary("users-v2")
                .multiplexed(true)
                .swapped(true),
        )
        .build()
        .unwrap();
    let mux = registry.multiplexed("users").unwrap();
    assert_eq!(mux.primary.index_name(), "users-v2");
    assert_eq!(mux.secondary.index_name(), "users-v1");
}

#[test]
fn swapped_without_multiplexing_serves_the_secondary_alone() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(spec().with_secondary("users-v2").swapped(true))
        .build()
        .unwrap();
    let adapter = registry.adapter("users").unwrap();
    assert!(matches!(adapter, IndexAdapter::Single(_)));
    assert_eq!(adapter.read_adapter().index_name(), "users-v2");
}

#[test]
fn single_families_are_not_multiplexed() {
    let registry = RegistryBuilder::new(FakeTransport::new())
        .register(spec())
        .build()
        .unwrap();
    assert!(matches!(
        registry.multiplexed("users"),
        Err(Error::NotMultiplexed(_))
    ));
}
