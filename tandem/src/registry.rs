//! Canonical-name registry.
//!
//! Maps each stable logical index name to its adapter. Built once during
//! program initialization via [`RegistryBuilder`] and immutable after
//! that; lookups need no locking because nothing mutates.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::client::{DocumentAdapter, MultiplexAdapter, VersionCache};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Registration for one index family.
#[derive(Debug, Clone)]
pub struct AdapterSpec {
    pub canonical_name: String,
    pub index_name: String,
    /// Physical secondary index during a live migration.
    pub secondary: Option<String>,
    pub doc_type: String,
    pub mapping: Value,
    pub analysis: Value,
    pub settings_key: Option<String>,
    /// Dual-write to the secondary. Ignored without a secondary.
    pub multiplexed: bool,
    /// Swap primary and secondary roles (used once a migration's
    /// reindex has caught up and reads should move over).
    pub swapped: bool,
}

impl AdapterSpec {
    pub fn new(
        canonical_name: impl Into<String>,
        index_name: impl Into<String>,
        doc_type: impl Into<String>,
        mapping: Value,
    ) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            index_name: index_name.into(),
            secondary: None,
            doc_type: doc_type.into(),
            mapping,
            analysis: Value::Null,
            settings_key: None,
            multiplexed: false,
            swapped: false,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_analysis(mut self, analysis: Value) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_settings_key(mut self, settings_key: impl Into<String>) -> Self {
        self.settings_key = Some(settings_key.into());
        self
    }

    pub fn multiplexed(mut self, multiplexed: bool) -> Self {
        self.multiplexed = multiplexed;
        self
    }

    pub fn swapped(mut self, swapped: bool) -> Self {
        self.swapped = swapped;
        self
    }
}

/// The adapter registered for a canonical name.
pub enum IndexAdapter {
    Single(DocumentAdapter),
    Multiplexed(MultiplexAdapter),
}

impl IndexAdapter {
    /// The adapter serving reads.
    pub fn read_adapter(&self) -> &DocumentAdapter {
        match self {
            Self::Single(adapter) => adapter,
            Self::Multiplexed(mux) => &mux.primary,
        }
    }
}

pub struct RegistryBuilder {
    transport: Arc<dyn Transport>,
    version: Arc<VersionCache>,
    specs: Vec<AdapterSpec>,
}

impl RegistryBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            version: VersionCache::new(),
            specs: Vec::new(),
        }
    }

    pub fn register(mut self, spec: AdapterSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(mut self) -> Result<Registry> {
        let mut map = HashMap::new();
        for spec in std::mem::take(&mut self.specs) {
            if map.contains_key(&spec.canonical_name) {
                return Err(Error::Config(format!(
                    "duplicate canonical name: {}",
                    spec.canonical_name
                )));
            }
            let adapter = self.create_adapter(&spec)?;
            map.insert(spec.canonical_name, adapter);
        }
        Ok(Registry { map })
    }

    /// Wire up the adapter for one registration.
    ///
    /// A secondary plus the `multiplexed` flag yields a dual-write
    /// adapter; `swapped` reverses the two roles. `swapped` without
    /// `multiplexed` serves the secondary alone (migration complete,
    /// family not yet re-registered under its new name).
    fn create_adapter(&self, spec: &AdapterSpec) -> Result<IndexAdapter> {
        let primary = self.document_adapter(spec, &spec.index_name)?;
        let Some(secondary_name) = &spec.secondary else {
            return Ok(IndexAdapter::Single(primary));
        };
        let secondary = self.document_adapter(spec, secondary_name)?;
        Ok(match (spec.multiplexed, spec.swapped) {
            (true, false) => IndexAdapter::Multiplexed(MultiplexAdapter::new(primary, secondary)),
            (true, true) => IndexAdapter::Multiplexed(MultiplexAdapter::new(secondary, primary)),
            (false, true) => IndexAdapter::Single(secondary),
            (false, false) => IndexAdapter::Single(primary),
        })
    }

    fn document_adapter(&self, spec: &AdapterSpec, index_name: &str) -> Result<DocumentAdapter> {
        let mut adapter = DocumentAdapter::new(
            Arc::clone(&self.transport),
            index_name,
            &spec.doc_type,
            &spec.canonical_name,
            spec.mapping.clone(),
        )?
        .with_version_cache(Arc::clone(&self.version));
        if !spec.analysis.is_null() {
            adapter = adapter.with_analysis(spec.analysis.clone());
        }
        if let Some(key) = &spec.settings_key {
            adapter = adapter.with_settings_key(key);
        }
        Ok(adapter)
    }
}

pub struct Registry {
    map: HashMap<String, IndexAdapter>,
}

impl Registry {
    pub fn adapter(&self, canonical_name: &str) -> Result<&IndexAdapter> {
        self.map
            .get(canonical_name)
            .ok_or_else(|| Error::NotFound(format!("no index registered as {canonical_name:?}")))
    }

    /// The multiplexed adapter for a canonical name; an error when the
    /// family has no secondary or multiplexing is not enabled.
    pub fn multiplexed(&self, canonical_name: &str) -> Result<&MultiplexAdapter> {
        match self.adapter(canonical_name)? {
            IndexAdapter::Multiplexed(mux) => Ok(mux),
            IndexAdapter::Single(_) => Err(Error::NotMultiplexed(canonical_name.to_string())),
        }
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}
