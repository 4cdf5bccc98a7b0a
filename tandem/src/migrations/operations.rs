use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::client::ClusterManager;
use crate::config::TuningOverrides;
use crate::error::{Error, Result};
use crate::settings::render_index_tuning_settings;

/// Everything an operation needs from its environment: the cluster
/// manager and the environment's tuning override layers.
#[derive(Clone, Copy)]
pub struct MigrationContext<'a> {
    pub manager: &'a ClusterManager,
    pub tuning: &'a TuningOverrides,
}

/// A version-gated, reversible schema operation, consumed by a generic
/// migration runner.
pub enum MigrationOperation {
    CreateIndex(CreateIndex),
    DeleteIndex(DeleteIndex),
    UpdateIndexMapping(UpdateIndexMapping),
}

impl MigrationOperation {
    pub fn run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        match self {
            Self::CreateIndex(op) => op.run(ctx),
            Self::DeleteIndex(op) => op.run(ctx),
            Self::UpdateIndexMapping(op) => op.run(ctx),
        }
    }

    pub fn reverse_run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        match self {
            Self::CreateIndex(op) => op.reverse_run(ctx),
            Self::DeleteIndex(op) => op.reverse_run(ctx),
            Self::UpdateIndexMapping(op) => op.reverse_run(),
        }
    }

    /// Deterministic label for audit logs.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateIndex(op) => op.describe(),
            Self::DeleteIndex(op) => op.describe(),
            Self::UpdateIndexMapping(op) => op.describe(),
        }
    }
}

/// Engine-major-version gate shared by all operations. An empty set
/// applies everywhere; a non-member live version makes the operation a
/// documented no-op so one migration file replays safely across engine
/// upgrades.
fn skip_for_version(
    es_versions: &[u64],
    ctx: MigrationContext<'_>,
    describe: &str,
) -> Result<bool> {
    if es_versions.is_empty() {
        return Ok(false);
    }
    let major = ctx.manager.elastic_major_version()?;
    if es_versions.contains(&major) {
        return Ok(false);
    }
    info!(
        operation = describe,
        engine_major = major,
        gate = ?es_versions,
        "skipping operation: engine version not in gate"
    );
    Ok(true)
}

fn meta_created_now() -> Value {
    json!(Utc::now().to_rfc3339())
}

pub struct CreateIndex {
    pub index: String,
    pub doc_type: String,
    /// The doc type's mapping body; may already carry `_meta`.
    pub mapping: Value,
    pub analysis: Value,
    pub settings_key: Option<String>,
    pub comment: Option<String>,
    pub es_versions: Vec<u64>,
}

impl CreateIndex {
    pub fn run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        if skip_for_version(&self.es_versions, ctx, &self.describe())? {
            return Ok(());
        }
        let metadata = self.render_index_metadata(ctx.tuning)?;
        ctx.manager.index_create(&self.index, Some(&metadata))
    }

    pub fn reverse_run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        if skip_for_version(&self.es_versions, ctx, &self.describe())? {
            return Ok(());
        }
        ctx.manager.index_delete(&self.index)
    }

    pub fn describe(&self) -> String {
        format!("Create Elasticsearch index {:?}", self.index)
    }

    /// Full index metadata, built fresh on every run: the caller's
    /// mapping, a new `_meta.created` timestamp (always overwritten), an
    /// optional `_meta.comment` (only overwritten when supplied), the
    /// analysis block, and the layered tuning settings.
    pub fn render_index_metadata(&self, tuning: &TuningOverrides) -> Result<Value> {
        let mut mapping = self.mapping.clone();
        if !mapping.is_object() {
            return Err(Error::Validation(format!(
                "invalid mapping for index {:?}: {mapping}",
                self.index
            )));
        }
        let meta = mapping
            .as_object_mut()
            .expect("checked above")
            .entry("_meta")
            .or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        meta["created"] = meta_created_now();
        if let Some(comment) = &self.comment {
            meta["comment"] = json!(comment);
        }
        let index_settings =
            render_index_tuning_settings(self.settings_key.as_deref(), tuning)?;
        let mut settings = json!({ "index": index_settings });
        if !self.analysis.is_null() {
            settings["analysis"] = self.analysis.clone();
        }
        Ok(json!({
            "mappings": { (self.doc_type.as_str()): mapping },
            "settings": settings,
        }))
    }
}

/// Parameters captured at authoring time that make a `DeleteIndex`
/// reversible.
pub struct ReverseParams {
    pub doc_type: String,
    pub mapping: Value,
    pub analysis: Value,
    pub settings_key: Option<String>,
}

pub struct DeleteIndex {
    pub index: String,
    pub reverse_params: Option<ReverseParams>,
    pub es_versions: Vec<u64>,
}

impl DeleteIndex {
    pub fn run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        if skip_for_version(&self.es_versions, ctx, &self.describe())? {
            return Ok(());
        }
        ctx.manager.index_delete(&self.index)
    }

    pub fn reverse_run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        let Some(params) = &self.reverse_params else {
            return Err(Error::Irreversible(self.describe()));
        };
        let create = CreateIndex {
            index: self.index.clone(),
            doc_type: params.doc_type.clone(),
            mapping: params.mapping.clone(),
            analysis: params.analysis.clone(),
            settings_key: params.settings_key.clone(),
            comment: None,
            es_versions: self.es_versions.clone(),
        };
        create.run(ctx)
    }

    pub fn describe(&self) -> String {
        format!("Delete Elasticsearch index {:?}", self.index)
    }
}

pub struct UpdateIndexMapping {
    pub index: String,
    pub doc_type: String,
    /// New `properties` for the doc type.
    pub properties: Value,
    pub comment: Option<String>,
    pub es_versions: Vec<u64>,
}

impl UpdateIndexMapping {
    /// Fetch the live mapping (never a cached copy), replace only the
    /// `properties` and `_meta` keys, and put it back. `_meta.created`
    /// is always refreshed; `_meta.comment` is only overwritten when
    /// explicitly supplied. Every other top-level mapping key is left
    /// untouched. A response without the acknowledgement flag fails
    /// loudly rather than passing as a silent success.
    pub fn run(&self, ctx: MigrationContext<'_>) -> Result<()> {
        if skip_for_version(&self.es_versions, ctx, &self.describe())? {
            return Ok(());
        }
        let live = ctx
            .manager
            .index_get_mapping(&self.index, &self.doc_type)?
            .unwrap_or_else(|| json!({}));
        let mut mapping = live;
        if !mapping.is_object() {
            return Err(Error::Engine(format!(
                "invalid live mapping for index {:?}: {mapping}",
                self.index
            )));
        }
        let object = mapping.as_object_mut().expect("checked above");
        let meta = object.entry("_meta").or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        meta["created"] = meta_created_now();
        if let Some(comment) = &self.comment {
            meta["comment"] = json!(comment);
        }
        object.insert("properties".to_string(), self.properties.clone());
        ctx.manager
            .index_put_mapping(&self.index, &self.doc_type, &mapping)
    }

    pub fn reverse_run(&self) -> Result<()> {
        Err(Error::Irreversible(self.describe()))
    }

    pub fn describe(&self) -> String {
        format!(
            "Update mapping for doc type {:?} on index {:?}",
            self.doc_type, self.index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_op(comment: Option<&str>) -> CreateIndex {
        CreateIndex {
            index: "users-2024".into(),
            doc_type: "user".into(),
            mapping: json!({"properties": {"name": {"type": "text"}},
                            "_meta": {"comment": "original comment"}}),
            analysis: json!({"analyzer": {"default": {"type": "whitespace"}}}),
            settings_key: None,
            comment: comment.map(str::to_owned),
            es_versions: vec![],
        }
    }

    #[test]
    fn metadata_always_stamps_created() {
        let metadata = create_op(None)
            .render_index_metadata(&TuningOverrides::default())
            .unwrap();
        let meta = &metadata["mappings"]["user"]["_meta"];
        assert!(meta["created"].is_string());
        // absent comment argument preserves whatever pre-existed
        assert_eq!(meta["comment"], "original comment");
    }

    #[test]
    fn metadata_comment_overwritten_only_when_supplied() {
        let metadata = create_op(Some("reshard to 10"))
            .render_index_metadata(&TuningOverrides::default())
            .unwrap();
        let meta = &metadata["mappings"]["user"]["_meta"];
        assert_eq!(meta["comment"], "reshard to 10");
    }

    #[test]
    fn metadata_carries_analysis_and_tuning() {
        let metadata = create_op(None)
            .render_index_metadata(&TuningOverrides::default())
            .unwrap();
        assert_eq!(metadata["settings"]["index"]["number_of_shards"], 5);
        assert_eq!(
            metadata["settings"]["analysis"]["analyzer"]["default"]["type"],
            "whitespace"
        );
    }

    #[test]
    fn describe_labels_are_deterministic() {
        assert_eq!(
            create_op(None).describe(),
            "Create Elasticsearch index \"users-2024\""
        );
        let delete = DeleteIndex {
            index: "users-2024".into(),
            reverse_params: None,
            es_versions: vec![],
        };
        assert_eq!(
            delete.describe(),
            "Delete Elasticsearch index \"users-2024\""
        );
    }
}
