//! Entity references and lock key derivation

use serde::{Deserialize, Serialize};

use crate::KEY_DELIMITER;
use crate::error::{LockError, Result};

/// Identifies one domain object by data source, model and id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub data_source_name: String,
    pub model_name: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(
        data_source_name: impl Into<String>,
        model_name: impl Into<String>,
        id: impl ToString,
    ) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            model_name: model_name.into(),
            id: id.to_string(),
        }
    }

    pub fn key(&self) -> String {
        LockKeyCodec::derive_key(self)
    }

    /// Rejects empty identity fields and delimiters outside the id, so that
    /// distinct references never share a key
    pub fn validate(&self) -> Result<()> {
        if self.data_source_name.is_empty() {
            return Err(LockError::IllegalArgument("dataSourceName must not be empty".to_string()));
        }
        if self.model_name.is_empty() {
            return Err(LockError::IllegalArgument("modelName must not be empty".to_string()));
        }
        if self.data_source_name.contains(KEY_DELIMITER) {
            return Err(LockError::IllegalArgument(format!(
                "dataSourceName must not contain '{}'",
                KEY_DELIMITER
            )));
        }
        if self.model_name.contains(KEY_DELIMITER) {
            return Err(LockError::IllegalArgument(format!(
                "modelName must not contain '{}'",
                KEY_DELIMITER
            )));
        }
        if self.id.is_empty() {
            return Err(LockError::IllegalArgument("id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Many ids of the same model in the same data source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRef {
    pub ids: Vec<String>,
    pub model_name: String,
    pub data_source_name: String,
}

impl BatchRef {
    pub fn new<I, S>(
        data_source_name: impl Into<String>,
        model_name: impl Into<String>,
        ids: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            ids: ids.into_iter().map(|id| id.to_string()).collect(),
            model_name: model_name.into(),
            data_source_name: data_source_name.into(),
        }
    }
}

/// Input accepted by multi-key operations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LockTarget {
    Entities(Vec<EntityRef>),
    Batch(BatchRef),
}

impl LockTarget {
    /// Flattens the target into individual references, keeping input order
    pub fn into_entities(self) -> Vec<EntityRef> {
        match self {
            LockTarget::Entities(entities) => entities,
            LockTarget::Batch(batch) => LockKeyCodec::expand(&batch),
        }
    }
}

impl From<Vec<EntityRef>> for LockTarget {
    fn from(entities: Vec<EntityRef>) -> Self {
        LockTarget::Entities(entities)
    }
}

impl From<&[EntityRef]> for LockTarget {
    fn from(entities: &[EntityRef]) -> Self {
        LockTarget::Entities(entities.to_vec())
    }
}

impl From<BatchRef> for LockTarget {
    fn from(batch: BatchRef) -> Self {
        LockTarget::Batch(batch)
    }
}

/// Maps entity identities to lock keys of the form `dataSourceName:modelName:id`
pub struct LockKeyCodec;

impl LockKeyCodec {
    /// No normalization is applied; callers pass already-normalized identifiers.
    pub fn derive_key(entity: &EntityRef) -> String {
        format!(
            "{}{}{}{}{}",
            entity.data_source_name, KEY_DELIMITER, entity.model_name, KEY_DELIMITER, entity.id
        )
    }

    pub fn expand(batch: &BatchRef) -> Vec<EntityRef> {
        batch
            .ids
            .iter()
            .map(|id| EntityRef::new(&batch.data_source_name, &batch.model_name, id))
            .collect()
    }

    /// Splits a key on its first two delimiters. The id keeps any further delimiters.
    pub fn parse_key(key: &str) -> Option<EntityRef> {
        let mut parts = key.splitn(3, KEY_DELIMITER);
        let data_source_name = parts.next()?;
        let model_name = parts.next()?;
        let id = parts.next()?;
        Some(EntityRef::new(data_source_name, model_name, id))
    }
}
