use super::error::{ResolveError, ResolverLoadError};
use std::collections::HashMap;
use std::path::Path;

/// Maps an object name, scoped by its type, to a numeric device id
pub trait ObjectResolver: Send + Sync {
    fn resolve(&self, obj_type: &str, obj_name: &str) -> Result<u64, ResolveError>;
}

/// Resolver backed by a fixed table
///
/// The JSON form groups names by object type:
/// `{"drive": {"/dev/sdb": 12, "/dev/sdc": 13}}`
#[derive(Debug, Clone, Default)]
pub struct StaticObjectResolver {
    objects: HashMap<String, HashMap<String, u64>>,
}

impl StaticObjectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, obj_type: &str, obj_name: &str, id: u64) -> Self {
        self.objects
            .entry(obj_type.to_string())
            .or_default()
            .insert(obj_name.to_string(), id);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ResolverLoadError> {
        let objects = serde_json::from_str(json)?;
        Ok(Self { objects })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResolverLoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ResolverLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.objects.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectResolver for StaticObjectResolver {
    fn resolve(&self, obj_type: &str, obj_name: &str) -> Result<u64, ResolveError> {
        self.objects
            .get(obj_type)
            .and_then(|names| names.get(obj_name))
            .copied()
            .ok_or_else(|| ResolveError::Unknown {
                obj_type: obj_type.to_string(),
                obj_name: obj_name.to_string(),
            })
    }
}
