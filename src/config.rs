//! Which fields of which models require approval
use super::error::ApprovalError;
use std::collections::{BTreeMap, BTreeSet};

/// Resolved set of approvable fields for one model type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSelection {
    include: Option<BTreeSet<String>>, // None means every field
    exclude: BTreeSet<String>,
}

impl FieldSelection {
    pub fn contains(&self, field: &str) -> bool {
        if self.exclude.contains(field) {
            return false;
        }
        match &self.include {
            Some(include) => include.contains(field),
            None => true,
        }
    }
    /// True when no field at all can require approval
    pub fn is_empty(&self) -> bool {
        match &self.include {
            Some(include) => include.iter().all(|f| self.exclude.contains(f)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Overrides the global allowlist when set
    pub approvable_fields: Option<BTreeSet<String>>,
    pub excluded_fields: BTreeSet<String>,
}

/// Approval configuration, resolved once when the engine is built.
///
/// ```json
/// {
///   "excluded_fields": ["updated_at"],
///   "models": { "fake_model": { "approvable_fields": ["name"] }, "user": {} }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub approvable_fields: Option<BTreeSet<String>>,
    pub excluded_fields: BTreeSet<String>,
    pub models: BTreeMap<String, ModelConfig>,
}

impl ApprovalConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_json(text: &str) -> Result<Self, ApprovalError> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn set_approvable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvable_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
    pub fn set_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }
    /// Registers a model type that inherits the global field settings
    pub fn register(mut self, kind: impl Into<String>) -> Self {
        self.models.entry(kind.into()).or_default();
        self
    }
    pub fn set_model(mut self, kind: impl Into<String>, model: ModelConfig) -> Self {
        self.models.insert(kind.into(), model);
        self
    }
    pub fn is_registered(&self, kind: &str) -> bool {
        self.models.contains_key(kind)
    }
    pub fn approvable_fields(&self, kind: &str) -> FieldSelection {
        let model = self.models.get(kind);

        let include = model
            .and_then(|m| m.approvable_fields.clone())
            .or_else(|| self.approvable_fields.clone());

        let mut exclude = self.excluded_fields.clone();
        if let Some(model) = model {
            exclude.extend(model.excluded_fields.iter().cloned());
        }

        FieldSelection { include, exclude }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_approvable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvable_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
    pub fn set_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_approvable_by_default() {
        let selection = ApprovalConfig::new().approvable_fields("anything");
        assert!(selection.contains("name"));
        assert!(!selection.is_empty());
    }

    #[test]
    fn model_override_replaces_global_allowlist() {
        let config = ApprovalConfig::new()
            .set_approvable_fields(["name", "meta"])
            .set_model("fake_model", ModelConfig::new().set_approvable_fields(["name"]));

        assert!(config.approvable_fields("fake_model").contains("name"));
        assert!(!config.approvable_fields("fake_model").contains("meta"));
        assert!(config.approvable_fields("other").contains("meta"));
    }

    #[test]
    fn exclusions_apply_globally_and_per_model() {
        let config = ApprovalConfig::new()
            .set_excluded_fields(["updated_at"])
            .set_model("fake_model", ModelConfig::new().set_excluded_fields(["meta"]));

        let selection = config.approvable_fields("fake_model");
        assert!(selection.contains("name"));
        assert!(!selection.contains("meta"));
        assert!(!selection.contains("updated_at"));
    }

    #[test]
    fn empty_allowlist_disables_approval() {
        let config = ApprovalConfig::new().set_model(
            "log_entry",
            ModelConfig::new().set_approvable_fields(Vec::<String>::new()),
        );
        assert!(config.approvable_fields("log_entry").is_empty());
    }

    #[test]
    fn loads_from_json() {
        let config = ApprovalConfig::from_json(
            r#"{
                "excluded_fields": ["updated_at"],
                "models": { "fake_model": { "approvable_fields": ["name"] }, "user": {} }
            }"#,
        )
        .unwrap();

        assert!(config.is_registered("user"));
        assert!(!config.is_registered("team"));
        assert!(config.approvable_fields("fake_model").contains("name"));
        assert!(!config.approvable_fields("user").contains("updated_at"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            ApprovalConfig::from_json("{\"models\": 3}"),
            Err(ApprovalError::Config(_))
        ));
    }
}
