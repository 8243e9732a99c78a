use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::ReviewError;

// ---------------------------------------------------------------------------
// Top-level config (as written on disk)
// ---------------------------------------------------------------------------

/// Review configuration: maps symbolic names to platform-specific ids.
///
/// Every id is optional at parse time; [`ReviewConfig::validate`] turns the
/// config into [`ReviewIds`] and reports the first missing name.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    #[serde(default, deserialize_with = "opt_id")]
    pub reviewing_org_id: Option<String>,
    /// Organizations whose reports are listed.
    #[serde(default, deserialize_with = "id_list")]
    pub orgs: Vec<String>,
    /// Live view refresh period.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default)]
    pub tags: TagConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    /// Owning org id → visibility scope (sharing group) id for reply records.
    #[serde(default, deserialize_with = "id_map")]
    pub visibility: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagConfig {
    #[serde(default, deserialize_with = "opt_id")]
    pub approved: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub threat_report: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub info_request: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub score: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub monitor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateConfig {
    #[serde(default, deserialize_with = "opt_id")]
    pub key_event: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub threat_report: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub scoring: Option<String>,
}

fn default_refresh_secs() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// Validated ids
// ---------------------------------------------------------------------------

/// Fully resolved ids used by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewIds {
    pub approved_tag_id: String,
    pub threat_report_tag_id: String,
    pub info_request_tag_id: String,
    pub score_tag_id: String,
    pub monitor_tag_id: String,
    pub key_event_object_template_id: String,
    pub threat_report_object_template_id: String,
    pub scoring_object_template_id: String,
    pub reviewing_org_id: String,
    pub visibility: BTreeMap<String, String>,
}

impl ReviewIds {
    /// Visibility scope for reply records addressed to `org_id`.
    pub fn visibility_scope(&self, org_id: &str) -> Result<&str, ReviewError> {
        self.visibility
            .get(org_id)
            .map(String::as_str)
            .ok_or_else(|| ReviewError::MissingConfiguration(format!("visibility_scope_id for org {org_id}")))
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReviewConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReviewError> {
        toml::from_str(input).map_err(|e| ReviewError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<ReviewIds, ReviewError> {
        fn required(value: &Option<String>, name: &str) -> Result<String, ReviewError> {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ReviewError::MissingConfiguration(name.to_string()))
        }

        Ok(ReviewIds {
            approved_tag_id: required(&self.tags.approved, "approved_tag_id")?,
            threat_report_tag_id: required(&self.tags.threat_report, "threat_report_tag_id")?,
            info_request_tag_id: required(&self.tags.info_request, "info_request_tag_id")?,
            score_tag_id: required(&self.tags.score, "score_tag_id")?,
            monitor_tag_id: required(&self.tags.monitor, "monitor_tag_id")?,
            key_event_object_template_id: required(&self.templates.key_event, "key_event_object_template_id")?,
            threat_report_object_template_id: required(
                &self.templates.threat_report,
                "threat_report_object_template_id",
            )?,
            scoring_object_template_id: required(&self.templates.scoring, "scoring_object_template_id")?,
            reviewing_org_id: required(&self.reviewing_org_id, "reviewing_org_id")?,
            visibility: self.visibility.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Ids may be written as TOML strings or integers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(RawId::into_string))
}

fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Vec::<RawId>::deserialize(d)?.into_iter().map(RawId::into_string).collect())
}

fn id_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
    Ok(BTreeMap::<String, RawId>::deserialize(d)?
        .into_iter()
        .map(|(k, v)| (k, v.into_string()))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
