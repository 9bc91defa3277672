//! Desired state: the configuration document and the topology parsed from it.
//!
//! ```yaml
//! web_server:
//!   description: public web tier
//!   options:
//!     vpc: vpc-123
//!     rules:
//!       - "tcp port 80, 443 0.0.0.0/0"
//!       - "tcp port 22 10.0.0.1/32"
//! ```

use crate::error::{Error, Result};
use crate::rule::{self, Rule};
use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

/// Description used when a group does not set one; the API rejects empty ones.
pub const DEFAULT_DESCRIPTION: &str = "managed by roadhouse";

/// Serialization format of a desired-state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick a format from a file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => DocumentFormat::Json,
            Some("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "YAML",
            DocumentFormat::Json => "JSON",
            DocumentFormat::Toml => "TOML",
        }
    }
}

/// Options block of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
    /// VPC the group lives in; groups without one are unscoped
    #[serde(default)]
    pub vpc: Option<String>,
    /// Rule lines in the rule grammar
    #[serde(default)]
    pub rules: Vec<String>,
}

/// One group entry as written in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: GroupOptions,
}

/// The whole desired-state document: group name to group entry, in file order.
///
/// Group names are unique; a repeated key is a format error rather than a
/// silent overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    #[serde(deserialize_with = "unique_groups")]
    pub groups: IndexMap<String, GroupDocument>,
}

fn unique_groups<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, GroupDocument>, D::Error>
where
    D: Deserializer<'de>,
{
    struct GroupsVisitor;

    impl<'de> Visitor<'de> for GroupsVisitor {
        type Value = IndexMap<String, GroupDocument>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of group names to group entries")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut groups = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, group)) = map.next_entry::<String, GroupDocument>()? {
                if groups.contains_key(&name) {
                    return Err(de::Error::custom(format!("duplicate group '{name}'")));
                }
                groups.insert(name, group);
            }
            Ok(groups)
        }
    }

    deserializer.deserialize_map(GroupsVisitor)
}

impl Document {
    /// Deserialize a document from text.
    pub fn from_str_with_format(content: &str, format: DocumentFormat) -> Result<Self> {
        let invalid = |message: String| Error::DocumentFormat {
            format: format.name(),
            message,
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match format {
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| invalid(e.to_string())),
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| invalid(e.to_string())),
            DocumentFormat::Toml => toml::from_str(content).map_err(|e| invalid(e.to_string())),
        }
    }

    /// Read and deserialize a document, picking the format from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::DocumentIo {
            path: path.to_path_buf(),
            source,
        })?;
        let format = DocumentFormat::from_path(path);
        log::debug!("Loading {} document from {}", format.name(), path.display());
        Self::from_str_with_format(&content, format)
    }
}

/// A group in the desired topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSpec {
    pub name: String,
    pub description: String,
    pub vpc: Option<String>,
    /// Expanded rules, in document order
    pub rules: Vec<Rule>,
}

impl GroupSpec {
    /// Create a group with the default description and no rules.
    pub fn new(name: impl Into<String>, vpc: Option<String>) -> Self {
        Self {
            name: name.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
            vpc,
            rules: Vec::new(),
        }
    }
}

/// The parsed desired topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DesiredState {
    pub groups: Vec<GroupSpec>,
}

impl DesiredState {
    /// Parse every rule line of a document. Fails on the first grammar error.
    pub fn load(document: &Document) -> Result<Self> {
        let mut groups = Vec::with_capacity(document.groups.len());

        for (name, entry) in &document.groups {
            let mut rules = Vec::new();
            for line in &entry.options.rules {
                let parsed = rule::parse(line).map_err(|source| Error::Grammar {
                    group: name.clone(),
                    line: line.clone(),
                    source,
                })?;
                rules.extend(parsed);
            }

            let description = entry
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESCRIPTION)
                .to_string();

            groups.push(GroupSpec {
                name: name.clone(),
                description,
                vpc: entry.options.vpc.clone(),
                rules,
            });
        }

        log::debug!(
            "Loaded {} desired groups with {} rules",
            groups.len(),
            groups.iter().map(|g| g.rules.len()).sum::<usize>()
        );
        Ok(Self { groups })
    }

    /// Find a group by name.
    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Total number of expanded rules.
    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|g| g.rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{GroupRef, Target};
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
web_server:
  options:
    vpc: vpc-123
    rules:
      - "tcp port 80, 443 0.0.0.0/0"
      - "tcp port 22 10.0.0.1/32"
app:
  description: application tier
  options:
    rules:
      - "tcp port 8080 web_server"
empty: {}
"#;

    fn load(content: &str) -> Result<DesiredState> {
        DesiredState::load(&Document::from_str_with_format(content, DocumentFormat::Yaml)?)
    }

    #[test]
    fn test_load_expands_rules_in_order() {
        let desired = load(SAMPLE).unwrap();
        let web = desired.group("web_server").unwrap();
        assert_eq!(web.vpc.as_deref(), Some("vpc-123"));
        assert_eq!(web.rules.len(), 3);
        assert_eq!(web.rules[0].from_port(), 80);
        assert_eq!(web.rules[1].from_port(), 443);
        assert_eq!(web.rules[2].from_port(), 22);
        assert_eq!(desired.rule_count(), 4);
    }

    #[test]
    fn test_groups_keep_document_order() {
        let desired = load(SAMPLE).unwrap();
        let names: Vec<_> = desired.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["web_server", "app", "empty"]);
    }

    #[test]
    fn test_missing_description_defaults() {
        let desired = load(SAMPLE).unwrap();
        assert_eq!(desired.group("web_server").unwrap().description, DEFAULT_DESCRIPTION);
        assert_eq!(desired.group("app").unwrap().description, "application tier");
    }

    #[test]
    fn test_blank_description_defaults() {
        let desired = load("g:\n  description: '  '\n").unwrap();
        assert_eq!(desired.groups[0].description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_group_without_rules_is_legal() {
        let desired = load("test_no_description:\n  options: {}\n").unwrap();
        assert_eq!(desired.groups.len(), 1);
        assert!(desired.groups[0].rules.is_empty());
        assert!(desired.groups[0].vpc.is_none());
    }

    #[test]
    fn test_name_reference_left_unresolved() {
        let desired = load(SAMPLE).unwrap();
        let app = desired.group("app").unwrap();
        assert_eq!(app.rules[0].target, Target::Group(GroupRef::Name("web_server".into())));
    }

    #[test]
    fn test_grammar_error_bubbles_with_context() {
        let err = load("bad:\n  options:\n    rules:\n      - \"tcp port 90-80 10.0.0.1\"\n")
            .unwrap_err();
        match err {
            Error::Grammar { group, source, .. } => {
                assert_eq!(group, "bad");
                assert_eq!(source.fragment, "90-80");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_document() {
        assert!(load("").unwrap().is_empty());
    }

    #[test]
    fn test_json_and_toml_documents() {
        let json = r#"{"db": {"options": {"vpc": "vpc-1", "rules": ["tcp port 5432 app"]}}}"#;
        let desired =
            DesiredState::load(&Document::from_str_with_format(json, DocumentFormat::Json).unwrap())
                .unwrap();
        assert_eq!(desired.groups[0].rules.len(), 1);

        let toml = "[db.options]\nvpc = \"vpc-1\"\nrules = [\"udp port 53 10.0.0.2\"]\n";
        let desired =
            DesiredState::load(&Document::from_str_with_format(toml, DocumentFormat::Toml).unwrap())
                .unwrap();
        assert_eq!(desired.groups[0].vpc.as_deref(), Some("vpc-1"));
    }

    #[test]
    fn test_invalid_document_shape() {
        let err = Document::from_str_with_format("- just\n- a list\n", DocumentFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, Error::DocumentFormat { format: "YAML", .. }));
    }

    #[test]
    fn test_repeated_group_is_rejected() {
        let yaml = "web:\n  options:\n    rules: [\"tcp port 22 10.0.0.1\"]\n\
                    web:\n  options:\n    rules: [\"tcp port 80 0.0.0.0/0\"]\n";
        let err = Document::from_str_with_format(yaml, DocumentFormat::Yaml).unwrap_err();
        match err {
            Error::DocumentFormat { format, message } => {
                assert_eq!(format, "YAML");
                assert!(message.contains("duplicate group 'web'"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let json = r#"{"web": {"options": {"rules": ["tcp port 22 10.0.0.1"]}},
                       "web": {"options": {"rules": ["tcp port 80 0.0.0.0/0"]}}}"#;
        let err = Document::from_str_with_format(json, DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, Error::DocumentFormat { format: "JSON", .. }));
        assert!(err.to_string().contains("duplicate group 'web'"));
    }

    #[test]
    fn test_from_path_picks_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("groups.json");
        std::fs::write(&path, r#"{"web": {}}"#).unwrap();
        let doc = Document::from_path(&path).unwrap();
        assert!(doc.groups.contains_key("web"));

        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.TOML")), DocumentFormat::Toml);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Document::from_path(Path::new("/nonexistent/groups.yaml")).unwrap_err();
        assert!(matches!(err, Error::DocumentIo { .. }));
    }
}
