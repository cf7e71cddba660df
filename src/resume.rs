use serde::{Deserialize, Serialize};

use crate::jobs::null_as_default;

/// Candidate resume. Only `about`, `skills` and `projects` feed the
/// semantic summary; the rest is carried through unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Resume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferred_locations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<Skill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub about: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
}

/// A skill is either `{"name": .., "level": ..}` or a bare value. `name`
/// may be any JSON value; numbers and booleans are rendered as written.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Skill {
    Named {
        name: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<serde_json::Value>,
    },
    Plain(String),
    Other(serde_json::Value),
}

impl Skill {
    pub fn label(&self) -> String {
        match self {
            Skill::Named { name, .. } => match name {
                serde_json::Value::String(name) => name.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            },
            Skill::Plain(name) => name.clone(),
            Skill::Other(value) => value.to_string(),
        }
    }
}

/// Projects without a string `description` are ignored by the summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Project {
    Described {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        description: String,
    },
    Other(serde_json::Value),
}

impl Project {
    pub fn description(&self) -> Option<&str> {
        match self {
            Project::Described { description, .. } => Some(description.as_str()),
            Project::Other(_) => None,
        }
    }
}

impl Resume {
    /// Text used as the semantic query: about, skill names, then project
    /// descriptions, space separated.
    pub fn summary(&self) -> String {
        let skills = self
            .skills
            .iter()
            .map(Skill::label)
            .collect::<Vec<_>>()
            .join(" ");
        let projects = self
            .projects
            .iter()
            .filter_map(Project::description)
            .collect::<Vec<_>>()
            .join(" ");

        [self.about.as_str(), skills.as_str(), projects.as_str()].join(" ")
    }
}
