use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project whose participants collaborate in groups and sprints.
///
/// Projects are the top-level organizational unit. Their configuration
/// (type, participation mode, deadlines) decides which roster mutations
/// are allowed at any given moment; see [`crate::policy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub project_type: ProjectType,
    pub participation_mode: ParticipationMode,
    /// Whether students may create groups and request to join them on their own.
    pub allow_self_formation: bool,
    /// After this instant no new join requests are accepted.
    pub join_deadline: Option<DateTime<Utc>>,
    /// After this instant group rosters are frozen.
    pub form_group_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a project is worked on in groups or individually.
///
/// Group operations are only meaningful for `Team` projects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    #[default]
    Team,
    Solo,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Solo => "solo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "team" => Some(Self::Team),
            "solo" => Some(Self::Solo),
            _ => None,
        }
    }
}

/// Whether participants are required to take part in a project.
///
/// - `Mandatory`: participants can never leave their group on their own
/// - `Optional`: participants may leave while the formation deadline is open
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationMode {
    #[default]
    Mandatory,
    Optional,
}

impl ParticipationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Optional => "optional",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mandatory" => Some(Self::Mandatory),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }
}

/// Input for creating a new project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    #[serde(default)]
    pub project_type: ProjectType,
    #[serde(default)]
    pub participation_mode: ParticipationMode,
    #[serde(default)]
    pub allow_self_formation: bool,
    #[serde(default)]
    pub join_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub form_group_deadline: Option<DateTime<Utc>>,
}

/// Input for updating an existing project. All fields are optional for partial updates.
///
/// Deadlines use a nested option: absent leaves the deadline untouched,
/// `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_mode: Option<ParticipationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_self_formation: Option<bool>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub join_deadline: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub form_group_deadline: Option<Option<DateTime<Utc>>>,
}
