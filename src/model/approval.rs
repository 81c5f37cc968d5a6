use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// The three request families that travel through an approval route.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RequestKind {
    Leave,
    Permission,
    WorkLetter,
}

impl RequestKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Leave => "leave_requests",
            Self::Permission => "permission_requests",
            Self::WorkLetter => "work_letters",
        }
    }

    /// Human label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::Leave => "cuti",
            Self::Permission => "izin",
            Self::WorkLetter => "surat tugas",
        }
    }

    /// Front-end path of a single request.
    pub fn link(self, id: u64) -> String {
        match self {
            Self::Leave => format!("/leave/{id}"),
            Self::Permission => format!("/permissions/{id}"),
            Self::WorkLetter => format!("/work-letters/{id}"),
        }
    }

    /// Parses the path segment used by the approval endpoints (`leave`,
    /// `permission`, `work-letter`) as well as the stored form.
    pub fn from_path(segment: &str) -> Option<Self> {
        segment.replace('-', "_").parse().ok()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

/// One recorded decision on one step of a request.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Approval {
    pub id: u64,
    pub step_order: u32,
    #[schema(example = "SUPERVISOR")]
    pub role_code: String,
    pub approver_id: u64,
    pub approver_name: String,
    #[schema(example = "APPROVED")]
    pub decision: String,
    pub note: Option<String>,
    pub decided_at: NaiveDateTime,
}
