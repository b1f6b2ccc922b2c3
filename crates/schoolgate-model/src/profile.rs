//! Profile records: the application-level description of a principal.
//!
//! A profile is the durable row that gives an account its meaning inside
//! the school portal: display name, role, and the role-specific fields
//! (a student's grade and section, a teacher's subject list). It is
//! created in phase two of sign-up and read back on every session
//! bootstrap.
//!
//! The role-specific fields are stored denormalized on the profile row
//! itself. The write side carries them as a tagged union
//! ([`RoleDetails`]) and merges them into the row by an explicit match
//! on the role; the read side ([`Profile`]) exposes them as optional
//! columns and can reconstruct the union via
//! [`Profile::role_details`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::{UnknownRole, UserId};

// ---------------------------------------------------------------------------
// UserRole
// ---------------------------------------------------------------------------

/// The role a principal holds in the portal.
///
/// A fixed, closed set: roles are assigned once at sign-up and never
/// reassigned afterwards. Every dashboard decision (which views a user
/// sees, which rows they may touch) keys off this value, so it is stored
/// on the profile row in lowercase; `#[serde(rename_all = "lowercase")]`
/// matches the column's convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full administrative access to the portal.
    Admin,
    /// Manages sections, assignments, and grades for assigned subjects.
    Teacher,
    /// Sees their own section, assignments, and grades.
    Student,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        };
        write!(f, "{s}")
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RoleDetails — the role-shaped sign-up payload
// ---------------------------------------------------------------------------

/// Role-specific profile fields collected at sign-up.
///
/// Each role carries different data, so this is a tagged union rather
/// than a bag of optional fields: the compiler forces every consumer to
/// handle exactly the fields that exist for the role at hand, and the
/// merge into the flat profile row happens through one explicit match,
/// never through checking which fields happen to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleDetails {
    /// Administrators carry no extra fields.
    Admin,

    /// Teachers declare the subjects they teach.
    Teacher {
        /// Subject names, e.g. `["Mathematics", "Physics"]`.
        subjects: Vec<String>,
    },

    /// Students declare where they sit in the school.
    Student {
        /// Grade level, e.g. `"10"`.
        grade: String,
        /// Section within the grade, e.g. `"A"`.
        section: String,
    },
}

impl RoleDetails {
    /// The role this payload belongs to.
    pub fn role(&self) -> UserRole {
        match self {
            RoleDetails::Admin => UserRole::Admin,
            RoleDetails::Teacher { .. } => UserRole::Teacher,
            RoleDetails::Student { .. } => UserRole::Student,
        }
    }
}

// ---------------------------------------------------------------------------
// NewProfile — the phase-two insert payload
// ---------------------------------------------------------------------------

/// The profile row inserted in phase two of sign-up.
///
/// Keyed by the identity created in phase one: the profile's primary
/// key IS the user id (one-to-one with the session's principal). If the
/// insert fails, the identity exists without a profile; surfacing that
/// state distinctly is the session layer's job, not this type's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    /// Primary key, shared with the identity record.
    pub user_id: UserId,

    /// Display name shown across the portal.
    pub full_name: String,

    /// Role plus role-specific fields.
    pub details: RoleDetails,
}

impl NewProfile {
    /// Builds the flat JSON row the backend's profile table expects.
    ///
    /// The role-specific columns are merged by an explicit match on the
    /// payload variant. Columns that don't apply to the role are simply
    /// absent from the row (not null-filled).
    pub fn into_row(self) -> serde_json::Value {
        let mut row = serde_json::json!({
            "id": self.user_id,
            "full_name": self.full_name,
            "role": self.details.role(),
        });
        match self.details {
            RoleDetails::Admin => {}
            RoleDetails::Teacher { subjects } => {
                row["subjects"] = subjects.into();
            }
            RoleDetails::Student { grade, section } => {
                row["grade"] = grade.into();
                row["section"] = section.into();
            }
        }
        row
    }
}

// ---------------------------------------------------------------------------
// Profile — the read shape
// ---------------------------------------------------------------------------

/// A profile row as read back from the backend.
///
/// Mirrors the denormalized table: the role-specific columns come back
/// as optional fields, `None` when the column doesn't apply to the row's
/// role (or was never written). The session layer treats the whole
/// record as immutable; profile edits happen in separate settings
/// flows that talk to the backend directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Primary key, identical to the owning identity's [`UserId`].
    pub id: UserId,

    /// Display name.
    pub full_name: String,

    /// The principal's role. Never changes after creation.
    pub role: UserRole,

    /// Optional free-text bio.
    #[serde(default)]
    pub bio: Option<String>,

    /// Optional avatar image reference.
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Student grade level. `None` for non-students.
    #[serde(default)]
    pub grade: Option<String>,

    /// Student section. `None` for non-students.
    #[serde(default)]
    pub section: Option<String>,

    /// Teacher subject list. `None` for non-teachers.
    #[serde(default)]
    pub subjects: Option<Vec<String>>,

    /// Row creation timestamp (set by the backend).
    pub created_at: DateTime<Utc>,

    /// Last update timestamp (set by the backend).
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Reconstructs the role-shaped payload from the flat columns.
    ///
    /// Missing columns fall back to empty values rather than failing:
    /// a student row without a grade is a data problem for an admin
    /// screen, not a reason to refuse the whole profile.
    pub fn role_details(&self) -> RoleDetails {
        match self.role {
            UserRole::Admin => RoleDetails::Admin,
            UserRole::Teacher => RoleDetails::Teacher {
                subjects: self.subjects.clone().unwrap_or_default(),
            },
            UserRole::Student => RoleDetails::Student {
                grade: self.grade.clone().unwrap_or_default(),
                section: self.section.clone().unwrap_or_default(),
            },
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn student_details() -> RoleDetails {
        RoleDetails::Student {
            grade: "10".into(),
            section: "A".into(),
        }
    }

    // =====================================================================
    // UserRole
    // =====================================================================

    #[test]
    fn test_user_role_serializes_lowercase() {
        // The profile table stores roles lowercase; PascalCase here would
        // silently break every role filter in the dashboards.
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::to_string(&UserRole::Teacher).unwrap(),
            "\"teacher\""
        );
        assert_eq!(
            serde_json::to_string(&UserRole::Student).unwrap(),
            "\"student\""
        );
    }

    #[test]
    fn test_user_role_from_str_accepts_known_roles() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("teacher".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert_eq!("student".parse::<UserRole>().unwrap(), UserRole::Student);
    }

    #[test]
    fn test_user_role_from_str_rejects_unknown() {
        let err = "principal".parse::<UserRole>().unwrap_err();
        assert!(err.to_string().contains("principal"));
    }

    #[test]
    fn test_user_role_display_round_trips_through_from_str() {
        for role in [UserRole::Admin, UserRole::Teacher, UserRole::Student] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
    }

    // =====================================================================
    // RoleDetails
    // =====================================================================

    #[test]
    fn test_role_details_role_accessor() {
        assert_eq!(RoleDetails::Admin.role(), UserRole::Admin);
        assert_eq!(
            RoleDetails::Teacher { subjects: vec![] }.role(),
            UserRole::Teacher
        );
        assert_eq!(student_details().role(), UserRole::Student);
    }

    #[test]
    fn test_role_details_student_json_shape() {
        // Internally tagged on "role", so the JSON matches the sign-up
        // form payload: { "role": "student", "grade": "10", "section": "A" }.
        let json: serde_json::Value =
            serde_json::to_value(student_details()).unwrap();
        assert_eq!(json["role"], "student");
        assert_eq!(json["grade"], "10");
        assert_eq!(json["section"], "A");
    }

    // =====================================================================
    // NewProfile::into_row
    // =====================================================================

    #[test]
    fn test_into_row_student_merges_grade_and_section() {
        let row = NewProfile {
            user_id: UserId("u-1".into()),
            full_name: "Ada".into(),
            details: student_details(),
        }
        .into_row();

        assert_eq!(row["id"], "u-1");
        assert_eq!(row["full_name"], "Ada");
        assert_eq!(row["role"], "student");
        assert_eq!(row["grade"], "10");
        assert_eq!(row["section"], "A");
        // Columns for other roles must be absent, not null.
        assert!(row.get("subjects").is_none());
    }

    #[test]
    fn test_into_row_teacher_merges_subjects() {
        let row = NewProfile {
            user_id: UserId("u-2".into()),
            full_name: "Grace".into(),
            details: RoleDetails::Teacher {
                subjects: vec!["Mathematics".into(), "Physics".into()],
            },
        }
        .into_row();

        assert_eq!(row["role"], "teacher");
        assert_eq!(
            row["subjects"],
            serde_json::json!(["Mathematics", "Physics"])
        );
        assert!(row.get("grade").is_none());
        assert!(row.get("section").is_none());
    }

    #[test]
    fn test_into_row_admin_carries_no_role_columns() {
        let row = NewProfile {
            user_id: UserId("u-3".into()),
            full_name: "Root".into(),
            details: RoleDetails::Admin,
        }
        .into_row();

        assert_eq!(row["role"], "admin");
        assert!(row.get("grade").is_none());
        assert!(row.get("section").is_none());
        assert!(row.get("subjects").is_none());
    }

    // =====================================================================
    // Profile
    // =====================================================================

    fn sample_profile(role: UserRole) -> Profile {
        Profile {
            id: UserId("u-1".into()),
            full_name: "Ada".into(),
            role,
            bio: None,
            avatar_url: None,
            grade: Some("10".into()),
            section: Some("A".into()),
            subjects: Some(vec!["Chemistry".into()]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_deserializes_without_optional_columns() {
        // Rows written before a column existed (or for other roles) omit
        // the optional columns entirely; `#[serde(default)]` absorbs that.
        let json = r#"{
            "id": "u-9",
            "full_name": "Alan",
            "role": "admin",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, UserRole::Admin);
        assert!(profile.grade.is_none());
        assert!(profile.subjects.is_none());
        assert!(profile.bio.is_none());
    }

    #[test]
    fn test_role_details_reconstructs_student_fields() {
        let details = sample_profile(UserRole::Student).role_details();
        assert_eq!(
            details,
            RoleDetails::Student {
                grade: "10".into(),
                section: "A".into(),
            }
        );
    }

    #[test]
    fn test_role_details_ignores_foreign_columns() {
        // A teacher row that (wrongly) carries grade/section columns still
        // reconstructs as a Teacher payload.
        let details = sample_profile(UserRole::Teacher).role_details();
        assert_eq!(
            details,
            RoleDetails::Teacher {
                subjects: vec!["Chemistry".into()],
            }
        );
    }

    #[test]
    fn test_role_details_missing_columns_fall_back_to_empty() {
        let mut profile = sample_profile(UserRole::Student);
        profile.grade = None;
        profile.section = None;
        assert_eq!(
            profile.role_details(),
            RoleDetails::Student {
                grade: String::new(),
                section: String::new(),
            }
        );
    }
}
