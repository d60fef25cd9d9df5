//! Member domain model.
//!
//! # Responsibility
//! - Define the canonical family-member record and its draft form.
//! - Provide the natural key used for duplicate-person detection.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another member.
//! - Birth/death years, when set, stay within [`MIN_YEAR`, `MAX_YEAR`].
//! - A member belongs to exactly one family scope for its whole lifetime.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every family member.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type MemberId = Uuid;

/// Stable identifier for one family scope.
pub type FamilyId = Uuid;

/// Lower bound for plausible birth/death years.
pub const MIN_YEAR: i32 = 1000;
/// Upper bound for plausible birth/death years.
pub const MAX_YEAR: i32 = 2100;

/// Member gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

/// Member marital status.
///
/// `Unknown` exists for synthesized placeholder parents, whose status is
/// never known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
    Unknown,
}

/// Validation failures for member records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    /// Full name is blank after trim.
    BlankFullName,
    /// Birth year outside the plausible range.
    BirthYearOutOfRange(i32),
    /// Death year outside the plausible range.
    DeathYearOutOfRange(i32),
    /// Death year earlier than birth year.
    DeathBeforeBirth { birth_year: i32, death_year: i32 },
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankFullName => write!(f, "member full name must not be blank"),
            Self::BirthYearOutOfRange(year) => {
                write!(f, "birth year {year} outside [{MIN_YEAR}, {MAX_YEAR}]")
            }
            Self::DeathYearOutOfRange(year) => {
                write!(f, "death year {year} outside [{MIN_YEAR}, {MAX_YEAR}]")
            }
            Self::DeathBeforeBirth {
                birth_year,
                death_year,
            } => write!(
                f,
                "death year {death_year} earlier than birth year {birth_year}"
            ),
        }
    }
}

impl Error for MemberValidationError {}

/// Canonical persisted family-member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable global ID used for edge endpoints and auditing.
    pub uuid: MemberId,
    /// Owning family scope. Edges never cross this boundary.
    pub family_uuid: FamilyId,
    /// Display name.
    pub full_name: String,
    /// Optional birth year. Drives sibling clustering and tree ordering.
    pub birth_year: Option<i32>,
    /// Optional death year. Presence implies the member is deceased.
    pub death_year: Option<i32>,
    /// Free-text living place. `"Unknown"` for synthesized parents.
    pub living_place: String,
    pub marital_status: MaritalStatus,
    pub gender: Gender,
    /// Optional free-text occupation.
    pub occupation: Option<String>,
    /// Set only by sibling inference for placeholder parents, so they can
    /// be recognized without re-matching on the synthetic name pattern.
    pub is_synthetic: bool,
}

impl Member {
    /// Returns whether the member is recorded as deceased.
    pub fn is_deceased(&self) -> bool {
        self.death_year.is_some()
    }

    /// Returns the natural key identifying this person for dedup lookups.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            full_name: self.full_name.clone(),
            birth_year: self.birth_year,
            living_place: self.living_place.clone(),
            family_uuid: self.family_uuid,
        }
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        validate_fields(&self.full_name, self.birth_year, self.death_year)
    }
}

/// Unsaved member shape handed to the store for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    pub family_uuid: FamilyId,
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub living_place: String,
    pub marital_status: MaritalStatus,
    pub gender: Gender,
    pub occupation: Option<String>,
    pub is_synthetic: bool,
}

impl MemberDraft {
    /// Creates a draft with the given name and every optional field unset.
    pub fn new(family_uuid: FamilyId, full_name: impl Into<String>) -> Self {
        Self {
            family_uuid,
            full_name: full_name.into(),
            birth_year: None,
            death_year: None,
            living_place: String::new(),
            marital_status: MaritalStatus::Single,
            gender: Gender::Unknown,
            occupation: None,
            is_synthetic: false,
        }
    }

    /// Returns the natural key this draft would occupy once persisted.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            full_name: self.full_name.clone(),
            birth_year: self.birth_year,
            living_place: self.living_place.clone(),
            family_uuid: self.family_uuid,
        }
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        validate_fields(&self.full_name, self.birth_year, self.death_year)
    }

    /// Materializes the draft into a persisted member with a fresh ID.
    pub fn into_member(self, uuid: MemberId) -> Member {
        Member {
            uuid,
            family_uuid: self.family_uuid,
            full_name: self.full_name,
            birth_year: self.birth_year,
            death_year: self.death_year,
            living_place: self.living_place,
            marital_status: self.marital_status,
            gender: self.gender,
            occupation: self.occupation,
            is_synthetic: self.is_synthetic,
        }
    }
}

/// Duplicate-person detection key.
///
/// The (name, birth year, living place, family) tuple is the system's
/// only defense against duplicate people: creation must look this key up
/// before inserting a new row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub living_place: String,
    pub family_uuid: FamilyId,
}

fn validate_fields(
    full_name: &str,
    birth_year: Option<i32>,
    death_year: Option<i32>,
) -> Result<(), MemberValidationError> {
    if full_name.trim().is_empty() {
        return Err(MemberValidationError::BlankFullName);
    }
    if let Some(year) = birth_year {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(MemberValidationError::BirthYearOutOfRange(year));
        }
    }
    if let Some(year) = death_year {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(MemberValidationError::DeathYearOutOfRange(year));
        }
    }
    if let (Some(birth), Some(death)) = (birth_year, death_year) {
        if death < birth {
            return Err(MemberValidationError::DeathBeforeBirth {
                birth_year: birth,
                death_year: death,
            });
        }
    }
    Ok(())
}
