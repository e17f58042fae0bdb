use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server identifier
///
/// The API is inconsistent about identifier types and sends some ids as JSON
/// numbers and others as strings. Both decode into the same textual form and
/// compare equal by it; each id is serialized back in the form it arrived in.
#[derive(Debug, Clone)]
pub struct Id {
    value: String,
    numeric: bool,
}

impl Id {
    /// Textual id, serialized as a JSON string
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            value: id.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<u64> for Id {
    fn from(id: u64) -> Self {
        Self {
            value: id.to_string(),
            numeric: true,
        }
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric
            && let Ok(n) = self.value.parse::<i64>()
        {
            return serializer.serialize_i64(n);
        }
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self {
                value: n.to_string(),
                numeric: true,
            },
            Raw::Text(s) => Self::new(s),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Int(i64),
    Text(String),
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

/// Account returned by sign-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub login: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

/// POST /user/signin request
#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub login: &'a str,
    /// Hex-encoded MD5 of the password, as the server expects
    pub password: String,
}

/// POST /user/signin response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentOwner {
    pub login: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentAccount {
    pub id: Id,
    pub login: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Id>,
    #[serde(default)]
    pub create_at: Option<String>,
    #[serde(default)]
    pub owner: Option<StudentOwner>,
    #[serde(default)]
    pub user: Option<StudentAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateStudent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub birth_date: String,
    pub genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStudent {
    pub student_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub birth_date: String,
    pub genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingGroup {
    pub id: Id,
    pub name: String,
}

/// Training sheet (workout plan)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSheet {
    pub id: Id,
    pub name: String,
    #[serde(default, rename = "canceled_at")]
    pub canceled_at: Option<String>,
    #[serde(default, rename = "create_at")]
    pub create_at: Option<String>,
    #[serde(default)]
    pub training_group: Vec<TrainingGroup>,
}

impl TrainingSheet {
    pub fn is_active(&self) -> bool {
        self.canceled_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTrainingSheet {
    pub student_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrainingSheet {
    pub training_sheet_id: Id,
    pub name: String,
    pub actived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseGroup {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub demo: Option<String>,
    #[serde(default)]
    pub group: Option<ExerciseGroup>,
}

/// Exercise assigned to a training group of a sheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingExercise {
    pub id: Id,
    #[serde(default)]
    pub exercise_id: Option<Id>,
    pub repetitions: String,
    #[serde(deserialize_with = "number_or_string")]
    pub series: String,
    #[serde(default, rename = "trainingGroup_id")]
    pub training_group_id: Option<Id>,
    pub exercise: Exercise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddTrainingExercise {
    pub series: u32,
    pub repetitions: String,
    pub training_group_id: Id,
    pub exercise_id: Id,
}

/// Health questionnaire filled in for a student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anamnesis {
    pub id: Id,
    pub student_id: Id,
    #[serde(flatten)]
    pub answers: AnamnesisAnswers,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnamnesisAnswers {
    pub physical_activity: bool,
    #[serde(default)]
    pub what_physical_activity: String,
    #[serde(default)]
    pub how_many_times_week: u32,
    pub alcoholic_beverages: bool,
    pub smoker: bool,
    pub back_problems: bool,
    pub high_cholesterol: bool,
    #[serde(default)]
    pub hdl_cholesterol: f64,
    #[serde(default)]
    pub ldl_cholesterol: f64,
    pub hypertensive: bool,
    pub high_triglycerides: bool,
    pub diabetes: bool,
    pub breathing_problems: bool,
    #[serde(default)]
    pub what_breathing_problems: String,
    pub cardiac_alteration: bool,
    #[serde(default)]
    pub what_cardiac_alteration: String,
    pub medical_restrictions: bool,
    #[serde(default)]
    pub what_medical_restrictions: String,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateAnamnesis {
    pub student_id: Id,
    #[serde(flatten)]
    pub answers: AnamnesisAnswers,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpdateAnamnesis {
    pub id: Id,
    #[serde(flatten)]
    pub answers: AnamnesisAnswers,
}

/// Physical assessment. Only the identifying fields are typed; measurements
/// are kept as returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub id: Id,
    #[serde(default)]
    pub student_id: Option<Id>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}
