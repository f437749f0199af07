use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Declares a closed string enumeration stored as TEXT and sent as a JSON string.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "must be one of {}; got {:?}",
                        [$($text),+].join(", "),
                        other
                    )),
                }
            }
        }
    };
}

string_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

string_enum!(
    /// Which students a fee applies to.
    FeeGender {
        Male => "Male",
        Female => "Female",
        Both => "Both",
    }
);

impl FeeGender {
    pub fn applies_to(self, gender: Gender) -> bool {
        match self {
            FeeGender::Both => true,
            FeeGender::Male => gender == Gender::Male,
            FeeGender::Female => gender == Gender::Female,
        }
    }
}

string_enum!(FeeType {
    Admission => "admission",
    Education => "education",
    Exam => "exam",
    Term => "term",
    Utilities => "utilities",
    Other => "other",
});

string_enum!(SubjectType {
    Core => "Core",
    Elective => "Elective",
    CoCurricular => "Co-curricular",
});

string_enum!(Audience {
    Admin => "Admin",
    Teachers => "Teachers",
    Both => "Both",
});

string_enum!(Role {
    Admin => "admin",
    Teacher => "teacher",
});

/// Fees embedded on a class document before fees became their own collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClassFees {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilities: Option<f64>,
}

impl LegacyClassFees {
    pub fn entries(&self) -> Vec<(FeeType, f64)> {
        [
            (FeeType::Exam, self.exam),
            (FeeType::Admission, self.admission),
            (FeeType::Term, self.term),
            (FeeType::Utilities, self.utilities),
        ]
        .into_iter()
        .filter_map(|(t, v)| v.filter(|amount| *amount != 0.0).map(|amount| (t, amount)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoom {
    pub id: String,
    pub name: String,
    pub section: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_strength: Option<i64>,
    pub subjects: Vec<String>,
    pub fees: LegacyClassFees,
}

impl ClassRoom {
    pub fn label(&self) -> String {
        if self.section.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.section)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExamMarks {
    pub total: f64,
    pub subjects: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    pub admission_no: String,
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub roll_no: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub attendance: BTreeMap<String, bool>,
    pub fees_paid: BTreeMap<FeeType, bool>,
    pub marks: BTreeMap<String, ExamMarks>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    pub expertise: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub is_class_teacher: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTeacherMapping {
    pub id: String,
    pub class_id: String,
    pub teacher_id: String,
    pub assigned_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub class_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub id: String,
    pub class_id: String,
    #[serde(rename = "type")]
    pub fee_type: FeeType,
    pub amount: f64,
    pub applicable_gender: FeeGender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub day: String,
    pub period: i64,
    pub subject: String,
    pub teacher_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTimetable {
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    pub entries: Vec<TimetableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub class_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_marks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passing_marks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub message: String,
    pub created_at: String,
    pub active: bool,
    pub audience: Audience,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

/// Every collection at one point in time. Derived views are computed from this.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub classes: Vec<ClassRoom>,
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub class_timetables: Vec<ClassTimetable>,
    pub notices: Vec<Notice>,
    pub exams: Vec<Exam>,
    pub subjects: Vec<Subject>,
    pub fees: Vec<Fee>,
    pub class_teacher_mappings: Vec<ClassTeacherMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_enums_round_trip_through_text() {
        assert_eq!("Co-curricular".parse::<SubjectType>(), Ok(SubjectType::CoCurricular));
        assert_eq!(FeeType::Utilities.as_str(), "utilities");
        let e = "Unknown".parse::<Gender>().unwrap_err();
        assert!(e.contains("Male, Female, Other"), "{}", e);
    }

    #[test]
    fn fee_gender_matches_students() {
        assert!(FeeGender::Both.applies_to(Gender::Other));
        assert!(FeeGender::Female.applies_to(Gender::Female));
        assert!(!FeeGender::Male.applies_to(Gender::Female));
        assert!(!FeeGender::Male.applies_to(Gender::Other));
    }

    #[test]
    fn legacy_fees_skip_missing_and_zero_amounts() {
        let fees = LegacyClassFees {
            exam: Some(500.0),
            admission: None,
            term: Some(0.0),
            utilities: Some(120.0),
        };
        assert_eq!(
            fees.entries(),
            vec![(FeeType::Exam, 500.0), (FeeType::Utilities, 120.0)]
        );
    }
}
