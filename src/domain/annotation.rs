//! Typed view of Averbis Health Discovery annotations
//!
//! The text analysis service returns a JSON array of loosely structured records,
//! each discriminated by a fully-qualified `type` name. Only the kinds listed in
//! [`AnnotationKind`] are mapped to FHIR; everything else parses to
//! [`Annotation::Other`] and is ignored by the mappers.
//!
//! Every field below is optional. Which fields are *required* is decided by the
//! mapper that consumes the annotation, not by the parser.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const DIAGNOSIS_TYPE: &str = "de.averbis.types.health.Diagnosis";
pub const MEDICATION_TYPE: &str = "de.averbis.types.health.Medication";
pub const DOCUMENT_ANNOTATION_TYPE: &str = "de.averbis.types.health.DocumentAnnotation";
pub const SMOKING_STATUS_TYPE: &str = "de.medunifreiburg.imbi.mds.extraction.types.Smoking";
pub const KIDNEY_STONE_TYPE: &str = "de.uklfr.KidneyStoneAnnotator.KidneyStoneInfo";

/// Discriminant of the annotation kinds this crate knows how to map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Diagnosis,
    Medication,
    DocumentAnnotation,
    SmokingStatus,
    KidneyStone,
}

impl AnnotationKind {
    /// All known kinds, in a stable order
    pub const ALL: [AnnotationKind; 5] = [
        AnnotationKind::Diagnosis,
        AnnotationKind::Medication,
        AnnotationKind::DocumentAnnotation,
        AnnotationKind::SmokingStatus,
        AnnotationKind::KidneyStone,
    ];

    /// Fully-qualified type name used by the text analysis service
    pub fn type_name(&self) -> &'static str {
        match self {
            AnnotationKind::Diagnosis => DIAGNOSIS_TYPE,
            AnnotationKind::Medication => MEDICATION_TYPE,
            AnnotationKind::DocumentAnnotation => DOCUMENT_ANNOTATION_TYPE,
            AnnotationKind::SmokingStatus => SMOKING_STATUS_TYPE,
            AnnotationKind::KidneyStone => KIDNEY_STONE_TYPE,
        }
    }

    /// Looks up the kind for a type name, `None` for types without a mapper
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == type_name)
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// One annotation returned by the text analysis service
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Diagnosis(DiagnosisAnnotation),
    Medication(MedicationAnnotation),
    DocumentAnnotation(DocumentAnnotation),
    SmokingStatus(SmokingStatusAnnotation),
    KidneyStone(KidneyStoneAnnotation),
    /// Any type without a mapper, or a known type whose body did not parse
    Other { type_name: String },
}

impl Annotation {
    /// Parses a single raw annotation record
    ///
    /// Never fails: records without a `type` become `Other` with an empty type
    /// name, and known kinds whose fields have the wrong JSON shape are logged
    /// and demoted to `Other`.
    pub fn from_value(value: Value) -> Self {
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let Some(kind) = AnnotationKind::from_type_name(&type_name) else {
            return Annotation::Other { type_name };
        };

        let parsed = match kind {
            AnnotationKind::Diagnosis => serde_json::from_value(value).map(Annotation::Diagnosis),
            AnnotationKind::Medication => {
                serde_json::from_value(value).map(Annotation::Medication)
            }
            AnnotationKind::DocumentAnnotation => {
                serde_json::from_value(value).map(Annotation::DocumentAnnotation)
            }
            AnnotationKind::SmokingStatus => {
                serde_json::from_value(value).map(Annotation::SmokingStatus)
            }
            AnnotationKind::KidneyStone => {
                serde_json::from_value(value).map(Annotation::KidneyStone)
            }
        };

        parsed.unwrap_or_else(|e| {
            tracing::warn!(
                annotation_type = %type_name,
                error = %e,
                "Annotation body does not match its type, ignoring it"
            );
            Annotation::Other { type_name }
        })
    }

    /// Parses a full payload array
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Vec<Self> {
        values.into_iter().map(Self::from_value).collect()
    }

    /// The kind of this annotation, `None` for [`Annotation::Other`]
    pub fn kind(&self) -> Option<AnnotationKind> {
        match self {
            Annotation::Diagnosis(_) => Some(AnnotationKind::Diagnosis),
            Annotation::Medication(_) => Some(AnnotationKind::Medication),
            Annotation::DocumentAnnotation(_) => Some(AnnotationKind::DocumentAnnotation),
            Annotation::SmokingStatus(_) => Some(AnnotationKind::SmokingStatus),
            Annotation::KidneyStone(_) => Some(AnnotationKind::KidneyStone),
            Annotation::Other { .. } => None,
        }
    }

    /// The type name as reported by the service
    pub fn type_name(&self) -> &str {
        match self {
            Annotation::Other { type_name } => type_name,
            known => known.kind().map(|k| k.type_name()).unwrap_or_default(),
        }
    }
}

/// Position of an annotation within the analysed text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Span {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub begin: Option<u64>,
    pub end: Option<u64>,
    pub covered_text: Option<String>,
}

/// `de.averbis.types.health.Diagnosis`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosisAnnotation {
    #[serde(flatten)]
    pub span: Span,
    pub unique_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub concept_id: Option<String>,
    pub dict_canon: Option<String>,
    pub source: Option<String>,
    pub clinical_status: Option<String>,
    pub side: Option<String>,
    pub belongs_to: Option<String>,
    /// Text or structure of the negating cue; any non-null value negates
    pub negated_by: Option<Value>,
}

/// `de.averbis.types.health.Medication`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationAnnotation {
    #[serde(flatten)]
    pub span: Span,
    #[serde(deserialize_with = "null_as_empty")]
    pub drugs: Vec<Option<Drug>>,
    pub status: Option<String>,
    pub dose_frequency: Option<DoseFrequency>,
    pub dose_form: Option<Concept>,
    pub date: Option<AnnotatedDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Drug {
    pub covered_text: Option<String>,
    pub ingredient: Option<Ingredient>,
    pub strength: Option<Strength>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ingredient {
    #[serde(
        rename = "conceptID",
        alias = "conceptId",
        deserialize_with = "lenient_string"
    )]
    pub concept_id: Option<String>,
    pub dict_canon: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Strength {
    #[serde(deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    pub unit: Option<String>,
}

/// A dictionary concept, e.g. a dose form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Concept {
    pub dict_canon: Option<String>,
}

/// Dose frequency; which of the fields are filled depends on `interval`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoseFrequency {
    pub interval: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub morning: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub midday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub evening: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub at_night: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub monday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub tuesday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub wednesday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub thursday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub friday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub saturday: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub sunday: Option<f64>,
}

/// A date or date interval attached to an annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotatedDate {
    /// `DATE` or `DATEINTERVAL`
    pub kind: Option<String>,
    pub value: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// `de.averbis.types.health.DocumentAnnotation`, one per analysed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentAnnotation {
    #[serde(flatten)]
    pub span: Span,
    pub version: Option<String>,
    pub language: Option<String>,
}

/// `de.medunifreiburg.imbi.mds.extraction.types.Smoking`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmokingStatusAnnotation {
    #[serde(flatten)]
    pub span: Span,
    pub smoking_status: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub sctid: Option<String>,
}

/// `de.uklfr.KidneyStoneAnnotator.KidneyStoneInfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KidneyStoneAnnotation {
    #[serde(flatten)]
    pub span: Span,
    pub size: Option<StoneSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoneSize {
    pub unit: Option<CoveredText>,
    #[serde(deserialize_with = "lenient_f64")]
    pub value1: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub value2: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoveredText {
    pub covered_text: Option<String>,
}

// The service is not consistent about numbers vs. strings for ids and quantities.

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
