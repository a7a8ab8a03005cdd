//! Drug entries to `Medication`

use super::common::{deterministic_identifier, round_quantity, MappingSettings};
use crate::domain::annotation::{Drug, Ingredient};
use crate::domain::AnnotationKind;
use crate::fhir::{
    CodeableConcept, Coding, Medication, MedicationIngredient, Meta, Quantity, Ratio,
};

/// Code system of a drug ingredient, derived from its dictionary source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngredientSource {
    /// Abdamed dictionary, ATC coded; combined products carry several codes joined by `-`
    Atc,
    RxNorm,
}

impl IngredientSource {
    pub fn detect(source: &str) -> Option<Self> {
        let source = source.to_lowercase();
        if source.contains("abdamed") {
            Some(Self::Atc)
        } else if source.contains("rxnorm") {
            Some(Self::RxNorm)
        } else {
            None
        }
    }

    fn system<'a>(&self, settings: &'a MappingSettings) -> &'a str {
        match self {
            Self::Atc => &settings.systems.atc,
            Self::RxNorm => &settings.systems.rxnorm,
        }
    }

    fn codes(&self, concept_id: &str) -> Vec<String> {
        match self {
            Self::Atc => concept_id.split('-').map(String::from).collect(),
            Self::RxNorm => vec![concept_id.to_string()],
        }
    }
}

/// Builds the `Medication` for one drug entry
///
/// Returns `None` when the ingredient lacks a canonical name or a code, or comes
/// from an unknown dictionary. `annotation_id` only labels the log events.
pub fn build_medication(
    settings: &MappingSettings,
    annotation_id: Option<&str>,
    drug: &Drug,
    ingredient: &Ingredient,
    dose_form: Option<&str>,
) -> Option<Medication> {
    let Some(ingredient_name) = ingredient.dict_canon.as_deref() else {
        crate::log_annotation_dropped!("medication", annotation_id, "ingredient has no name");
        return None;
    };

    let source_name = ingredient.source.as_deref().unwrap_or_default();
    let Some(source) = IngredientSource::detect(source_name) else {
        tracing::warn!(
            source = %source_name,
            ingredient = %ingredient_name,
            "Unknown ingredient source, ignoring drug"
        );
        return None;
    };
    let system = source.system(settings);

    let coding: Vec<Coding> = ingredient
        .concept_id
        .as_deref()
        .map(|concept_id| source.codes(concept_id))
        .unwrap_or_default()
        .into_iter()
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .map(|code| Coding {
            system: Some(system.to_string()),
            code: Some(code),
            display: Some(ingredient_name.to_string()),
            ..Default::default()
        })
        .collect();

    if coding.is_empty() {
        crate::log_annotation_dropped!("medication", annotation_id, "ingredient has no code");
        return None;
    }

    let strength = drug_strength(drug);

    let mut identifier_value = ingredient_name.to_string();
    if let Some((value, unit)) = &strength {
        identifier_value.push_str(&format!("_{value}{unit}"));
        if let Some(form) = dose_form {
            identifier_value.push_str(&format!("_{form}"));
        }
    }

    let ingredient_strength = strength.map(|(value, unit)| Ratio {
        numerator: Some(Quantity {
            value: Some(value),
            unit: Some(unit),
            ..Default::default()
        }),
        denominator: dose_form.map(|form| Quantity {
            value: Some(1.0),
            unit: Some(form.to_string()),
            ..Default::default()
        }),
    });

    let (identifier, id) = deterministic_identifier(
        settings.annotation_identifier_system(AnnotationKind::Medication.type_name()),
        identifier_value,
    );

    Some(Medication {
        id,
        meta: Some(Meta::with_profile(&settings.profiles.medication)),
        identifier: vec![identifier],
        code: Some(CodeableConcept {
            coding,
            text: None,
        }),
        ingredient: vec![MedicationIngredient {
            item_codeable_concept: Some(CodeableConcept::from_coding(Coding {
                system: Some(system.to_string()),
                display: Some(ingredient_name.to_string()),
                ..Default::default()
            })),
            strength: ingredient_strength,
        }],
    })
}

/// Rounded strength value and unit, when both are known
pub(crate) fn drug_strength(drug: &Drug) -> Option<(f64, String)> {
    let strength = drug.strength.as_ref()?;
    Some((round_quantity(strength.value?), strength.unit.clone()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::Strength;
    use test_case::test_case;

    fn drug(source: &str, concept_id: &str, strength: Option<(f64, &str)>) -> Drug {
        Drug {
            covered_text: Some("Ramipril 5 mg".to_string()),
            ingredient: Some(Ingredient {
                concept_id: Some(concept_id.to_string()),
                dict_canon: Some("Ramipril".to_string()),
                source: Some(source.to_string()),
            }),
            strength: strength.map(|(value, unit)| Strength {
                value: Some(value),
                unit: Some(unit.to_string()),
            }),
        }
    }

    fn build(drug: &Drug, dose_form: Option<&str>) -> Option<Medication> {
        let ingredient = drug.ingredient.clone().unwrap();
        build_medication(&MappingSettings::default(), Some("7"), drug, &ingredient, dose_form)
    }

    #[test]
    fn test_abdamed_source_splits_atc_codes() {
        let medication = build(&drug("Abdamed-Averbis", "C09AA05-C03AA03", None), None).unwrap();
        let coding = &medication.code.as_ref().unwrap().coding;
        assert_eq!(coding.len(), 2);
        assert_eq!(coding[0].code.as_deref(), Some("C09AA05"));
        assert_eq!(coding[1].code.as_deref(), Some("C03AA03"));
        assert_eq!(coding[0].system.as_deref(), Some("http://fhir.de/CodeSystem/dimdi/atc"));
        assert_eq!(medication.identifier[0].value.as_deref(), Some("Ramipril"));
        assert!(medication.ingredient[0].strength.is_none());
    }

    #[test]
    fn test_rxnorm_source_keeps_single_code() {
        let medication = build(&drug("RxNorm", "35296", None), None).unwrap();
        let coding = &medication.code.as_ref().unwrap().coding;
        assert_eq!(coding.len(), 1);
        assert_eq!(
            coding[0].system.as_deref(),
            Some("http://www.nlm.nih.gov/research/umls/rxnorm")
        );
    }

    #[test]
    fn test_unknown_source_is_dropped() {
        assert!(build(&drug("MeSH", "D017257", None), None).is_none());
    }

    #[test_case(None; "missing")]
    #[test_case(Some(""); "empty")]
    #[test_case(Some(" - "); "only separators")]
    fn test_ingredient_without_code_is_dropped(concept_id: Option<&str>) {
        let mut drug = drug("Abdamed-Averbis", "C09AA05", Some((5.0, "mg")));
        if let Some(ingredient) = drug.ingredient.as_mut() {
            ingredient.concept_id = concept_id.map(String::from);
        }
        assert!(build(&drug, None).is_none());
    }

    #[test]
    fn test_empty_atc_parts_are_skipped() {
        let medication = build(&drug("Abdamed-Averbis", "C09AA05-", None), None).unwrap();
        let coding = &medication.code.as_ref().unwrap().coding;
        assert_eq!(coding.len(), 1);
        assert_eq!(coding[0].code.as_deref(), Some("C09AA05"));
    }

    #[test]
    fn test_identifier_includes_strength_and_dose_form() {
        let with_strength = build(&drug("Abdamed", "C09AA05", Some((5.0, "mg"))), None).unwrap();
        assert_eq!(with_strength.identifier[0].value.as_deref(), Some("Ramipril_5mg"));

        let with_form =
            build(&drug("Abdamed", "C09AA05", Some((5.0, "mg"))), Some("Tablette")).unwrap();
        assert_eq!(
            with_form.identifier[0].value.as_deref(),
            Some("Ramipril_5mg_Tablette")
        );
        assert_ne!(with_strength.id, with_form.id);

        let ratio = with_form.ingredient[0].strength.as_ref().unwrap();
        assert_eq!(ratio.numerator.as_ref().unwrap().value, Some(5.0));
        assert_eq!(
            ratio.denominator.as_ref().unwrap().unit.as_deref(),
            Some("Tablette")
        );
    }

    #[test]
    fn test_strength_is_rounded() {
        let medication =
            build(&drug("Abdamed", "C09AA05", Some((1.111111111111, "g"))), None).unwrap();
        assert_eq!(medication.identifier[0].value.as_deref(), Some("Ramipril_1.11111g"));
    }

    #[test]
    fn test_dose_form_without_strength_is_ignored() {
        let medication = build(&drug("Abdamed", "C09AA05", None), Some("Tablette")).unwrap();
        assert_eq!(medication.identifier[0].value.as_deref(), Some("Ramipril"));
    }
}
