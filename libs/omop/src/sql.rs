//! Cohort SQL generation

use crate::catalog::checked_schema;
use crate::error::{Error, Result};
use crate::mapping::MappingSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Clinical event tables a cohort can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CohortDomain {
    Condition,
    Drug,
    Measurement,
    Procedure,
    Observation,
    Device,
    Visit,
}

impl CohortDomain {
    pub const ALL: [CohortDomain; 7] = [
        CohortDomain::Condition,
        CohortDomain::Drug,
        CohortDomain::Measurement,
        CohortDomain::Procedure,
        CohortDomain::Observation,
        CohortDomain::Device,
        CohortDomain::Visit,
    ];

    /// OMOP `domain_id` value.
    pub fn domain_id(self) -> &'static str {
        match self {
            CohortDomain::Condition => "Condition",
            CohortDomain::Drug => "Drug",
            CohortDomain::Measurement => "Measurement",
            CohortDomain::Procedure => "Procedure",
            CohortDomain::Observation => "Observation",
            CohortDomain::Device => "Device",
            CohortDomain::Visit => "Visit",
        }
    }

    pub fn from_domain_id(domain_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.domain_id() == domain_id)
    }

    fn table(self) -> &'static str {
        match self {
            CohortDomain::Condition => "condition_occurrence",
            CohortDomain::Drug => "drug_exposure",
            CohortDomain::Measurement => "measurement",
            CohortDomain::Procedure => "procedure_occurrence",
            CohortDomain::Observation => "observation",
            CohortDomain::Device => "device_exposure",
            CohortDomain::Visit => "visit_occurrence",
        }
    }

    fn concept_column(self) -> &'static str {
        match self {
            CohortDomain::Condition => "condition_concept_id",
            CohortDomain::Drug => "drug_concept_id",
            CohortDomain::Measurement => "measurement_concept_id",
            CohortDomain::Procedure => "procedure_concept_id",
            CohortDomain::Observation => "observation_concept_id",
            CohortDomain::Device => "device_concept_id",
            CohortDomain::Visit => "visit_concept_id",
        }
    }

    fn cte_name(self) -> String {
        format!("{}_events", self.domain_id().to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    pub schema: String,
    /// Emit only the concept set lookup instead of the cohort query.
    pub concept_set_only: bool,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            schema: "cdm".to_string(),
            concept_set_only: false,
        }
    }
}

fn id_list(ids: &BTreeSet<i64>) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn header(summary: &MappingSummary) -> String {
    let mut out = String::new();
    for mapping in &summary.valuesets {
        let _ = writeln!(
            out,
            "-- {} ({}): {} concept(s)",
            mapping.oid,
            mapping.display_name.as_deref().unwrap_or("unnamed"),
            mapping.concept_ids.len()
        );
    }
    out
}

pub fn generate_sql(summary: &MappingSummary, options: &SqlOptions) -> Result<String> {
    let schema = checked_schema(&options.schema)?;
    let all_ids = summary.concept_ids();
    if all_ids.is_empty() {
        return Err(Error::EmptyConceptSet);
    }

    let mut sql = header(summary);

    if options.concept_set_only {
        let _ = write!(
            sql,
            "SELECT concept_id, concept_name, domain_id, vocabulary_id, concept_code\n\
             FROM {schema}.concept\n\
             WHERE concept_id IN ({})\n\
             ORDER BY domain_id, concept_id;\n",
            id_list(&all_ids)
        );
        return Ok(sql);
    }

    let by_domain = summary.concept_ids_by_domain();
    let mut cohort: Vec<(CohortDomain, &BTreeSet<i64>)> = by_domain
        .iter()
        .filter_map(|(domain_id, ids)| CohortDomain::from_domain_id(domain_id).map(|d| (d, ids)))
        .collect();
    cohort.sort_by_key(|(domain, _)| *domain);

    if cohort.is_empty() {
        let found: Vec<&str> = by_domain.keys().map(String::as_str).collect();
        return Err(Error::NoCohortDomains(found.join(", ")));
    }

    let ctes: Vec<String> = cohort
        .iter()
        .map(|(domain, ids)| {
            format!(
                "{} AS (\n    SELECT person_id\n    FROM {schema}.{}\n    WHERE {} IN ({})\n)",
                domain.cte_name(),
                domain.table(),
                domain.concept_column(),
                id_list(ids)
            )
        })
        .collect();
    let unions: Vec<String> = cohort
        .iter()
        .map(|(domain, _)| format!("    SELECT person_id FROM {}", domain.cte_name()))
        .collect();

    let _ = write!(
        sql,
        "WITH {}\nSELECT DISTINCT person_id\nFROM (\n{}\n) cohort\nORDER BY person_id;\n",
        ctes.join(",\n"),
        unions.join("\n    UNION\n")
    );
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_ids_round_trip() {
        for domain in CohortDomain::ALL {
            assert_eq!(CohortDomain::from_domain_id(domain.domain_id()), Some(domain));
        }
        assert_eq!(CohortDomain::from_domain_id("Spec Anatomic Site"), None);
    }

    #[test]
    fn cte_names_are_lowercase() {
        assert_eq!(CohortDomain::Condition.cte_name(), "condition_events");
        assert_eq!(CohortDomain::Drug.table(), "drug_exposure");
    }

    #[test]
    fn options_default_to_cdm_schema() {
        let options: SqlOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, SqlOptions::default());
        assert_eq!(options.schema, "cdm");
    }
}
