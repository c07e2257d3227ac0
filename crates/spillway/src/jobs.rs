//! Per-category job generation.
//!
//! Every discovered category value becomes one [`CategoryJob`]: a table
//! holding that category's rows and a view projecting a fixed set of
//! columns from it. Category values are untrusted; they reach SQL only as
//! quoted string literals, and the derived object names only ever contain
//! `[a-z0-9_]` (plus whatever the configured suffixes add).

use std::collections::{BTreeMap, HashSet};

use snafu::prelude::*;
use tracing::warn;

use sluice_core::error::WarehouseError;
use sluice_core::warehouse::{Statement, StatementKind, TableName, quote_identifier, quote_string};

use crate::config::{CollisionPolicy, DerivedConfig};
use crate::error::{CollisionSnafu, InvalidColumnSnafu, InvalidNameSnafu, PlanError};

/// Map a category value to an identifier fragment.
///
/// Lower-cases the value, then replaces every character outside
/// `[a-zA-Z0-9_]` with `_`, one replacement per character.
///
/// ```
/// use spillway::sanitize;
///
/// assert_eq!(sanitize("India"), "india");
/// assert_eq!(sanitize("U.S.A!"), "u_s_a_");
/// assert_eq!(sanitize("Côte d'Ivoire"), "c_te_d_ivoire");
/// ```
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The statements that materialize one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryJob {
    /// Raw category value as discovered.
    pub category: String,
    /// Identifier fragment used in the derived names.
    pub identifier: String,
    pub table: TableName,
    pub view: TableName,
    pub table_statement: Statement,
    pub view_statement: Statement,
}

/// Everything needed to turn a category value into a [`CategoryJob`].
#[derive(Debug, Clone)]
pub struct JobTemplate {
    project: String,
    table_dataset: String,
    view_dataset: String,
    table_suffix: String,
    view_suffix: String,
    staging: TableName,
    partition_column: String,
    projection: String,
    filter: String,
    on_collision: CollisionPolicy,
}

impl JobTemplate {
    /// Build a template, quoting every configured column up front.
    pub fn new(
        project: impl Into<String>,
        staging: TableName,
        partition_column: &str,
        derived: &DerivedConfig,
        on_collision: CollisionPolicy,
    ) -> Result<Self, PlanError> {
        let projection = derived
            .view_columns
            .iter()
            .map(|column| {
                Ok(format!(
                    "  {} AS {}",
                    quote_identifier(&column.name)?,
                    quote_identifier(&column.alias)?
                ))
            })
            .collect::<Result<Vec<_>, WarehouseError>>()
            .context(InvalidColumnSnafu)?
            .join(",\n");

        let filter = format!(
            "{} = {}",
            quote_identifier(&derived.filter_column).context(InvalidColumnSnafu)?,
            if derived.filter_value { "TRUE" } else { "FALSE" }
        );

        Ok(Self {
            project: project.into(),
            table_dataset: derived.table_dataset.clone(),
            view_dataset: derived.view_dataset().to_string(),
            table_suffix: derived.table_suffix.clone(),
            view_suffix: derived.view_suffix.clone(),
            staging,
            partition_column: quote_identifier(partition_column).context(InvalidColumnSnafu)?,
            projection,
            filter,
            on_collision,
        })
    }

    /// Build the job for one category, using its sanitized name.
    pub fn generate(&self, category: &str) -> Result<CategoryJob, PlanError> {
        self.generate_as(category, sanitize(category))
    }

    fn generate_as(&self, category: &str, identifier: String) -> Result<CategoryJob, PlanError> {
        let name = |dataset: &str, suffix: &str| {
            TableName::new(
                self.project.as_str(),
                dataset,
                format!("{identifier}{suffix}"),
            )
            .context(InvalidNameSnafu { category })
        };
        let table = name(&self.table_dataset, &self.table_suffix)?;
        let view = name(&self.view_dataset, &self.view_suffix)?;

        let table_statement = Statement::new(
            StatementKind::CreateTable,
            format!(
                "CREATE OR REPLACE TABLE {table} AS\nSELECT * FROM {staging}\nWHERE {column} = {value}",
                table = table.quoted(),
                staging = self.staging.quoted(),
                column = self.partition_column,
                value = quote_string(category),
            ),
        );

        let view_statement = Statement::new(
            StatementKind::CreateView,
            format!(
                "CREATE OR REPLACE VIEW {view} AS\nSELECT\n{projection}\nFROM {table}\nWHERE {filter}",
                view = view.quoted(),
                projection = self.projection,
                table = table.quoted(),
                filter = self.filter,
            ),
        );

        Ok(CategoryJob {
            category: category.to_string(),
            identifier,
            table,
            view,
            table_statement,
            view_statement,
        })
    }

    /// Build one job per category, in discovery order.
    ///
    /// Fails without building anything if two values collide and the
    /// policy is [`CollisionPolicy::Reject`].
    pub fn plan(&self, categories: &[String]) -> Result<Vec<CategoryJob>, PlanError> {
        let identifiers = assign_identifiers(categories, self.on_collision)?;
        categories
            .iter()
            .zip(identifiers)
            .map(|(category, identifier)| self.generate_as(category, identifier))
            .collect()
    }
}

fn assign_identifiers(
    categories: &[String],
    policy: CollisionPolicy,
) -> Result<Vec<String>, PlanError> {
    let mut identifiers: Vec<String> = categories.iter().map(|c| sanitize(c)).collect();

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, identifier) in identifiers.iter().enumerate() {
        groups.entry(identifier.clone()).or_default().push(index);
    }
    groups.retain(|_, members| members.len() > 1);

    if groups.is_empty() {
        return Ok(identifiers);
    }

    if policy == CollisionPolicy::Reject {
        let groups: Vec<String> = groups
            .iter()
            .map(|(identifier, members)| {
                let values: Vec<String> = members
                    .iter()
                    .map(|&i| format!("{:?}", categories[i]))
                    .collect();
                format!("{identifier}: {}", values.join(", "))
            })
            .collect();
        return CollisionSnafu { groups }.fail();
    }

    let mut used: HashSet<String> = identifiers.iter().cloned().collect();
    for (base, mut members) in groups {
        members.sort_by(|&a, &b| categories[a].cmp(&categories[b]));

        let mut n = 2;
        for &index in &members[1..] {
            let candidate = loop {
                let candidate = format!("{base}_{n}");
                n += 1;
                if used.insert(candidate.clone()) {
                    break candidate;
                }
            };
            warn!(
                category = %categories[index],
                identifier = %candidate,
                "Category collides with another after sanitizing, renamed"
            );
            identifiers[index] = candidate;
        }
    }

    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewColumn;

    fn derived() -> DerivedConfig {
        serde_yaml::from_str("table_dataset: Data_Engineering").unwrap()
    }

    fn template(policy: CollisionPolicy) -> JobTemplate {
        JobTemplate::new(
            "proj",
            "proj.staging_data.global_data".parse().unwrap(),
            "country",
            &derived(),
            policy,
        )
        .unwrap()
    }

    fn categories(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("India"), "india");
        assert_eq!(sanitize("U.S.A!"), "u_s_a_");
        assert_eq!(sanitize("Bosnia and Herzegovina"), "bosnia_and_herzegovina");
        assert_eq!(sanitize("already_safe_01"), "already_safe_01");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_is_pure() {
        for value in ["India", "U.S.A!", "Türkiye", "x' OR '1'='1"] {
            assert_eq!(sanitize(value), sanitize(value));
            assert!(
                sanitize(value)
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            );
        }
    }

    #[test]
    fn test_sanitize_replaces_per_character() {
        // One underscore per non-ASCII scalar value
        assert_eq!(sanitize("Türkiye"), "t_rkiye");
        assert_eq!(sanitize("日本"), "__");
    }

    #[test]
    fn test_generate_table_statement() {
        let job = template(CollisionPolicy::Reject).generate("India").unwrap();

        assert_eq!(job.identifier, "india");
        assert_eq!(job.table.to_string(), "proj.Data_Engineering.india_table");
        assert_eq!(job.view.to_string(), "proj.Data_Engineering.india_view");
        assert_eq!(job.table_statement.kind, StatementKind::CreateTable);
        assert_eq!(
            job.table_statement.sql,
            "CREATE OR REPLACE TABLE `proj.Data_Engineering.india_table` AS\n\
             SELECT * FROM `proj.staging_data.global_data`\n\
             WHERE `country` = 'India'"
        );
    }

    #[test]
    fn test_generate_view_statement() {
        let job = template(CollisionPolicy::Reject).generate("India").unwrap();

        assert_eq!(job.view_statement.kind, StatementKind::CreateView);
        assert_eq!(
            job.view_statement.sql,
            "CREATE OR REPLACE VIEW `proj.Data_Engineering.india_view` AS\n\
             SELECT\n  \
             `Year` AS `year`,\n  \
             `Disease Name` AS `disease_name`,\n  \
             `Disease Category` AS `disease_category`,\n  \
             `Prevalence Rate` AS `prevalence_rate`,\n  \
             `Incidence Rate` AS `incidence_rate`\n\
             FROM `proj.Data_Engineering.india_table`\n\
             WHERE `Availability of Vaccines Treatment` = FALSE"
        );
    }

    #[test]
    fn test_category_value_is_quoted_not_spliced() {
        let job = template(CollisionPolicy::Reject)
            .generate("Cote d'Ivoire' OR '1'='1")
            .unwrap();

        assert!(
            job.table_statement
                .sql
                .ends_with(r"WHERE `country` = 'Cote d\'Ivoire\' OR \'1\'=\'1'")
        );
        assert_eq!(job.identifier, "cote_d_ivoire__or__1___1");
    }

    #[test]
    fn test_separate_view_dataset_and_columns() {
        let mut derived = derived();
        derived.view_dataset = Some("reporting".to_string());
        derived.view_columns = vec![ViewColumn::new("Year", "year")];
        derived.filter_value = true;

        let job = JobTemplate::new(
            "proj",
            "proj.staging_data.global_data".parse().unwrap(),
            "country",
            &derived,
            CollisionPolicy::Reject,
        )
        .unwrap()
        .generate("Kenya")
        .unwrap();

        assert_eq!(job.view.to_string(), "proj.reporting.kenya_view");
        assert!(job.view_statement.sql.contains("SELECT\n  `Year` AS `year`\nFROM"));
        assert!(job.view_statement.sql.ends_with("= TRUE"));
    }

    #[test]
    fn test_plan_cardinality_and_order() {
        let values = categories(&["Kenya", "India", "U.S.A!"]);
        let jobs = template(CollisionPolicy::Reject).plan(&values).unwrap();

        assert_eq!(jobs.len(), values.len());
        let identifiers: Vec<_> = jobs.iter().map(|j| j.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["kenya", "india", "u_s_a_"]);
    }

    #[test]
    fn test_plan_empty() {
        let jobs = template(CollisionPolicy::Reject).plan(&[]).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_plan_rejects_collisions() {
        let values = categories(&["U.S.A!", "India", "U.S.A.", "INDIA", "Kenya"]);
        let err = template(CollisionPolicy::Reject).plan(&values).unwrap_err();

        match err {
            PlanError::Collision { groups } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0], r#"india: "India", "INDIA""#);
                assert_eq!(groups[1], r#"u_s_a_: "U.S.A!", "U.S.A.""#);
            }
            other => panic!("Expected Collision, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_disambiguates_by_raw_value() {
        let values = categories(&["india", "India", "Kenya"]);
        let jobs = template(CollisionPolicy::Disambiguate).plan(&values).unwrap();

        // "India" sorts before "india", so it keeps the plain name
        assert_eq!(jobs[0].identifier, "india_2");
        assert_eq!(jobs[1].identifier, "india");
        assert_eq!(jobs[2].identifier, "kenya");
        assert_eq!(jobs[0].table.table(), "india_2_table");
    }

    #[test]
    fn test_disambiguation_skips_taken_names() {
        let values = categories(&["a b", "a_b", "a_b_2"]);
        let jobs = template(CollisionPolicy::Disambiguate).plan(&values).unwrap();

        let identifiers: Vec<_> = jobs.iter().map(|j| j.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["a_b", "a_b_3", "a_b_2"]);
    }
}
