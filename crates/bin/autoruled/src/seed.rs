//! Rule seeding from a JSON file at start-up.

use std::path::Path;

use serde::Deserialize;

use autorule_app::ports::RuleRepository;
use autorule_app::services::rule_service::RuleService;
use autorule_domain::error::AutoruleError;
use autorule_domain::id::TenantId;
use autorule_domain::rule::{Action, Combination, Condition, Rule, Trigger};

/// A rule definition as written in the seed file. Rules are matched to
/// stored ones by tenant and name.
#[derive(Debug, Deserialize)]
pub struct RuleSeed {
    pub tenant_id: TenantId,
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub combination: Combination,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub execution_delay_secs: Option<u64>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file")]
    Parse(#[from] serde_json::Error),
    #[error("failed to save seeded rule {name:?}")]
    Rule {
        name: String,
        #[source]
        source: AutoruleError,
    },
}

impl RuleSeed {
    fn into_rule(self) -> Result<Rule, AutoruleError> {
        let mut builder = Rule::builder()
            .tenant(self.tenant_id)
            .name(self.name)
            .trigger(self.trigger)
            .combination(self.combination)
            .active(self.active);
        if let Some(secs) = self.execution_delay_secs {
            builder = builder.execution_delay_secs(secs);
        }
        for condition in self.conditions {
            builder = builder.condition(condition);
        }
        for action in self.actions {
            builder = builder.action(action);
        }
        builder.build()
    }
}

/// Parse seed file content.
///
/// # Errors
///
/// Returns [`SeedError::Parse`] if the content is not a JSON array of rules.
pub fn parse(content: &str) -> Result<Vec<RuleSeed>, SeedError> {
    Ok(serde_json::from_str(content)?)
}

/// Create or replace each seeded rule. Returns how many were saved.
///
/// # Errors
///
/// Stops at the first rule that is invalid or cannot be stored.
pub async fn apply<R: RuleRepository>(
    service: &RuleService<R>,
    seeds: Vec<RuleSeed>,
) -> Result<usize, SeedError> {
    let mut saved = 0;
    for seed in seeds {
        let name = seed.name.clone();
        let rule = upsert(service, seed)
            .await
            .map_err(|source| SeedError::Rule { name, source })?;
        tracing::info!(
            rule_id = %rule.id,
            tenant = %rule.tenant_id,
            rule_name = %rule.name,
            "seeded rule"
        );
        saved += 1;
    }
    Ok(saved)
}

async fn upsert<R: RuleRepository>(
    service: &RuleService<R>,
    seed: RuleSeed,
) -> Result<Rule, AutoruleError> {
    let mut rule = seed.into_rule()?;
    let existing = service
        .list_rules(&rule.tenant_id)
        .await?
        .into_iter()
        .find(|stored| stored.name == rule.name);
    match existing {
        Some(stored) => {
            rule.id = stored.id;
            service.update_rule(rule).await
        }
        None => service.create_rule(rule).await,
    }
}

/// Read `path` and apply its rules.
///
/// # Errors
///
/// See [`parse`] and [`apply`].
pub async fn apply_file<R: RuleRepository>(
    service: &RuleService<R>,
    path: &Path,
) -> Result<usize, SeedError> {
    let content = std::fs::read_to_string(path)?;
    apply(service, parse(&content)?).await
}
