use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use tracing::trace;

use crate::types::CompiledExpr;
use crate::{
    CompiledRule, CompiledRuleSet, Expr, Field, Fingerprint, Predicate, RuleCompilationError,
    RuleRecord,
};

/// Turns rule conditions into [`Predicate`]s and customer rule lists into
/// [`CompiledRuleSet`]s.
///
/// Predicates are cached by normalized condition text, independent of the
/// customer, so a condition shared by many rules is parsed once.
#[derive(Debug, Default)]
pub struct ConditionCompiler {
    predicates: DashMap<String, Arc<Predicate>>,
    compilations: AtomicU64,
}

impl ConditionCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile one active rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleCompilationError`] if the rule is inactive, has no
    /// category, or its condition does not parse or names an unknown field.
    pub fn compile_rule(&self, rule: &RuleRecord) -> Result<CompiledRule, RuleCompilationError> {
        if !rule.active {
            return Err(RuleCompilationError::InactiveRule { rule_id: rule.id });
        }
        let category = rule
            .category
            .clone()
            .ok_or(RuleCompilationError::UnresolvedCategory { rule_id: rule.id })?;
        let predicate = self.predicate(rule.id, &rule.condition_expression)?;

        Ok(CompiledRule {
            rule_id: rule.id,
            name: rule.name.clone(),
            salience: rule.priority,
            category,
            predicate,
        })
    }

    /// Compile every active rule of `rules` into a rule set for `customer_id`.
    ///
    /// Inactive rules are skipped. The first failing rule (in id order)
    /// aborts the whole build.
    ///
    /// # Errors
    ///
    /// Returns [`RuleCompilationError`] naming the offending rule.
    pub fn compile_rule_set(
        &self,
        customer_id: &str,
        rules: &[RuleRecord],
        generation: u64,
    ) -> Result<CompiledRuleSet, RuleCompilationError> {
        let mut active: Vec<&RuleRecord> = rules.iter().filter(|r| r.active).collect();
        active.sort_by_key(|r| r.id);
        check_duplicates(&active)?;

        let mut compiled = active
            .into_iter()
            .map(|rule| self.compile_rule(rule))
            .collect::<Result<Vec<_>, _>>()?;

        // Descending salience, ascending id on ties.
        compiled.sort_by(|a, b| {
            b.salience
                .cmp(&a.salience)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        Ok(CompiledRuleSet {
            customer_id: customer_id.to_owned(),
            fingerprint: Fingerprint::of(rules),
            generation,
            built_at: SystemTime::now(),
            rules: compiled.into(),
        })
    }

    /// Number of conditions actually parsed (expression cache misses).
    #[must_use]
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Number of distinct conditions in the expression cache.
    #[must_use]
    pub fn cached_predicates(&self) -> usize {
        self.predicates.len()
    }

    fn predicate(
        &self,
        rule_id: i64,
        expression: &str,
    ) -> Result<Arc<Predicate>, RuleCompilationError> {
        let key = normalize(expression);
        if let Some(hit) = self.predicates.get(&key) {
            trace!(rule_id, condition = %key, "expression cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let parsed =
            crate::parse::parse(&key).map_err(|e| RuleCompilationError::MalformedCondition {
                rule_id,
                expression: expression.to_owned(),
                message: e.message().to_owned(),
            })?;
        let resolved = resolve(&parsed).map_err(|field| RuleCompilationError::UndefinedField {
            rule_id,
            field,
            expression: expression.to_owned(),
        })?;
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let predicate = Arc::new(Predicate::new(key.clone(), resolved));
        // Another thread may have compiled the same text meanwhile; keep theirs.
        let entry = self.predicates.entry(key).or_insert(predicate);
        Ok(Arc::clone(entry.value()))
    }
}

fn check_duplicates(rules: &[&RuleRecord]) -> Result<(), RuleCompilationError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id) {
            return Err(RuleCompilationError::DuplicateRule { rule_id: rule.id });
        }
    }
    Ok(())
}

/// Resolve field names. Returns the first unknown name on failure.
fn resolve(expr: &Expr) -> Result<CompiledExpr, String> {
    let field = |name: &str| name.parse::<Field>().map_err(|()| name.to_owned());
    Ok(match expr {
        Expr::Compare {
            field: name,
            op,
            value,
        } => CompiledExpr::Compare {
            field: field(name)?,
            op: *op,
            value: value.clone(),
        },
        Expr::Contains {
            field: name,
            needle,
        } => CompiledExpr::Contains {
            field: field(name)?,
            needle: needle.clone(),
        },
        Expr::And(a, b) => CompiledExpr::And(Box::new(resolve(a)?), Box::new(resolve(b)?)),
        Expr::Or(a, b) => CompiledExpr::Or(Box::new(resolve(a)?), Box::new(resolve(b)?)),
        Expr::Not(inner) => CompiledExpr::Not(Box::new(resolve(inner)?)),
    })
}

/// Trim and collapse whitespace runs outside string literals.
pub(crate) fn normalize(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_space = false;

    for c in expression.trim().chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}
