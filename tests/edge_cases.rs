use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rulecat::{
    Category, ClassifierConfig, ClassifyError, CompiledRuleSetCache, EngineKind,
    ForwardChainingEngine, InMemoryRuleStore, PriorityExpressionEngine, RuleCompilationError,
    RuleRecord, RuleStore, StoreError, Transaction, TransactionClassifier,
};

fn classifier_with(rules: Vec<RuleRecord>, engine: EngineKind) -> TransactionClassifier {
    let store = Arc::new(InMemoryRuleStore::new());
    store.save_all(rules);
    TransactionClassifier::from_config(
        &ClassifierConfig { engine },
        Arc::new(CompiledRuleSetCache::new(store)),
    )
}

#[test]
fn customer_without_rules_classifies_nothing() {
    let c = classifier_with(Vec::new(), EngineKind::ForwardChaining);
    let out = c
        .classify_batch(vec![Transaction::new("RESTAURANT", 1.0)], "nobody")
        .unwrap();
    assert_eq!(out[0].category, None);
    assert!(c.cache().get("nobody").unwrap().is_empty());
}

#[test]
fn only_inactive_rules_classifies_nothing() {
    let c = classifier_with(
        vec![RuleRecord::new(1, "acme", "amount > 0", 1, Category::new(1, "Any")).inactive()],
        EngineKind::PriorityExpression,
    );
    let tx = c.classify(Transaction::new("X", 5.0), "acme").unwrap();
    assert_eq!(tx.category, None);
}

#[test]
fn rule_without_category_is_rejected() {
    let mut orphan = RuleRecord::new(4, "acme", "amount > 0", 1, Category::new(1, "Any"));
    orphan.category = None;
    let c = classifier_with(vec![orphan], EngineKind::ForwardChaining);
    let err = c.classify(Transaction::new("X", 5.0), "acme").unwrap_err();
    assert!(matches!(
        err,
        ClassifyError::Compile(RuleCompilationError::UnresolvedCategory { rule_id: 4 })
    ));
}

#[test]
fn duplicate_rule_ids_are_rejected() {
    struct Duplicating;
    impl RuleStore for Duplicating {
        fn find_rules_by_customer(&self, customer_id: &str) -> Result<Vec<RuleRecord>, StoreError> {
            let rule = RuleRecord::new(5, customer_id, "amount > 0", 1, Category::new(1, "Any"));
            Ok(vec![rule.clone(), rule])
        }
    }
    let c = TransactionClassifier::new(
        Arc::new(CompiledRuleSetCache::new(Arc::new(Duplicating))),
        Box::new(PriorityExpressionEngine::new()),
    );
    let err = c.classify(Transaction::new("X", 5.0), "acme").unwrap_err();
    assert!(matches!(
        err,
        ClassifyError::Compile(RuleCompilationError::DuplicateRule { rule_id: 5 })
    ));
}

#[test]
fn hostile_names_stay_literal() {
    let category = r#"Food" ; drop rules; ""#;
    let c = classifier_with(
        vec![RuleRecord::new(
            1,
            "acme",
            r#"merchant == "Bobby\"); insert(\"x""#,
            1,
            Category::new(1, category),
        )
        .named("end\nrule evil")],
        EngineKind::ForwardChaining,
    );
    let tx = c
        .classify(
            Transaction::new("X", 1.0).with_merchant(r#"Bobby"); insert("x"#),
            "acme",
        )
        .unwrap();
    assert_eq!(tx.category.as_deref(), Some(category));

    let rendered = c.cache().get("acme").unwrap().to_string();
    assert_eq!(rendered.lines().count(), 2, "{rendered}");
}

#[test]
fn deeply_nested_condition() {
    let mut condition = String::from("amount > 0");
    for _ in 0..15 {
        condition = format!("!(!({condition}))");
    }
    let c = classifier_with(
        vec![RuleRecord::new(1, "acme", &condition, 1, Category::new(1, "Any"))],
        EngineKind::PriorityExpression,
    );
    let tx = c.classify(Transaction::new("X", 1.0), "acme").unwrap();
    assert_eq!(tx.category.as_deref(), Some("Any"));
}

fn assert_rejected_as_malformed(condition: &str) {
    let c = classifier_with(
        vec![
            RuleRecord::new(1, "acme", "amount > 0", 5, Category::new(1, "Any")),
            RuleRecord::new(7, "acme", condition, 1, Category::new(2, "Deep")),
        ],
        EngineKind::ForwardChaining,
    );
    match c.classify(Transaction::new("X", 1.0), "acme") {
        Err(ClassifyError::Compile(RuleCompilationError::MalformedCondition {
            rule_id, ..
        })) => assert_eq!(rule_id, 7),
        other => panic!("expected malformed condition, got {other:?}"),
    }
    assert!(c.cache().cached("acme").is_none());
}

#[test]
fn runaway_parentheses_are_rejected() {
    let condition = format!("{}amount > 0{}", "(".repeat(10_000), ")".repeat(10_000));
    assert_rejected_as_malformed(&condition);
}

#[test]
fn runaway_negation_is_rejected() {
    let condition = format!("{}amount > 0", "!".repeat(10_000));
    assert_rejected_as_malformed(&condition);
}

#[test]
fn runaway_conjunction_is_rejected() {
    let condition = vec!["amount > 0"; 10_000].join(" && ");
    assert_rejected_as_malformed(&condition);
}

#[test]
fn category_cycles_terminate() {
    let c = classifier_with(
        vec![
            RuleRecord::new(1, "acme", r#"category != "X""#, 10, Category::new(1, "X")),
            RuleRecord::new(2, "acme", r#"category == "X""#, 5, Category::new(2, "Y")),
            RuleRecord::new(3, "acme", r#"category == "Y""#, 1, Category::new(3, "X")),
        ],
        EngineKind::ForwardChaining,
    );
    let (out, report) = c
        .classify_batch_detailed(vec![Transaction::new("X", 1.0)], "acme")
        .unwrap();
    assert_eq!(report.fired_for(0), vec![1, 2, 3]);
    assert_eq!(out[0].category.as_deref(), Some("X"));
}

#[test]
fn null_equality_is_not_an_error() {
    let c = classifier_with(
        vec![RuleRecord::new(1, "acme", "location == null", 1, Category::new(1, "Online"))],
        EngineKind::PriorityExpression,
    );
    let (out, report) = c
        .classify_batch_detailed(
            vec![Transaction::new("X", 1.0), Transaction::new("X", 1.0).with_location("Oslo")],
            "acme",
        )
        .unwrap();
    assert_eq!(out[0].category.as_deref(), Some("Online"));
    assert_eq!(out[1].category, None);
    assert!(report.errors().is_empty());
}

#[test]
fn ordering_against_unset_field_is_recovered() {
    let c = classifier_with(
        vec![
            RuleRecord::new(1, "acme", r#"merchant > "M""#, 10, Category::new(1, "Late")),
            RuleRecord::new(2, "acme", "amount >= 0", 1, Category::new(2, "Any")),
        ],
        EngineKind::PriorityExpression,
    );
    let (out, report) = c
        .classify_batch_detailed(vec![Transaction::new("X", 1.0).with_id(3)], "acme")
        .unwrap();
    assert_eq!(out[0].category.as_deref(), Some("Any"));
    assert_eq!(
        report.errors()[0].to_string(),
        "rule 1 failed on transaction 3: cannot apply '>' to null and string"
    );
}

#[test]
fn session_is_released_when_caller_panics() {
    let c = classifier_with(
        vec![RuleRecord::new(1, "acme", "amount > 0", 1, Category::new(1, "Any"))],
        EngineKind::ForwardChaining,
    );
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut session = c.open_session("acme").unwrap();
        session.insert(Transaction::new("X", 1.0));
        panic!("caller failed mid-session");
    }));
    assert!(result.is_err());

    let engine: &ForwardChainingEngine = c.engine().as_forward_chaining().unwrap();
    assert_eq!(engine.open_sessions(), 0);
}

#[test]
fn sessions_are_unsupported_by_priority_engine() {
    let c = classifier_with(Vec::new(), EngineKind::PriorityExpression);
    let err = c.open_session("acme").unwrap_err();
    assert_eq!(
        err.to_string(),
        "direct session access is not supported by the priority-expression engine"
    );
}
