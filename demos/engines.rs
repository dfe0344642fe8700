use std::sync::Arc;

use rulecat::{
    Category, CompiledRuleSetCache, EngineKind, InMemoryRuleStore, RuleRecord, Transaction,
    TransactionClassifier,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rulecat=info".into()),
        )
        .init();

    // Two rules that both match a large electronics purchase.
    let store = Arc::new(InMemoryRuleStore::new());
    store.save_all([
        RuleRecord::new(1, "demo", "amount > 1000", 10, Category::new(1, "Large")),
        RuleRecord::new(
            2,
            "demo",
            r#"merchantType == "ELECTRONICS""#,
            5,
            Category::new(2, "Electronics"),
        ),
        RuleRecord::new(
            3,
            "demo",
            r#"category == "Electronics" && location.contains("Airport")"#,
            1,
            Category::new(3, "Duty Free"),
        ),
    ]);
    let cache = Arc::new(CompiledRuleSetCache::new(store));

    let batch = vec![
        Transaction::new("ELECTRONICS", 1500.0).with_location("Home"),
        Transaction::new("ELECTRONICS", 300.0).with_location("JFK Airport"),
        Transaction::new("FURNITURE", 2500.0),
    ];

    for engine in [EngineKind::ForwardChaining, EngineKind::PriorityExpression] {
        let classifier = TransactionClassifier::new(Arc::clone(&cache), engine.build());
        let (out, report) = classifier
            .classify_batch_detailed(batch.clone(), "demo")
            .expect("classification failed");

        println!("== {engine} ==");
        for (i, tx) in out.iter().enumerate() {
            println!(
                "  tx[{i}] {:>11} {:>7.2} -> {:<12} fired {:?}",
                tx.merchant_type.as_deref().unwrap_or("-"),
                tx.amount,
                tx.category.as_deref().unwrap_or("(none)"),
                report.fired_for(i)
            );
        }
        for err in report.errors() {
            println!("  recovered: {err}");
        }
    }

    // Only the forward-chaining engine exposes sessions.
    let classifier = TransactionClassifier::new(cache, EngineKind::PriorityExpression.build());
    if let Err(e) = classifier.open_session("demo") {
        println!("\n{e}");
    }
}
