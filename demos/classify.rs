use std::sync::Arc;

use rulecat::{
    Category, ClassifierConfig, CompiledRuleSetCache, InMemoryRuleStore, RuleRecord, Transaction,
    TransactionClassifier,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rulecat=debug".into()),
        )
        .init();

    let store = Arc::new(InMemoryRuleStore::new());
    store.save_all([
        RuleRecord::new(
            1,
            "ngautam",
            r#"amount > 500 && merchantType == "ELECTRONICS""#,
            10,
            Category::new(1, "High Electronics"),
        )
        .named("HighElectro"),
        RuleRecord::new(
            2,
            "ngautam",
            r#"merchantType == "RESTAURANT""#,
            10,
            Category::new(2, "Food"),
        ),
        RuleRecord::new(
            3,
            "ngautam",
            r#"merchantType == "AIRLINE""#,
            5,
            Category::new(3, "Travel"),
        ),
    ]);

    // Engine comes from RULEENGINE_TYPE, defaulting to forward chaining.
    let config = ClassifierConfig::load().expect("invalid engine configuration");
    let cache = Arc::new(CompiledRuleSetCache::new(store.clone()));
    let classifier = TransactionClassifier::from_config(&config, cache);
    println!("engine: {}", classifier.engine_kind());

    let batch = vec![
        Transaction::new("ELECTRONICS", 899.0)
            .with_id(1)
            .with_merchant("Gadget Hut"),
        Transaction::new("RESTAURANT", 42.0)
            .with_id(2)
            .with_merchant("Bistro"),
        Transaction::new("AIRLINE", 510.0)
            .with_id(3)
            .with_merchant("Acme Air"),
        Transaction::new("GROCERY", 18.5).with_id(4),
    ];

    let classified = classifier
        .classify_batch(batch, "ngautam")
        .expect("classification failed");
    for tx in &classified {
        println!(
            "tx {:?} {:>12} {:>8.2} -> {}",
            tx.id,
            tx.merchant_type.as_deref().unwrap_or("-"),
            tx.amount,
            tx.category.as_deref().unwrap_or("(unclassified)")
        );
    }

    println!("\n{}", classifier.cache().get("ngautam").expect("rules compile"));

    // Switching a rule off takes effect on the next call.
    store.set_active(2, false);
    let tx = classifier
        .classify(Transaction::new("RESTAURANT", 42.0), "ngautam")
        .expect("classification failed");
    println!(
        "after deactivating rule 2: {}",
        tx.category.as_deref().unwrap_or("(unclassified)")
    );
    println!("rule set builds: {}", classifier.cache().builds());
}
