use model_approval::{
    ApprovalConfig, ApprovalEngine, ModelConfig, ModelRef, RollbackOutcome, Session, WriteOutcome,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let db = sled::open("sled")?;
    if !db.is_empty() {
        db.clear()?;
    }

    let config = ApprovalConfig::new()
        .set_model("post", ModelConfig::new().set_approvable_fields(["title"]))
        .register("user");
    let engine = ApprovalEngine::new(Arc::new(db), config)?;

    engine.notifier().subscribe(|event| {
        println!("event: {} on {}", event.name(), event.approval().approvable);
    });

    let editor = ModelRef::new("user", "editor");
    let session = Session::new();
    session.be(editor.clone());

    let WriteOutcome::Written(post) = engine
        .writer(&session)
        .without_approval()
        .create("post", [("title", "Hello"), ("body", "first draft")].into_iter().collect())?
    else {
        anyhow::bail!("bypassed write was deferred");
    };

    let outcome = engine.writer(&session).update(
        &post.model,
        [("title", "Hello, world"), ("body", "second draft")]
            .into_iter()
            .collect(),
    )?;
    let Some(approval) = outcome.approval() else {
        anyhow::bail!("title change was not captured");
    };
    println!("pending: {}", approval.new_data.to_json());

    let admin = ModelRef::new("user", "admin");
    engine.approve(&approval.id, Some(&admin))?;
    println!("{:#?}", engine.record(&post.model)?);

    if let RollbackOutcome::RolledBack(approval) =
        engine.rollback(&approval.id, None, None, false)?
    {
        println!("rolled back, now {} at {:?}", approval.state, approval.rolled_back_at);
    }
    println!("{:#?}", engine.record(&post.model)?);

    Ok(())
}
