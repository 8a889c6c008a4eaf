/// Migrating twice must be a no-op the second time.
///
/// DB-backed test, skipped if GA_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_idempotent() -> anyhow::Result<()> {
    let url = match std::env::var(ga_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: GA_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = ga_db::connect(&url).await?;
    ga_db::migrate(&pool).await?;
    ga_db::migrate(&pool).await?;

    let st = ga_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_procedures_table);
    Ok(())
}
