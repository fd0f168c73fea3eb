use firebird_async_dialect::prelude::*;
use firebird_async_dialect::test_utils::MemoryServer;

async fn setup(driver: &str, version: ServerVersion) -> Result<(MemoryServer, FirebirdConnection), DialectError> {
    let server = MemoryServer::new();
    let conn = server.dialect(driver, version)?.connect().await?;
    server.clear_calls();
    Ok((server, conn))
}

fn text(conn: &FirebirdConnection, sql: &str) -> CompiledStatement {
    conn.dialect()
        .compile(&TextStatement::new(sql).into())
        .expect("text statement compiles")
}

#[tokio::test]
async fn begin_twice_is_invalid_state() -> Result<(), DialectError> {
    let (server, conn) = setup("fdb_async", ServerVersion::new(3, 0)).await?;
    conn.begin().await?;
    assert!(conn.in_transaction());
    assert!(matches!(conn.begin().await, Err(DialectError::InvalidState(_))));
    assert_eq!(server.ops(), ["begin"]);
    conn.rollback().await?;
    assert_eq!(conn.transaction_state(), TxState::None);
    Ok(())
}

#[tokio::test]
async fn finishing_without_a_transaction_is_invalid_state() -> Result<(), DialectError> {
    let (server, conn) = setup("firebird_async", ServerVersion::new(4, 0)).await?;
    assert!(matches!(conn.commit().await, Err(DialectError::InvalidState(_))));
    assert!(matches!(conn.rollback().await, Err(DialectError::InvalidState(_))));
    assert!(matches!(
        conn.prepare_commit().await,
        Err(DialectError::InvalidState(_))
    ));
    assert!(server.ops().is_empty());
    Ok(())
}

#[tokio::test]
async fn statements_autocommit_outside_a_transaction() -> Result<(), DialectError> {
    let (server, conn) = setup("fdb_async", ServerVersion::new(3, 0)).await?;
    server.respond_affected("UPDATE accounts", 3);
    let update = text(&conn, "UPDATE accounts SET flagged = 1");

    let handle = conn.execute(&update, &Params::new()).await?;
    assert_eq!(handle.rows_affected(), Some(3));
    assert!(!handle.returns_rows());
    assert_eq!(server.ops(), ["execute", "commit"]);

    server.clear_calls();
    conn.begin().await?;
    conn.execute(&update, &Params::new()).await?;
    conn.execute(&update, &Params::new()).await?;
    assert_eq!(server.ops(), ["begin", "execute", "execute"]);
    conn.commit().await?;
    assert_eq!(server.ops().last(), Some(&"commit"));
    Ok(())
}

#[tokio::test]
async fn explicit_isolation_is_tracked() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    let config = DialectConfig::new("fdb_async", "memory")
        .with_default_isolation(IsolationLevel::SnapshotTableStability);
    let dialect = FirebirdDialect::new(config, &server.driver_set())?;
    let conn = dialect.connect().await?;

    conn.begin().await?;
    assert_eq!(
        conn.transaction_state(),
        TxState::Active(IsolationLevel::SnapshotTableStability)
    );
    conn.commit().await?;

    conn.begin_with(IsolationLevel::Snapshot).await?;
    assert_eq!(
        conn.transaction_state(),
        TxState::Active(IsolationLevel::Snapshot)
    );
    conn.rollback().await?;
    Ok(())
}

/// DDL inside a transaction is committed at once and the transaction restarts with the
/// same isolation level.
#[tokio::test]
async fn ddl_commits_and_restarts_the_transaction() -> Result<(), DialectError> {
    let (server, conn) = setup("fdb_async", ServerVersion::new(2, 5)).await?;
    let table = CreateTable::new("users")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key().autoincrement())
        .column(ColumnDef::new("name", SqlType::varchar(50)));
    let ddl = conn.dialect().compile_ddl(&table.into())?;
    assert_eq!(ddl.len(), 3);

    conn.begin_with(IsolationLevel::Snapshot).await?;
    conn.execute_ddl(&ddl).await?;
    assert_eq!(
        conn.transaction_state(),
        TxState::Active(IsolationLevel::Snapshot)
    );
    assert_eq!(
        server.ops(),
        [
            "begin", "execute", "commit", "begin", "execute", "commit", "begin", "execute",
            "commit", "begin",
        ]
    );
    let executed = server.executed();
    assert!(executed[0].starts_with("CREATE TABLE users"));
    assert_eq!(executed[1], "CREATE GENERATOR gen_users_id");
    assert!(executed[2].starts_with("CREATE TRIGGER trg_users_id"));
    conn.commit().await?;
    assert!(!conn.in_transaction());
    Ok(())
}

#[tokio::test]
async fn ddl_outside_a_transaction_commits() -> Result<(), DialectError> {
    let (server, conn) = setup("firebird_async", ServerVersion::new(4, 0)).await?;
    let drop = conn
        .dialect()
        .compile(&Statement::DropTable("users".into()))?;
    assert!(drop.is_ddl);
    conn.execute(&drop, &Params::new()).await?;
    assert_eq!(server.ops(), ["execute", "commit"]);
    assert_eq!(server.executed(), ["DROP TABLE users"]);
    assert!(!conn.in_transaction());
    Ok(())
}

#[tokio::test]
async fn savepoints_need_an_active_transaction() -> Result<(), DialectError> {
    let (server, conn) = setup("firebird_async", ServerVersion::new(3, 0)).await?;
    assert!(matches!(
        conn.savepoint("sp1").await,
        Err(DialectError::InvalidState(_))
    ));

    conn.begin().await?;
    conn.savepoint("sp1").await?;
    conn.rollback_to_savepoint("sp1").await?;
    conn.savepoint("Step Two").await?;
    conn.release_savepoint("Step Two").await?;
    assert!(conn.in_transaction());
    conn.commit().await?;

    assert_eq!(
        server.executed(),
        [
            "SAVEPOINT sp1",
            "ROLLBACK TO SAVEPOINT sp1",
            "SAVEPOINT \"Step Two\"",
            "RELEASE SAVEPOINT \"Step Two\"",
        ]
    );
    // Savepoint statements never trigger the implicit commit.
    assert_eq!(server.ops().iter().filter(|op| **op == "commit").count(), 1);
    Ok(())
}

#[tokio::test]
async fn prepared_transaction_only_commits_or_rolls_back() -> Result<(), DialectError> {
    for finish_with_commit in [true, false] {
        let (server, conn) = setup("fdb_async", ServerVersion::new(3, 0)).await?;
        conn.begin().await?;
        conn.execute(&text(&conn, "DELETE FROM staging"), &Params::new())
            .await?;
        conn.prepare_commit().await?;
        assert_eq!(
            conn.transaction_state(),
            TxState::PreparedForCommit(IsolationLevel::ReadCommitted)
        );

        assert!(matches!(
            conn.prepare_commit().await,
            Err(DialectError::InvalidState(_))
        ));
        assert!(matches!(
            conn.savepoint("late").await,
            Err(DialectError::InvalidState(_))
        ));
        assert!(matches!(conn.begin().await, Err(DialectError::InvalidState(_))));
        let ddl = text(&conn, "CREATE TABLE t (a INTEGER)");
        assert!(matches!(
            conn.execute(&ddl, &Params::new()).await,
            Err(DialectError::InvalidState(_))
        ));

        if finish_with_commit {
            conn.commit().await?;
        } else {
            conn.rollback().await?;
        }
        assert_eq!(conn.transaction_state(), TxState::None);
        let expected = if finish_with_commit { "commit" } else { "rollback" };
        assert_eq!(
            server.ops(),
            ["begin", "execute", "prepare_commit", expected]
        );
    }
    Ok(())
}

#[tokio::test]
async fn open_cursor_blocks_other_work_until_exhausted() -> Result<(), DialectError> {
    let (server, conn) = setup("fdb_async", ServerVersion::new(3, 0)).await?;
    server.respond_rows(
        "FROM users",
        vec![
            ColumnDescription::new("ID", "INTEGER"),
            ColumnDescription::new("NAME", "VARCHAR").with_length(20),
        ],
        (1..=5)
            .map(|id| vec![DbValue::Integer(id), DbValue::Text(format!("user{id}"))])
            .collect(),
    );
    let select = conn.dialect().compile(
        &Select::new()
            .column(Expr::col("id"))
            .column(Expr::col("name"))
            .from("users")
            .into(),
    )?;

    let mut handle = conn.execute(&select, &Params::new()).await?;
    assert!(handle.is_open());
    assert!(conn.has_open_cursor());
    assert_eq!(handle.column_names(), ["ID", "NAME"]);
    assert!(matches!(
        conn.execute(&select, &Params::new()).await,
        Err(DialectError::InvalidState(_))
    ));
    assert!(matches!(conn.begin().await, Err(DialectError::InvalidState(_))));

    let first = conn.fetch(&mut handle, 2).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].get("id"), Some(&RowValues::Int(1)));
    assert_eq!(first[1].get("NAME"), Some(&RowValues::Text("user2".into())));
    // Nothing is committed while the cursor is still open.
    assert!(!server.ops().contains(&"commit"));

    let rest = conn.fetch(&mut handle, 10).await?;
    assert_eq!(rest.len(), 3);
    assert!(!handle.is_open());
    assert!(!conn.has_open_cursor());
    assert_eq!(
        server.ops(),
        ["execute", "fetch", "fetch", "close_cursor", "commit"]
    );
    assert!(conn.fetch(&mut handle, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn closing_a_result_releases_the_cursor() -> Result<(), DialectError> {
    let (server, conn) = setup("firebird_async", ServerVersion::new(4, 0)).await?;
    server.respond_rows(
        "FROM numbers",
        vec![ColumnDescription::new("N", "BIGINT")],
        (0..100).map(|n| vec![DbValue::BigInt(n)]).collect(),
    );
    let select = text(&conn, "SELECT n FROM numbers");
    let mut handle = conn.execute(&select, &Params::new()).await?;
    assert_eq!(conn.fetch(&mut handle, 0).await?.len(), 0);
    conn.fetch(&mut handle, 1).await?;
    conn.close_result(&mut handle).await?;
    assert!(!conn.has_open_cursor());
    assert_eq!(
        server.ops(),
        ["execute", "fetch", "close_cursor", "commit"]
    );

    // The connection is free again.
    let all = conn.query(&select, &Params::new()).await?;
    assert_eq!(all.len(), 100);
    assert_eq!(all.column_names(), ["N"]);
    Ok(())
}

#[tokio::test]
async fn handles_belong_to_their_connection() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    let dialect = server.dialect("firebird_async", ServerVersion::new(4, 0))?;
    let first = dialect.connect().await?;
    let second = dialect.connect().await?;
    let ping = text(&first, "SELECT 1 FROM RDB$DATABASE");
    let mut handle = first.execute(&ping, &Params::new()).await?;
    assert!(matches!(
        second.fetch(&mut handle, 1).await,
        Err(DialectError::InvalidState(_))
    ));
    first.close_result(&mut handle).await?;
    Ok(())
}

#[tokio::test]
async fn rejected_statement_rolls_back_only_outside_a_transaction() -> Result<(), DialectError> {
    let (server, conn) = setup("fdb_async", ServerVersion::new(3, 0)).await?;
    server.fail(
        "missing_table",
        DriverFailure::new("Table unknown MISSING_TABLE")
            .with_sqlcode(-204)
            .with_gds_code(335_544_580),
    );
    let bad = text(&conn, "DELETE FROM missing_table");

    let err = conn.execute(&bad, &Params::new()).await.unwrap_err();
    assert!(matches!(err, DialectError::Driver { .. }));
    assert_eq!(err.statement(), Some("DELETE FROM missing_table"));
    assert_eq!(server.ops(), ["execute", "rollback"]);

    server.clear_calls();
    conn.begin().await?;
    assert!(conn.execute(&bad, &Params::new()).await.is_err());
    assert!(conn.in_transaction());
    assert_eq!(server.ops(), ["begin", "execute"]);
    conn.rollback().await?;
    Ok(())
}
