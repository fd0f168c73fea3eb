use std::error::Error as _;
use std::time::Duration;

use firebird_async_dialect::prelude::*;
use firebird_async_dialect::test_utils::MemoryServer;

const UNIQUE_VIOLATION: &str =
    "violation of PRIMARY or UNIQUE KEY constraint \"INTEG_12\" on table \"USERS\"";

fn text(dialect: &FirebirdDialect, sql: &str) -> CompiledStatement {
    dialect
        .compile(&TextStatement::new(sql).into())
        .expect("text statement compiles")
}

fn execute_params(server: &MemoryServer) -> Vec<Vec<DbValue>> {
    server
        .calls()
        .into_iter()
        .filter(|call| call.op == "execute")
        .map(|call| call.params)
        .collect()
}

#[tokio::test]
async fn constraint_violations_are_integrity_errors() -> Result<(), DialectError> {
    for driver in ["fdb_async", "firebird_async"] {
        let server = MemoryServer::new();
        server.fail(
            "INSERT INTO users",
            DriverFailure::new(UNIQUE_VIOLATION)
                .with_sqlcode(-803)
                .with_gds_code(335_544_665),
        );
        let dialect = server.dialect(driver, ServerVersion::new(3, 0))?;
        let conn = dialect.connect().await?;
        let insert = dialect.compile(&Insert::new("users").bind("name").into())?;

        let err = conn
            .execute(&insert, &Params::new().set("name", "dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, DialectError::Integrity { .. }), "[{driver}] {err:?}");
        assert_eq!(err.native_code(), Some(335_544_665));
        assert_eq!(err.statement(), Some("INSERT INTO users (name) VALUES (?)"));

        let source = err
            .source()
            .and_then(|source| source.downcast_ref::<DriverFailure>())
            .expect("native failure is the error source");
        assert_eq!(source.sqlcode, Some(-803));
        assert!(!conn.is_unusable());
    }
    Ok(())
}

#[tokio::test]
async fn missing_bind_value_is_a_parameter_error() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    let dialect = server.dialect("firebird_async", ServerVersion::new(4, 0))?;
    let conn = dialect.connect().await?;
    let update = text(&dialect, "UPDATE users SET name = :name WHERE id = :id");

    let err = conn
        .execute(&update, &Params::new().set("id", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DialectError::Parameter(_)));

    let typed = dialect.compile(
        &TextStatement::new("UPDATE users SET age = :age")
            .bind_type("age", SqlType::SmallInteger)
            .into(),
    )?;
    let err = conn
        .execute(&typed, &Params::new().set("age", 70_000))
        .await
        .unwrap_err();
    assert!(matches!(err, DialectError::Parameter(_)));
    assert!(!server.ops().contains(&"execute"));
    Ok(())
}

/// A transport failure mid-fetch loses the connection; the pool replaces it.
#[tokio::test]
async fn lost_connection_is_replaced_by_the_pool() -> Result<(), DialectError> {
    for driver in ["fdb_async", "firebird_async"] {
        let server = MemoryServer::new();
        server.fail_on_fetch(
            "FROM big_table",
            vec![ColumnDescription::new("ID", "INTEGER")],
            DriverFailure::transport("Error writing data to the connection"),
        );
        let dialect = server.dialect(driver, ServerVersion::new(4, 0))?;
        let pool = dialect.build_pool(1).await?;
        let select = text(&dialect, "SELECT id FROM big_table");

        let first_id = {
            let conn = pool.acquire().await?;
            let mut handle = conn.execute(&select, &Params::new()).await?;
            let err = conn.fetch(&mut handle, 10).await.unwrap_err();
            assert!(
                matches!(err, DialectError::ConnectionLost { .. }),
                "[{driver}] {err:?}"
            );
            assert!(err.is_disconnect());
            assert!(conn.is_unusable());
            assert!(!conn.has_open_cursor());

            let next = conn.ping().await.unwrap_err();
            assert!(matches!(next, DialectError::ConnectionLost { .. }));
            conn.id()
        };

        let conn = pool.acquire().await?;
        assert_ne!(conn.id(), first_id, "[{driver}] broken connection was reused");
        conn.ping().await?;
        assert_eq!(server.opened(), 2);
        assert_eq!(pool.connections(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn tainted_connection_is_discarded_by_the_pool() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    server.respond_slowly("slow_proc", Duration::from_millis(300));
    let dialect = server.dialect("fdb_async", ServerVersion::new(3, 0))?;
    let pool = dialect.build_pool(1).await?;
    let slow = text(&dialect, "EXECUTE PROCEDURE slow_proc");

    let tainted_id = {
        let conn = pool.acquire().await?;
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), conn.execute(&slow, &Params::new())).await;
        assert!(abandoned.is_err());
        assert!(conn.is_tainted());
        conn.id()
    };

    let conn = pool.acquire().await?;
    assert_ne!(conn.id(), tainted_id);
    assert!(!conn.is_unusable());
    Ok(())
}

/// Work left behind by the previous user is cleaned up before the connection is reused.
#[tokio::test]
async fn checkout_resets_leftover_state() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    server.respond_rows(
        "FROM events",
        vec![ColumnDescription::new("ID", "BIGINT")],
        (0..10).map(|id| vec![DbValue::BigInt(id)]).collect(),
    );
    let dialect = server.dialect("firebird_async", ServerVersion::new(4, 0))?;
    let pool = dialect.build_pool(1).await?;
    let select = text(&dialect, "SELECT id FROM events");

    let first_id = {
        let conn = pool.acquire().await?;
        conn.begin().await?;
        let mut handle = conn.execute(&select, &Params::new()).await?;
        conn.fetch(&mut handle, 1).await?;
        conn.id()
    };

    server.clear_calls();
    let conn = pool.acquire().await?;
    assert_eq!(conn.id(), first_id);
    assert!(!conn.in_transaction());
    assert!(!conn.has_open_cursor());
    assert_eq!(
        server.ops(),
        ["close_cursor", "rollback", "execute", "fetch", "close_cursor", "commit"]
    );
    assert_eq!(conn.query(&select, &Params::new()).await?.len(), 10);
    Ok(())
}

#[tokio::test]
async fn execute_many_buffers_returning_rows() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    server.echo_params("INSERT INTO users");
    let dialect = server.dialect("firebird_async", ServerVersion::new(3, 0))?;
    let conn = dialect.connect().await?;
    let insert = dialect.compile(&Insert::new("users").bind("name").returning("id").into())?;
    assert!(insert.returns_rows);
    server.clear_calls();

    let sets: Vec<Params> = ["ann", "bob", "cy"]
        .into_iter()
        .map(|name| Params::new().set("name", name))
        .collect();
    let mut handle = conn.execute_many(&insert, &sets).await?;
    assert!(handle.is_buffered());
    assert_eq!(handle.rows_affected(), Some(3));
    assert!(!conn.has_open_cursor());

    let rows = conn.fetch_all(&mut handle).await?;
    let names: Vec<_> = rows
        .iter()
        .map(|row| row.get_by_index(0).and_then(RowValues::as_text).map(str::to_string))
        .collect();
    assert_eq!(
        names,
        [Some("ann".to_string()), Some("bob".to_string()), Some("cy".to_string())]
    );
    assert_eq!(
        server.ops().iter().filter(|op| **op == "commit").count(),
        3,
        "each returning insert commits on its own"
    );
    Ok(())
}

#[tokio::test]
async fn execute_many_without_rows_commits_once() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    server.respond_affected("UPDATE users", 2);
    let dialect = server.dialect("fdb_async", ServerVersion::new(3, 0))?;
    let conn = dialect.connect().await?;
    let update = text(&dialect, "UPDATE users SET active = 0 WHERE id = :id");
    server.clear_calls();

    let sets: Vec<Params> = (1..=3).map(|id| Params::new().set("id", id)).collect();
    let handle = conn.execute_many(&update, &sets).await?;
    assert_eq!(handle.rows_affected(), Some(6));
    assert_eq!(server.ops(), ["execute", "execute", "execute", "commit"]);
    assert_eq!(
        execute_params(&server),
        [
            vec![DbValue::BigInt(1)],
            vec![DbValue::BigInt(2)],
            vec![DbValue::BigInt(3)]
        ]
    );

    let ddl = text(&dialect, "DROP TABLE users");
    assert!(matches!(
        conn.execute_many(&ddl, &sets).await,
        Err(DialectError::InvalidState(_))
    ));
    Ok(())
}

/// Old servers without RETURNING get the new key from a generator fetched first.
#[tokio::test]
async fn sequence_prefetch_supplies_the_inserted_key() -> Result<(), DialectError> {
    for driver in ["fdb_async", "firebird_async"] {
        let server = MemoryServer::new();
        server.set_sequence("gen_users_id", 41);
        let dialect = server.dialect(driver, ServerVersion::new(1, 5))?;
        let conn = dialect.connect().await?;
        let insert = dialect.compile(
            &Insert::new("users")
                .bind("name")
                .returning("id")
                .sequence_key("id", "gen_users_id")
                .into(),
        )?;
        server.clear_calls();

        let result = conn
            .query(&insert, &Params::new().set("name", "alice"))
            .await?;
        assert_eq!(result.column_names(), ["id"]);
        let row = result.first().expect("one row");
        assert_eq!(row.get("id"), Some(&RowValues::Int(42)), "[{driver}]");

        assert_eq!(
            server.executed(),
            [
                "SELECT GEN_ID(gen_users_id, 1) FROM RDB$DATABASE",
                "INSERT INTO users (name, id) VALUES (?, ?)"
            ]
        );
        assert_eq!(
            execute_params(&server)[1],
            [DbValue::Text("alice".into()), DbValue::BigInt(42)]
        );
        assert_eq!(
            server.ops(),
            ["execute", "fetch", "close_cursor", "execute", "commit"]
        );
    }
    Ok(())
}

#[tokio::test]
async fn int128_binds_follow_driver_capabilities() -> Result<(), DialectError> {
    let big: i128 = 99_999_999_999_999_999_999_999;
    for (driver, expected) in [
        ("fdb_async", DbValue::Text("99999999999999999999999".into())),
        ("firebird_async", DbValue::Int128(big)),
    ] {
        let server = MemoryServer::new();
        let dialect = server.dialect(driver, ServerVersion::new(4, 0))?;
        let conn = dialect.connect().await?;
        let insert = dialect.compile(
            &TextStatement::new("INSERT INTO ledger (amount) VALUES (:amount)")
                .bind_type("amount", SqlType::Int128)
                .into(),
        )?;
        conn.execute(&insert, &Params::new().set("amount", big))
            .await?;
        assert_eq!(execute_params(&server), [vec![expected]], "[{driver}]");
    }
    Ok(())
}

#[tokio::test]
async fn zoned_columns_decode_from_the_driver() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    // 2024-03-01 10:30:00 UTC in zone +02:00.
    server.respond_rows(
        "FROM meetings",
        vec![ColumnDescription::new("STARTS_AT", "TIMESTAMP WITH TIME ZONE")],
        vec![vec![DbValue::TimestampTz {
            date: 60_370,
            time: 378_000_000,
            zone: 1439 + 120,
        }]],
    );
    let dialect = server.dialect("firebird_async", ServerVersion::new(4, 0))?;
    let conn = dialect.connect().await?;
    let rows = conn
        .query(&text(&dialect, "SELECT starts_at FROM meetings"), &Params::new())
        .await?;
    match rows.first().and_then(|row| row.get("starts_at")) {
        Some(RowValues::TimestampTz(dt)) => {
            assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+02:00");
        }
        other => panic!("unexpected value {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn pool_hands_out_distinct_connections() -> Result<(), DialectError> {
    let server = MemoryServer::new();
    let dialect = server.dialect("fdb_async", ServerVersion::new(3, 0))?;
    let pool = dialect.build_pool(2).await?;
    let a = pool.acquire().await?;
    let b = pool.acquire().await?;
    assert_ne!(a.id(), b.id());
    assert_eq!(pool.connections(), 2);
    drop(a);
    let c = pool.acquire().await?;
    assert_ne!(c.id(), b.id());
    assert_eq!(server.opened(), 2);
    Ok(())
}
