use firebird_async_dialect::ast::{AutoIncrement, Literal};
use firebird_async_dialect::prelude::*;
use firebird_async_dialect::test_utils::MemoryServer;

fn dialect(driver: &str, major: u8, minor: u8) -> FirebirdDialect {
    MemoryServer::new()
        .dialect(driver, ServerVersion::new(major, minor))
        .expect("dialect resolves")
}

fn sql(dialect: &FirebirdDialect, statement: impl Into<Statement>) -> String {
    dialect.compile(&statement.into()).expect("statement compiles").sql
}

fn users_page() -> Select {
    Select::new()
        .column(Expr::col("id"))
        .column(Expr::col("name"))
        .from("users")
        .order_by(Expr::col("id"), false)
        .limit(5)
        .offset(10)
}

#[test]
fn offset_without_native_support_uses_a_row_number_window() {
    let legacy = dialect("fdb_async", 2, 5);
    let star_page = Select::new().column(Expr::star()).from("t").limit(5).offset(10);
    let first = sql(&legacy, star_page.clone());
    assert_eq!(
        first,
        "SELECT anon_1.* FROM (SELECT t.*, ROW_NUMBER() OVER () AS fb_rownum FROM t) anon_1 \
         WHERE anon_1.fb_rownum > 10 AND anon_1.fb_rownum <= 15 ORDER BY anon_1.fb_rownum"
    );
    for _ in 0..10 {
        assert_eq!(sql(&legacy, star_page.clone()), first);
    }

    assert_eq!(
        sql(&legacy, users_page()),
        "SELECT anon_1.id, anon_1.name FROM (SELECT id, name, ROW_NUMBER() OVER (ORDER BY id) \
         AS fb_rownum FROM users) anon_1 WHERE anon_1.fb_rownum > 10 AND anon_1.fb_rownum <= 15 \
         ORDER BY anon_1.fb_rownum"
    );
}

#[test]
fn native_pagination_and_first() {
    let modern = dialect("firebird_async", 4, 0);
    assert_eq!(
        sql(&modern, Select::new().column(Expr::star()).from("t").limit(5).offset(10)),
        "SELECT * FROM t OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(
        sql(&modern, Select::new().column(Expr::star()).from("t").limit(5)),
        "SELECT * FROM t FETCH FIRST 5 ROWS ONLY"
    );

    let legacy = dialect("fdb", 2, 5);
    assert_eq!(
        sql(&legacy, Select::new().column(Expr::star()).from("t").limit(5)),
        "SELECT FIRST 5 * FROM t"
    );
    assert_eq!(
        sql(&legacy, Select::new().distinct().column(Expr::col("name")).from("t").limit(3)),
        "SELECT FIRST 3 DISTINCT name FROM t"
    );
}

#[test]
fn row_number_rewrite_rejects_ambiguous_projections() {
    let legacy = dialect("fdb_async", 2, 5);
    let unnamed = Select::new()
        .column(Expr::func("COUNT", vec![Expr::star()]))
        .from("t")
        .offset(1);
    assert!(matches!(
        legacy.compile(&unnamed.into()),
        Err(DialectError::Compile(_))
    ));
    let distinct = Select::new().distinct().column(Expr::col("a")).from("t").offset(1);
    assert!(matches!(
        legacy.compile(&distinct.into()),
        Err(DialectError::Compile(_))
    ));
}

#[test]
fn identifiers_are_quoted_only_when_needed() {
    let modern = dialect("firebird_async", 4, 0);
    assert_eq!(
        sql(
            &modern,
            Select::new()
                .column(Expr::col("user_id"))
                .column(Expr::col("Name"))
                .column(Expr::col("order"))
                .column_as(Expr::col("key"), "asc")
                .from("my table")
        ),
        "SELECT user_id, \"Name\", \"order\", \"key\" AS \"asc\" FROM \"my table\""
    );

    let compiler = modern.compiler();
    assert_eq!(compiler.quote_identifier("say\"hi").unwrap(), "\"say\"\"hi\"");
    assert_eq!(compiler.quote_identifier("rdb$x").unwrap(), "rdb$x");

    let long = "a".repeat(40);
    assert!(compiler.quote_identifier(&long).is_ok());
    let legacy = dialect("fdb_async", 3, 0);
    assert!(matches!(
        legacy.compiler().quote_identifier(&long),
        Err(DialectError::Compile(_))
    ));
    assert!(matches!(
        modern.compiler().quote_identifier(&"a".repeat(64)),
        Err(DialectError::Compile(_))
    ));
}

#[test]
fn binds_in_the_select_list_are_cast() {
    let modern = dialect("firebird_async", 4, 0);
    let compiled = modern
        .compile(
            &Select::new()
                .column_as(Expr::typed_bind("limit_value", SqlType::Integer), "lim")
                .column(Expr::value("label", "abc"))
                .filter(Expr::col("x").eq(Expr::bind("x")))
                .into(),
        )
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT CAST(? AS INTEGER) AS lim, CAST(? AS VARCHAR(3)) FROM RDB$DATABASE WHERE x = ?"
    );
    let names: Vec<_> = compiled.binds.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["limit_value", "label", "x"]);
    assert_eq!(compiled.binds[1].value, Some(RowValues::Text("abc".into())));

    let untyped = Select::new().column(Expr::bind("mystery"));
    assert!(matches!(
        modern.compile(&untyped.into()),
        Err(DialectError::Compile(_))
    ));
}

#[test]
fn literals_follow_boolean_support_and_in_lists() {
    let legacy = dialect("fdb_async", 2, 5);
    let modern = dialect("firebird_async", 3, 0);
    let select = Select::new()
        .column(Expr::col("id"))
        .from("flags")
        .filter(
            Expr::col("active")
                .eq(Expr::lit(Literal::Bool(true)))
                .and(Expr::col("id").in_list(Vec::new())),
        );
    assert_eq!(
        sql(&legacy, select.clone()),
        "SELECT id FROM flags WHERE active = 1 AND 1 = 0"
    );
    assert_eq!(
        sql(&modern, select),
        "SELECT id FROM flags WHERE active = TRUE AND 1 = 0"
    );

    let quoted = Select::new().column_as(Expr::lit(Literal::Text("it's".into())), "t");
    assert_eq!(sql(&modern, quoted), "SELECT 'it''s' AS t FROM RDB$DATABASE");
}

#[test]
fn compound_order_by_becomes_positional() {
    let modern = dialect("firebird_async", 4, 0);
    let member = |table: &str| {
        Select::new()
            .column(Expr::col("id"))
            .column(Expr::col("name"))
            .from(table)
    };
    let union = CompoundSelect::new(SetOperator::Union, vec![member("a"), member("b")])
        .order_by(Expr::col("name"), true)
        .order_by(Expr::col("id"), false);
    assert_eq!(
        sql(&modern, union),
        "SELECT id, name FROM a UNION SELECT id, name FROM b ORDER BY 2 DESC, 1"
    );

    let legacy = dialect("fdb_async", 2, 5);
    let limited = CompoundSelect::new(SetOperator::UnionAll, vec![member("a"), member("b")]).limit(3);
    assert_eq!(
        sql(&legacy, limited),
        "SELECT FIRST 3 * FROM (SELECT id, name FROM a UNION ALL SELECT id, name FROM b) anon_1"
    );

    let intersect = CompoundSelect::new(SetOperator::Intersect, vec![member("a"), member("b")]);
    assert!(matches!(
        modern.compile(&intersect.into()),
        Err(DialectError::Compile(_))
    ));
}

#[test]
fn insert_returning_native_emulated_or_rejected() {
    let insert = Insert::new("users")
        .bind("name")
        .returning("id")
        .sequence_key("id", "gen_users_id");

    let modern = dialect("firebird_async", 3, 0);
    let native = modern.compile(&insert.clone().into()).unwrap();
    assert_eq!(native.sql, "INSERT INTO users (name) VALUES (?) RETURNING id");
    assert!(native.returns_rows);
    assert!(native.sequence_prefetch.is_none());
    assert_eq!(native.returning, Some(vec!["id".to_string()]));

    let ancient = dialect("fdb_async", 1, 5);
    let emulated = ancient.compile(&insert.into()).unwrap();
    assert_eq!(emulated.sql, "INSERT INTO users (name, id) VALUES (?, ?)");
    assert!(!emulated.returns_rows);
    let prefetch = emulated.sequence_prefetch.expect("prefetch");
    assert_eq!(prefetch.sql, "SELECT GEN_ID(gen_users_id, 1) FROM RDB$DATABASE");
    assert_eq!(prefetch.column, "id");
    let names: Vec<_> = emulated.binds.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["name", "id"]);

    let no_key = Insert::new("users").bind("name").returning("id");
    assert!(matches!(
        ancient.compile(&no_key.into()),
        Err(DialectError::Compile(_))
    ));

    let update = Update::table("users")
        .set("name", Expr::bind("name"))
        .filter(Expr::col("id").eq(Expr::bind("id")))
        .returning("name");
    let old = dialect("fdb_async", 2, 0);
    assert!(matches!(
        old.compile(&update.clone().into()),
        Err(DialectError::Compile(_))
    ));
    assert_eq!(
        sql(&modern, update),
        "UPDATE users SET name = ? WHERE id = ? RETURNING name"
    );
    assert_eq!(
        sql(&modern, Delete::new("users").filter(Expr::col("id").eq(Expr::bind("id")))),
        "DELETE FROM users WHERE id = ?"
    );
}

#[test]
fn autoincrement_uses_identity_or_generator_and_trigger() {
    let table = CreateTable::new("users")
        .column(ColumnDef::new("id", SqlType::Integer).primary_key().autoincrement())
        .column(ColumnDef::new("name", SqlType::varchar(50)).not_null());

    let modern = dialect("firebird_async", 4, 0);
    let ddl = modern.compile_ddl(&table.clone().into()).unwrap();
    let texts: Vec<_> = ddl.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        texts,
        ["CREATE TABLE users (id INTEGER GENERATED BY DEFAULT AS IDENTITY, \
          name VARCHAR(50) NOT NULL, PRIMARY KEY (id))"]
    );
    assert!(ddl.iter().all(|s| s.is_ddl));

    let legacy = dialect("fdb_async", 2, 5);
    let ddl = legacy.compile_ddl(&table.into()).unwrap();
    let texts: Vec<_> = ddl.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        texts,
        [
            "CREATE TABLE users (id INTEGER NOT NULL, name VARCHAR(50) NOT NULL, PRIMARY KEY (id))",
            "CREATE GENERATOR gen_users_id",
            "CREATE TRIGGER trg_users_id FOR users ACTIVE BEFORE INSERT POSITION 0 AS BEGIN \
             IF (NEW.id IS NULL) THEN NEW.id = GEN_ID(gen_users_id, 1); END",
        ]
    );

    let named = CreateTable::new("orders").column(
        ColumnDef::new("order_no", SqlType::BigInteger).autoincrement_with(AutoIncrement {
            sequence: Some("order_numbers".into()),
            trigger: None,
        }),
    );
    let ddl = legacy.compile_ddl(&named.into()).unwrap();
    assert_eq!(ddl[1].sql, "CREATE GENERATOR order_numbers");

    let text_key = CreateTable::new("t")
        .column(ColumnDef::new("id", SqlType::varchar(10)).autoincrement());
    assert!(matches!(
        modern.compile_ddl(&text_key.into()),
        Err(DialectError::Compile(_))
    ));
}

#[test]
fn sequences_and_generators() {
    let modern = dialect("firebird_async", 3, 0);
    let legacy = dialect("fdb_async", 2, 5);
    let create = Statement::CreateSequence(Sequence::new("invoice_seq").start_with(100));

    assert_eq!(
        modern.compile(&create).unwrap().sql,
        "CREATE SEQUENCE invoice_seq START WITH 100"
    );
    let generator: Vec<_> = legacy
        .compile_ddl(&create)
        .unwrap()
        .into_iter()
        .map(|s| s.sql)
        .collect();
    assert_eq!(
        generator,
        ["CREATE GENERATOR invoice_seq", "SET GENERATOR invoice_seq TO 100"]
    );
    assert!(matches!(legacy.compile(&create), Err(DialectError::Compile(_))));

    let drop = Statement::DropSequence("invoice_seq".into());
    assert_eq!(modern.compile(&drop).unwrap().sql, "DROP SEQUENCE invoice_seq");
    assert_eq!(legacy.compile(&drop).unwrap().sql, "DROP GENERATOR invoice_seq");

    let next = Select::new().column_as(Expr::NextValue("invoice_seq".into()), "n");
    assert_eq!(
        sql(&modern, next.clone()),
        "SELECT NEXT VALUE FOR invoice_seq AS n FROM RDB$DATABASE"
    );
    assert_eq!(
        sql(&legacy, next),
        "SELECT GEN_ID(invoice_seq, 1) AS n FROM RDB$DATABASE"
    );
}

#[test]
fn types_follow_capabilities() {
    let legacy = dialect("fdb_async", 3, 0);
    let types = legacy.type_compiler();
    assert_eq!(
        types
            .native_type_for(&SqlType::Timestamp {
                with_time_zone: true
            })
            .unwrap(),
        "VARCHAR(40)"
    );
    assert!(matches!(
        types.native_type_for(&SqlType::numeric(20, 2)),
        Err(DialectError::UnsupportedType(_))
    ));
    assert_eq!(types.native_type_for(&SqlType::Double).unwrap(), "DOUBLE PRECISION");
    assert_eq!(
        types
            .native_type_for(&SqlType::enumeration(["small", "medium", "large"]))
            .unwrap(),
        "VARCHAR(6)"
    );
    assert_eq!(
        types
            .native_type_for(&SqlType::String {
                length: Some(10),
                collation: Some("UNICODE_CI".into()),
            })
            .unwrap(),
        "VARCHAR(10) COLLATE UNICODE_CI"
    );

    let modern = dialect("firebird_async", 4, 0);
    let types = modern.type_compiler();
    assert_eq!(types.native_type_for(&SqlType::numeric(38, 2)).unwrap(), "NUMERIC(38, 2)");
    assert_eq!(
        types
            .native_type_for(&SqlType::Time {
                with_time_zone: true
            })
            .unwrap(),
        "TIME WITH TIME ZONE"
    );
    assert!(matches!(
        types.native_type_for(&SqlType::numeric(39, 2)),
        Err(DialectError::UnsupportedType(_))
    ));
}

#[test]
fn text_statements_translate_named_placeholders() {
    let modern = dialect("firebird_async", 4, 0);
    let text = TextStatement::new(
        "SELECT name FROM users WHERE id = :id AND note <> ':id' -- :ignored\n AND x = :x",
    )
    .bind_type("id", SqlType::Integer);
    let compiled = modern.compile(&text.into()).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT name FROM users WHERE id = ? AND note <> ':id' -- :ignored\n AND x = ?"
    );
    let binds: Vec<_> = compiled
        .binds
        .iter()
        .map(|b| (b.name.as_str(), b.sql_type.clone()))
        .collect();
    assert_eq!(binds, [("id", Some(SqlType::Integer)), ("x", None)]);
    assert!(compiled.returns_rows);

    let returning = modern
        .compile(&TextStatement::new("INSERT INTO t (a) VALUES (:a) RETURNING id").into())
        .unwrap();
    assert!(returning.returns_rows);
    assert!(returning.returning.is_some());

    let ddl = modern
        .compile(&TextStatement::new("CREATE TABLE t (a INTEGER)").into())
        .unwrap();
    assert!(ddl.is_ddl);

    let mixed = TextStatement::new("SELECT 1 FROM t WHERE a = ? AND b = :b");
    assert!(matches!(
        modern.compile(&mixed.into()),
        Err(DialectError::Compile(_))
    ));
}
