//! Revision hook behaviour against an in-memory catalog.

use config::TenancySettings;
use tenancy::{
    ColumnType, Metadata, MigrationContext, MigrationOp, MigrationScript,
    ProcessRevisionDirectives, RevisionIds, TableDef, TenancyError,
    get_process_revision_directives, render_policy,
};
use tenancy::policy::resolver_function_body;
use testing::MemoryCatalog;

fn shop_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata
        .declare(TableDef::new("countries").column("code", ColumnType::Char(Some(2))))
        .unwrap();
    metadata
        .declare_with_rls(
            TableDef::new("orders")
                .column("id", ColumnType::BigInt)
                .with_tenant_column()
        )
        .unwrap();
    metadata
}

fn revision() -> RevisionIds {
    RevisionIds {
        heads: vec!["ae1027a6acf".to_string()],
        new_revision: Some("27c6a30d7c24".to_string())
    }
}

/// Catalog whose resolver matches the default settings.
fn provisioned_catalog() -> MemoryCatalog {
    MemoryCatalog::default().with_function(
        "public",
        "tenancy_current_tenant",
        resolver_function_body("tenant_")
    )
}

fn sql_ops(script: &MigrationScript) -> Vec<&str> {
    script
        .upgrade_ops
        .iter()
        .filter_map(MigrationOp::sql)
        .collect()
}

#[tokio::test]
async fn test_fresh_database_gets_function_rls_and_policy() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = MemoryCatalog::default();
    let mut directives = vec![MigrationScript::new("add orders")];
    directives[0].upgrade_ops.push(MigrationOp::Autogenerated {
        description: "create_table orders".to_string()
    });

    injector
        .process_revision_directives(
            &mut MigrationContext::new(&mut catalog),
            &revision(),
            &mut directives
        )
        .await
        .unwrap();

    let script = &directives[0];
    assert!(matches!(script.upgrade_ops[0], MigrationOp::Autogenerated { .. }));
    let ops = sql_ops(script);
    assert_eq!(ops.len(), 3);
    assert!(ops[0].starts_with("CREATE OR REPLACE FUNCTION public.tenancy_current_tenant()"));
    assert_eq!(ops[1], "ALTER TABLE public.orders ENABLE ROW LEVEL SECURITY");
    assert_eq!(
        ops[2],
        render_policy("public.orders", "public.tenancy_current_tenant")
    );
    // generation only reads the catalog
    assert!(catalog.statements().is_empty());
}

#[tokio::test]
async fn test_second_run_after_apply_is_empty() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = MemoryCatalog::default();

    let applied = injector.apply(&mut catalog).await.unwrap();
    assert_eq!(applied.len(), 3);
    assert!(catalog.is_rls_enabled("orders"));
    assert!(catalog.has_policy("orders", "tenant_select_policy"));

    let mut directives = vec![MigrationScript::default()];
    injector
        .process_revision_directives(
            &mut MigrationContext::new(&mut catalog),
            &revision(),
            &mut directives
        )
        .await
        .unwrap();
    assert!(directives[0].upgrade_ops.is_empty());
}

#[tokio::test]
async fn test_only_missing_pieces_are_emitted() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = provisioned_catalog().with_rls_enabled("orders");

    let ops = injector.plan(&mut catalog).await.unwrap();

    assert_eq!(ops.len(), 1);
    assert!(
        ops[0]
            .sql()
            .unwrap()
            .starts_with("CREATE POLICY tenant_select_policy\nON public.orders")
    );
}

#[tokio::test]
async fn test_existing_policy_still_enables_rls() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = provisioned_catalog().with_policy("orders", "tenant_select_policy");

    let ops = injector.plan(&mut catalog).await.unwrap();

    assert_eq!(
        ops,
        vec![MigrationOp::execute_sql(
            "ALTER TABLE public.orders ENABLE ROW LEVEL SECURITY"
        )]
    );
}

#[tokio::test]
async fn test_empty_directives_is_a_no_op() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut directives = Vec::new();

    injector
        .process_revision_directives(&mut MigrationContext::offline(), &revision(), &mut directives)
        .await
        .unwrap();

    assert!(directives.is_empty());
}

#[tokio::test]
async fn test_missing_connection_is_reported() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut directives = vec![MigrationScript::default()];

    let err = injector
        .process_revision_directives(&mut MigrationContext::offline(), &revision(), &mut directives)
        .await
        .unwrap_err();

    assert!(matches!(err, TenancyError::MissingConnection));
    assert!(directives[0].upgrade_ops.is_empty());
}

#[tokio::test]
async fn test_only_first_directive_is_modified() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = MemoryCatalog::default();
    let mut directives = vec![MigrationScript::new("first"), MigrationScript::new("second")];

    injector
        .process_revision_directives(
            &mut MigrationContext::new(&mut catalog),
            &revision(),
            &mut directives
        )
        .await
        .unwrap();

    assert_eq!(directives[0].upgrade_ops.len(), 3);
    assert!(directives[1].upgrade_ops.is_empty());
}

#[tokio::test]
async fn test_no_rls_tables_yields_nothing() {
    let mut metadata = Metadata::new();
    metadata
        .declare(TableDef::new("countries").column("code", ColumnType::Text))
        .unwrap();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = MemoryCatalog::default();

    assert!(injector.plan(&mut catalog).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_multiple_collections_in_declaration_order() {
    let billing = shop_metadata();
    let mut crm = Metadata::new();
    crm.declare_with_rls(
        TableDef::new("contacts")
            .column("id", ColumnType::Uuid)
            .column("tenant", ColumnType::Text)
    )
    .unwrap();
    let injector =
        get_process_revision_directives([&billing, &crm], &TenancySettings::default()).unwrap();
    let mut catalog = provisioned_catalog();

    let ops = injector.plan(&mut catalog).await.unwrap();

    let statements: Vec<_> = ops.iter().filter_map(MigrationOp::sql).collect();
    assert_eq!(statements.len(), 4);
    assert!(statements[0].contains("public.orders"));
    assert!(statements[1].contains("ON public.orders"));
    assert!(statements[2].contains("public.contacts"));
    assert!(statements[3].contains("ON public.contacts"));
}

#[tokio::test]
async fn test_custom_settings_flow_into_ddl() {
    let metadata = shop_metadata();
    let settings = TenancySettings {
        schema: "app".to_string(),
        policy_name: "isolate_tenant".to_string(),
        ..TenancySettings::default()
    }
    .with_role_prefix("org_")
    .with_resolver_function("whoami");
    let injector = get_process_revision_directives([&metadata], &settings).unwrap();
    let mut catalog = MemoryCatalog::default().with_policy("orders", "tenant_select_policy");

    let ops = injector.apply(&mut catalog).await.unwrap();

    let statements: Vec<_> = ops.iter().filter_map(MigrationOp::sql).collect();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("CREATE OR REPLACE FUNCTION app.whoami()"));
    assert!(statements[0].contains("= 'org_'"));
    assert_eq!(statements[1], "ALTER TABLE app.orders ENABLE ROW LEVEL SECURITY");
    assert!(statements[2].starts_with("CREATE POLICY isolate_tenant\nON app.orders\n"));
    assert!(statements[2].contains("select app.whoami()::varchar"));
    assert!(catalog.has_function("app", "whoami"));
    assert!(catalog.has_policy("app.orders", "isolate_tenant"));
    assert!(catalog.is_rls_enabled("app.orders"));
    // the same-named table in public is left alone
    assert!(!catalog.has_policy("orders", "isolate_tenant"));
    assert!(!catalog.is_rls_enabled("orders"));
}

#[tokio::test]
async fn test_non_public_schema_second_plan_is_empty() {
    let metadata = shop_metadata();
    let settings = TenancySettings {
        schema: "app".to_string(),
        ..TenancySettings::default()
    };
    let injector = get_process_revision_directives([&metadata], &settings).unwrap();
    let mut catalog = MemoryCatalog::default().with_rls_enabled("orders");

    let applied = injector.apply(&mut catalog).await.unwrap();
    assert_eq!(applied.len(), 3);

    assert!(injector.plan(&mut catalog).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_outdated_resolver_is_replaced() {
    let metadata = shop_metadata();
    let settings = TenancySettings::default().with_role_prefix("org_");
    let injector = get_process_revision_directives([&metadata], &settings).unwrap();
    let mut catalog = provisioned_catalog()
        .with_rls_enabled("orders")
        .with_policy("orders", "tenant_select_policy");

    let ops = injector.apply(&mut catalog).await.unwrap();

    assert_eq!(ops.len(), 1);
    assert!(
        ops[0]
            .sql()
            .unwrap()
            .starts_with("CREATE OR REPLACE FUNCTION public.tenancy_current_tenant()")
    );
    assert_eq!(
        catalog.function_body("public", "tenancy_current_tenant"),
        Some(resolver_function_body("org_").as_str())
    );
    assert!(injector.plan(&mut catalog).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_current_resolver_is_left_alone() {
    let metadata = shop_metadata();
    let injector =
        get_process_revision_directives([&metadata], &TenancySettings::default()).unwrap();
    let mut catalog = provisioned_catalog()
        .with_rls_enabled("orders")
        .with_policy("orders", "tenant_select_policy");

    assert!(injector.plan(&mut catalog).await.unwrap().is_empty());
}
