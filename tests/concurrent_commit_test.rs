// ==========================================
// 快照与提交之间的并发冲突测试
// ==========================================
// 覆盖: 同公司并发新增同一编号、快照后上级被删除
// 方式: 直接驱动 Repository + Reconciler，控制快照与提交的先后
// ==========================================

use asset_hierarchy_import::domain::asset::{AssetAttributes, ValidatedRow};
use asset_hierarchy_import::domain::types::FailureCategory;
use asset_hierarchy_import::engine::Reconciler;
use asset_hierarchy_import::importer::ImportError;
use asset_hierarchy_import::logging;
use asset_hierarchy_import::repository::{AssetNodeRepository, AssetNodeRepositoryImpl};

mod test_helpers;
use test_helpers::{assert_completed, open_raw_conn, setup_env, TestEnv};

fn row(line: usize, id: &str, name: &str, parent: Option<&str>) -> ValidatedRow {
    ValidatedRow {
        line_number: line,
        external_id: id.to_string(),
        parent_external_id: parent.map(|p| p.to_string()),
        attributes: AssetAttributes {
            name: name.to_string(),
            ..Default::default()
        },
    }
}

fn node_repo(env: &TestEnv) -> AssetNodeRepositoryImpl {
    let conn = asset_hierarchy_import::db::open_shared_connection(&env.db_path).unwrap();
    AssetNodeRepositoryImpl::new(conn)
}

fn count_active_external(env: &TestEnv, company_id: &str, external_id: &str) -> i64 {
    open_raw_conn(&env.db_path)
        .query_row(
            "SELECT COUNT(*) FROM asset_node \
             WHERE company_id = ?1 AND external_id = ?2 AND deleted_at IS NULL",
            [company_id, external_id],
            |row| row.get(0),
        )
        .unwrap()
}

#[tokio::test]
async fn test_same_company_duplicate_create_second_commit_fails() {
    logging::init_test();
    let env = setup_env();
    let repo = node_repo(&env);
    let rows = vec![row(2, "A1", "Pump", None)];

    // 两次导入读到同一份快照
    let first_state = repo.load_existing_state("c1").await.unwrap();
    let second_state = repo.load_existing_state("c1").await.unwrap();
    let first_plan = Reconciler::default().plan(&rows, &first_state).unwrap();
    let second_plan = Reconciler::default().plan(&rows, &second_state).unwrap();

    assert_eq!(repo.apply_plan("c1", &first_plan).await.unwrap(), 1);
    let err = repo.apply_plan("c1", &second_plan).await.unwrap_err();

    let import_err = ImportError::from(err);
    assert_eq!(import_err.failure_category(), FailureCategory::StorageConstraint);
    assert_eq!(count_active_external(&env, "c1", "A1"), 1);
}

#[tokio::test]
async fn test_parent_deleted_before_commit_is_rejected() {
    logging::init_test();
    let env = setup_env();
    let repo = node_repo(&env);
    assert_completed(&env.import_csv("c1", &["P,Plant,"]).await);

    let existing = repo.load_existing_state("c1").await.unwrap();
    let plan = Reconciler::default()
        .plan(&[row(2, "C", "Line", Some("P"))], &existing)
        .unwrap();
    let p = env.state.asset_api.get_asset("c1", "P").await.unwrap();
    env.state.asset_api.delete_asset("c1", &p.internal_id).await.unwrap();

    let err = repo.apply_plan("c1", &plan).await.unwrap_err();

    assert_eq!(
        ImportError::from(err).failure_category(),
        FailureCategory::StorageConstraint
    );
    assert_eq!(count_active_external(&env, "c1", "C"), 0);

    // 公司内无孤儿节点，后续导入不受影响
    let status = env.import_csv("c1", &["Z,Warehouse,"]).await;
    assert_completed(&status);
    assert_eq!(env.count_active("c1"), 1);
}

#[tokio::test]
async fn test_existing_orphan_does_not_block_later_imports() {
    logging::init_test();
    let env = setup_env();
    assert_completed(&env.import_csv("c1", &["P,Plant,", "C,Line,P", "G,Pump,C"]).await);

    // 绕过级联删除，直接软删除上级，构造遗留孤儿
    open_raw_conn(&env.db_path)
        .execute(
            "UPDATE asset_node SET deleted_at = updated_at \
             WHERE company_id = 'c1' AND external_id = 'P'",
            [],
        )
        .unwrap();

    let status = env.import_csv("c1", &["Z,Warehouse,"]).await;

    assert_completed(&status);
    let summary = status.result_summary.unwrap();
    assert_eq!(summary.created_count, 1);
    assert_eq!(summary.relevelled_count, 2);
    let c = env.state.asset_api.get_asset("c1", "C").await.unwrap();
    let g = env.state.asset_api.get_asset("c1", "G").await.unwrap();
    assert_eq!(c.level, 0);
    assert_eq!(c.parent_internal_id, None);
    assert_eq!(g.level, 1);
    assert_eq!(g.parent_internal_id.as_deref(), Some(c.internal_id.as_str()));
}
