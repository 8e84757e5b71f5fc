// ==========================================
// 对账场景测试（内存存储）
// ==========================================
// 测试目标: 新建 / 更新 / 历史 / 删除策略 / 解码策略 / 钩子 / 取消
// ==========================================


use rowsync::config::ImportConfig;
use rowsync::domain::{Entity, EntitySchema, FieldType, FieldValue, ImportMode, Record};
use rowsync::engine::{FnFactory, HookStats, ImportHooks, ImportTask, NoProgress, StagedSummary};
use rowsync::importer::{
    CsvSource, DecodeErrorPolicy, FieldUpdates, ImportError, MemorySource,
};
use rowsync::logging;
use rowsync::mapping::{FieldOptions, Mapping};
use rowsync::repository::{ChangeSet, InMemoryStore};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use test_helpers::{record_factory, text, write_csv};

type Store = InMemoryStore<Record, Record>;

fn schema() -> EntitySchema {
    EntitySchema::new()
        .with_field("code", FieldType::text())
        .with_required("status", FieldType::text())
        .with_field("qty", FieldType::Int)
}

fn store() -> Store {
    InMemoryStore::new("code")
        .with_schema(schema())
        .with_entities(vec![
            Record::new().with("code", "A1").with("status", "in").with("qty", 5i64),
            Record::new().with("code", "A2").with("status", "in").with("qty", 7i64),
        ])
}

fn mapping() -> Mapping {
    Mapping::builder()
        .auto("code")
        .auto_with("status", FieldOptions::tracked())
        .auto("qty")
        .key("code")
        .build()
        .unwrap()
}

fn source(rows: Vec<Vec<&str>>) -> MemorySource {
    MemorySource::from_text_rows("stock", mapping(), rows)
}

fn new_task(store: Store, config: ImportConfig) -> ImportTask<Store, FnFactory<Record, Record>> {
    ImportTask::new(store, record_factory(), config).with_progress(NoProgress)
}

#[test]
fn test_update_with_history_and_create() {
    logging::init_test();

    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A1", "out", "5"],
        vec!["B2", "in", "3"],
    ];
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.history_created, 1);
    assert_eq!(report.delete_candidates, 1);
    assert_eq!(report.deleted, 0);

    let store = task.into_store();
    assert_eq!(store.entities().len(), 3);
    assert_eq!(store.find("A1").unwrap().field("status"), text("out"));
    assert_eq!(store.find("B2").unwrap().field("qty"), FieldValue::Int(3));

    let history = &store.history()[0];
    assert_eq!(history.field("old_status"), text("in"));
    assert_eq!(history.field("new_status"), text("out"));
    assert_eq!(history.field("old_qty"), FieldValue::Null);
    assert!(matches!(history.field("date"), FieldValue::DateTime(_)));
}

#[test]
fn test_serialnumber_update_then_create() {
    let device_store = || -> Store {
        InMemoryStore::new("serialnumber").with_entities(vec![Record::new()
            .with("serialnumber", "A1")
            .with("status", "in")])
    };
    let device_mapping = || {
        Mapping::builder()
            .auto("serialnumber")
            .auto_with("status", FieldOptions::tracked())
            .key("serialnumber")
            .no_header()
            .build()
            .unwrap()
    };

    let updated = MemorySource::from_text_rows("devices", device_mapping(), vec![vec!["A1", "out"]]);
    let report = new_task(device_store(), ImportConfig::default())
        .add_source(Box::new(updated))
        .run()
        .unwrap();
    assert_eq!((report.updated, report.history_created), (1, 1));

    let created = MemorySource::from_text_rows("devices", device_mapping(), vec![vec!["B2", "in"]]);
    let report = new_task(device_store(), ImportConfig::default())
        .add_source(Box::new(created))
        .run()
        .unwrap();
    assert_eq!((report.created, report.history_created), (1, 0));
}

#[test]
fn test_untracked_change_has_no_history() {
    let rows = vec![vec!["code", "status", "qty"], vec!["A1", "in", "9"]];
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.history_created, 0);
    assert!(task.store().history().is_empty());
}

#[test]
fn test_history_disabled() {
    let rows = vec![vec!["code", "status", "qty"], vec!["A1", "out", "5"]];
    let config = ImportConfig::default().keep_history(false);
    let mut task = new_task(store(), config).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.history_created, 0);
}

#[test]
fn test_no_header_decodes_first_row() {
    let mapping = Mapping::builder()
        .auto("code")
        .auto("status")
        .key("code")
        .no_header()
        .build()
        .unwrap();
    let source = MemorySource::from_text_rows("plain", mapping, vec![vec!["C3", "in"]]);
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].header_rows, 0);
    assert_eq!(report.sources[0].read, 1);
    assert_eq!(report.created, 1);
}

#[test]
fn test_missing_key_is_counted_not_raised() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["  ", "in", "1"],
        vec!["A1", "in", "5"],
    ];
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].ignored_missing_key, 1);
    assert_eq!(report.sources[0].read, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.skipped(), 1);
}

#[test]
fn test_duplicate_keys_last_row_wins() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A1", "out", "1"],
        vec!["A1", "lost", "2"],
        vec!["N1", "in", "1"],
        vec!["N1", "in", "4"],
    ];
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);

    let store = task.into_store();
    assert_eq!(store.find("A1").unwrap().field("status"), text("lost"));
    assert_eq!(store.find("A1").unwrap().field("qty"), FieldValue::Int(2));
    assert_eq!(store.find("N1").unwrap().field("qty"), FieldValue::Int(4));
    assert_eq!(store.history().len(), 1);
}

#[test]
fn test_delete_unmatched_when_enabled() {
    let rows = vec![vec!["code", "status", "qty"], vec!["A1", "in", "5"]];
    let config = ImportConfig::default().delete_unmatched(true);
    let mut task = new_task(store(), config).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.delete_candidates, 1);

    let store = task.into_store();
    assert_eq!(store.entities().len(), 1);
    assert!(store.find("A2").is_none());
}

#[test]
fn test_delete_skipped_for_empty_input() {
    let rows = vec![vec!["code", "status", "qty"]];
    let config = ImportConfig::default().delete_unmatched(true);
    let mut task = new_task(store(), config).add_source(Box::new(source(rows)));

    let report = task.run().unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.delete_candidates, 2);
    assert_eq!(task.store().entities().len(), 2);
}

#[test]
fn test_update_mode_and_create_mode() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A1", "out", "5"],
        vec!["Z9", "in", "1"],
    ];
    let update_only = source(rows.clone()).with_mode(ImportMode::Update);
    let create_only = source(rows).with_mode(ImportMode::Create);
    let mut task = new_task(store(), ImportConfig::default())
        .add_source(Box::new(update_only))
        .add_source(Box::new(create_only));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].ignored_not_created, 1);
    assert_eq!(report.sources[1].ignored_not_updated, 1);
    assert_eq!(report.sources[1].not_found, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
}

#[test]
fn test_skip_row_policy_counts_decode_errors() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A1", "in", "many"],
        vec!["A2", "out", "7"],
    ];
    let source = source(rows).with_decode_error_policy(DecodeErrorPolicy::SkipRow);
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].decode_errors, 1);
    assert_eq!(report.updated, 1);
}

#[test]
fn test_abort_policy_leaves_store_unchanged() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A2", "out", "7"],
        vec!["A1", "in", "many"],
    ];
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source(rows)));

    let err = task.run().unwrap_err();
    assert!(matches!(err, ImportError::RowDecoding { .. }));
    assert_eq!(task.store().find("A2").unwrap().field("status"), text("in"));
}

#[test]
fn test_cancel_flag_stops_run() {
    let rows = vec![vec!["code", "status", "qty"], vec!["B2", "in", "3"]];
    let cancel = Arc::new(AtomicBool::new(true));
    let mut task = new_task(store(), ImportConfig::default())
        .add_source(Box::new(source(rows)))
        .with_cancel_flag(Arc::clone(&cancel));

    let err = task.run().unwrap_err();
    assert!(matches!(err, ImportError::Cancelled { .. }));
    assert_eq!(task.store().entities().len(), 2);
}

// ==========================================
// 钩子
// ==========================================

#[derive(Default)]
struct AuditLog {
    calls: Vec<&'static str>,
    staged: Option<StagedSummary>,
}

struct AuditHooks {
    log: Rc<RefCell<AuditLog>>,
}

impl ImportHooks<Record, Record> for AuditHooks {
    fn pre_process(&mut self) -> anyhow::Result<HookStats> {
        self.log.borrow_mut().calls.push("pre_process");
        Ok(HookStats::new())
    }

    fn select_existing(&mut self, existing: Vec<Record>) -> anyhow::Result<Vec<Record>> {
        self.log.borrow_mut().calls.push("select_existing");
        Ok(existing
            .into_iter()
            .filter(|record| record.field("code") != text("A2"))
            .collect())
    }

    fn post_process(&mut self, staged: &StagedSummary) -> anyhow::Result<HookStats> {
        let mut log = self.log.borrow_mut();
        log.calls.push("post_process");
        log.staged = Some(*staged);
        Ok(HookStats::new())
    }

    fn validate_updates(&self, _entity: &Record, updates: &FieldUpdates, creating: bool) -> bool {
        creating || updates.get("status") != Some(&text("blocked"))
    }

    fn pre_commit(&mut self, changes: &ChangeSet<Record, Record>) -> anyhow::Result<HookStats> {
        self.log.borrow_mut().calls.push("pre_commit");
        let mut stats = HookStats::new();
        stats.insert("writes".to_string(), changes.len() as i64);
        Ok(stats)
    }

    fn post_commit(&mut self, _changes: &ChangeSet<Record, Record>) -> anyhow::Result<HookStats> {
        self.log.borrow_mut().calls.push("post_commit");
        Ok(HookStats::new())
    }
}

#[test]
fn test_hooks_run_in_order_and_validate() {
    let rows = vec![
        vec!["code", "status", "qty"],
        vec!["A1", "blocked", "5"],
        vec!["C5", "in", "2"],
    ];
    let log = Rc::new(RefCell::new(AuditLog::default()));
    let mut task = new_task(store(), ImportConfig::default())
        .add_source(Box::new(source(rows)))
        .with_hooks(AuditHooks {
            log: Rc::clone(&log),
        });

    let report = task.run().unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    // A2 未选入工作集，不是删除候选
    assert_eq!(report.delete_candidates, 0);
    assert_eq!(report.hook_stats["pre_commit"]["writes"], 1);
    assert!(!report.hook_stats.contains_key("pre_process"));

    let log = log.borrow();
    assert_eq!(
        log.calls,
        vec![
            "pre_process",
            "select_existing",
            "post_process",
            "pre_commit",
            "post_commit"
        ]
    );
    assert_eq!(
        log.staged,
        Some(StagedSummary {
            entities: 2,
            pending_creates: 1,
            pending_updates: 1,
        })
    );
    assert_eq!(task.store().find("A1").unwrap().field("status"), text("in"));
}

struct FailingHooks;

impl ImportHooks<Record, Record> for FailingHooks {
    fn pre_commit(&mut self, _changes: &ChangeSet<Record, Record>) -> anyhow::Result<HookStats> {
        anyhow::bail!("库存已锁定")
    }
}

#[test]
fn test_hook_error_aborts_before_persist() {
    let rows = vec![vec!["code", "status", "qty"], vec!["A1", "out", "5"]];
    let mut task = new_task(store(), ImportConfig::default())
        .add_source(Box::new(source(rows)))
        .with_hooks(FailingHooks);

    let err = task.run().unwrap_err();
    match err {
        ImportError::HookError { hook, message } => {
            assert_eq!(hook, "pre_commit");
            assert!(message.contains("库存已锁定"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(task.store().find("A1").unwrap().field("status"), text("in"));
}

// ==========================================
// CSV 数据源
// ==========================================

#[test]
fn test_csv_source_end_to_end() {
    let file = write_csv("code;status;qty\nA1;out;5\nB7;in;12\n");
    let source = CsvSource::new(file.path(), mapping())
        .with_name("stock.csv")
        .with_delimiter(b';');
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].name, "stock.csv");
    assert_eq!(report.sources[0].read, 2);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"run_id\""));
}

#[test]
fn test_missing_csv_file() {
    let source = CsvSource::new("/nonexistent/stock.csv", mapping());
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let err = task.run().unwrap_err();
    assert!(matches!(err, ImportError::FileNotFound(_)));
}

#[test]
fn test_normalized_key_rewrite_updates_loaded_entity() {
    let store = InMemoryStore::new("code")
        .with_schema(schema())
        .with_entities(vec![Record::new().with("code", "AB1").with("status", "in")]);
    let mapping = Mapping::builder()
        .auto("code")
        .auto("status")
        .key("code")
        .key_normalizer(|v| v.key_string().map(|s| s.to_uppercase()))
        .no_header()
        .build()
        .unwrap();
    let source = MemorySource::from_text_rows("stock", mapping, vec![vec!["ab1", "out"]]);
    let mut task = new_task(store, ImportConfig::default()).add_source(Box::new(source));

    let report = task.run().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 0);

    let store = task.into_store();
    assert_eq!(store.entities().len(), 1);
    assert_eq!(store.find("ab1").unwrap().field("status"), text("out"));
    assert!(store.find("AB1").is_none());
}

// 未出现在输入中的实体标记为 gone 而不是删除
struct RetiringSource {
    inner: MemorySource,
}

impl rowsync::importer::ImportSource for RetiringSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn mapping(&self) -> &Mapping {
        self.inner.mapping()
    }

    fn open(&self) -> rowsync::importer::ImportResult<rowsync::importer::RowIter<'_>> {
        self.inner.open()
    }

    fn on_data_not_found(&self, entity: &dyn Entity, updates: &mut FieldUpdates) {
        if entity.field("status") != text("gone") {
            updates.stage("status", text("gone"), true);
        }
    }
}

#[test]
fn test_not_found_entities_retired_instead_of_deleted() {
    let inner = source(vec![vec!["code", "status", "qty"], vec!["A1", "in", "5"]]);
    let config = ImportConfig::default().delete_unmatched(true);
    let mut task = new_task(store(), config).add_source(Box::new(RetiringSource { inner }));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].not_found, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.history_created, 1);

    let store = task.into_store();
    assert_eq!(store.entities().len(), 2);
    assert_eq!(store.find("A2").unwrap().field("status"), text("gone"));
    assert_eq!(store.history()[0].field("new_status"), text("gone"));
}

#[test]
fn test_query_source_named_bindings() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE feed (sku TEXT, state TEXT, amount INTEGER);
         INSERT INTO feed VALUES ('A1', 'out', 9), ('Q7', 'in', 2);",
    )
    .unwrap();
    let conn = Arc::new(std::sync::Mutex::new(conn));

    // 列顺序与绑定顺序无关
    let mapping = Mapping::builder()
        .named_with("code", "sku", FieldOptions::default())
        .named_with("status", "state", FieldOptions::tracked())
        .named_with("qty", "amount", FieldOptions::default())
        .key("code")
        .no_header()
        .build()
        .unwrap();
    let source = rowsync::importer::SqliteQuerySource::new(
        conn,
        "SELECT amount, state, sku FROM feed ORDER BY sku",
        mapping,
    )
    .with_name("feed");
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let report = task.run().unwrap();
    assert_eq!(report.sources[0].read, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);

    let store = task.into_store();
    assert_eq!(store.find("A1").unwrap().field("status"), text("out"));
    assert_eq!(store.find("A1").unwrap().field("qty"), FieldValue::Int(9));
    assert_eq!(store.find("Q7").unwrap().field("qty"), FieldValue::Int(2));
}

#[test]
fn test_query_source_unknown_column_fails_source() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE feed (sku TEXT, state TEXT);").unwrap();
    let mapping = Mapping::builder()
        .named_with("code", "sku", FieldOptions::default())
        .named_with("status", "status", FieldOptions::default())
        .key("code")
        .no_header()
        .build()
        .unwrap();
    let source = rowsync::importer::SqliteQuerySource::new(
        Arc::new(std::sync::Mutex::new(conn)),
        "SELECT sku, state FROM feed",
        mapping,
    );
    let mut task = new_task(store(), ImportConfig::default()).add_source(Box::new(source));

    let err = task.run().unwrap_err();
    assert!(matches!(err, ImportError::SourceError { .. }));
    assert_eq!(task.store().find("A1").unwrap().field("status"), text("in"));
}
