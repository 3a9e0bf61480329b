// tests/store_test.rs — Integration test: schema reconciliation and record uniqueness

use pretty_assertions::assert_eq;
use rusqlite::Connection;

use psalm_pairs::pairs::PairKey;
use psalm_pairs::store::schema::{self, SCHEMA_VERSION};
use psalm_pairs::store::store::{NewArgument, NewEvaluation};
use psalm_pairs::store::Database;
use psalm_pairs::usage::UsageTokens;

/// An early store layout: no usage, rubric or audit columns at all.
fn create_v1_store(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE pair_arguments (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             psalm_x INTEGER NOT NULL,
             psalm_y INTEGER NOT NULL,
             prompt TEXT NOT NULL,
             response_text TEXT NOT NULL,
             response_json TEXT NOT NULL,
             model TEXT NOT NULL,
             created_at TEXT NOT NULL,
             UNIQUE (psalm_x, psalm_y)
         );
         CREATE TABLE pair_evaluations (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             pair_id INTEGER NOT NULL,
             score REAL NOT NULL,
             justification TEXT NOT NULL,
             evaluator_model TEXT NOT NULL,
             evaluation_json TEXT NOT NULL,
             created_at TEXT NOT NULL,
             FOREIGN KEY(pair_id) REFERENCES pair_arguments(id) ON DELETE CASCADE
         );
         INSERT INTO pair_arguments
             (psalm_x, psalm_y, prompt, response_text, response_json, model, created_at)
         VALUES
             (1, 2, 'prompt', 'Psalm 2 answers Psalm 1.',
              '{\"usage\":{\"input_tokens\":10,\"output_tokens\":20,\"output_tokens_details\":{\"reasoning_tokens\":5}}}',
              'gpt-5', '2025-09-01T10:00:00Z');
         INSERT INTO pair_evaluations
             (pair_id, score, justification, evaluator_model, evaluation_json, created_at)
         VALUES
             (1, 4.0, 'One shared motif.', 'gpt-5', '{}', '2025-09-02T10:00:00Z');",
    )
    .unwrap();
}

/// The layout the first release wrote: at most one evaluation per argument.
fn create_single_evaluation_store(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE pair_arguments (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             psalm_x INTEGER NOT NULL,
             psalm_y INTEGER NOT NULL,
             prompt TEXT NOT NULL,
             response_text TEXT NOT NULL,
             response_json TEXT NOT NULL,
             model TEXT NOT NULL,
             created_at TEXT NOT NULL,
             UNIQUE (psalm_x, psalm_y)
         );
         CREATE TABLE pair_evaluations (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             pair_id INTEGER NOT NULL,
             score REAL NOT NULL,
             justification TEXT NOT NULL,
             evaluator_model TEXT NOT NULL,
             evaluation_json TEXT NOT NULL,
             created_at TEXT NOT NULL,
             FOREIGN KEY(pair_id) REFERENCES pair_arguments(id) ON DELETE CASCADE,
             UNIQUE (pair_id)
         );
         INSERT INTO pair_arguments
             (psalm_x, psalm_y, prompt, response_text, response_json, model, created_at)
         VALUES (1, 2, 'prompt', 'text', '{}', 'gpt-5', '2025-09-01T10:00:00Z');
         INSERT INTO pair_evaluations
             (pair_id, score, justification, evaluator_model, evaluation_json, created_at)
         VALUES (1, 4.0, 'ok', 'gpt-5', '{}', '2025-09-02T10:00:00Z');",
    )
    .unwrap();
}

fn argument(pair: PairKey) -> NewArgument<'static> {
    NewArgument {
        pair,
        prompt: "prompt",
        response_text: "argument text",
        response_json: "{}",
        model: "gpt-5",
        usage: UsageTokens {
            total: Some(100),
            reasoning: Some(40),
            non_reasoning: Some(60),
        },
    }
}

fn evaluation(argument_id: i64, version: u32, score: f64) -> NewEvaluation<'static> {
    NewEvaluation {
        argument_id,
        evaluator_version: version,
        evaluator_model: "gpt-5",
        score,
        justification: "ok",
        checks_json: "{}",
        flags_json: "[]",
        vocabulary_specificity: 3.0,
        key_order: "justification,checks,vocabulary_specificity,score",
        evaluation_json: "{}",
        usage: UsageTokens::default(),
    }
}

#[test]
fn test_old_store_is_reconciled_without_losing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("psalm_pairs.sqlite3");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    create_v1_store(&path);

    let db = Database::open(&path).unwrap();
    assert_eq!(db.reconcile.version_before, 0);
    assert_eq!(db.reconcile.version_after, SCHEMA_VERSION);
    assert_eq!(db.reconcile.added.len(), 11);

    let columns = schema::table_columns(db.store.conn(), "pair_evaluations").unwrap();
    for expected in ["evaluator_version", "checks_json", "flags_json", "key_order"] {
        assert!(columns.iter().any(|c| c == expected), "{expected}");
    }

    let arguments = db.store.all_arguments().unwrap();
    assert_eq!(arguments.len(), 1);
    assert_eq!(arguments[0].response_text, "Psalm 2 answers Psalm 1.");
    // Usage columns were added empty; nothing is invented for old rows
    assert_eq!(arguments[0].usage, UsageTokens::default());

    let evaluations = db.store.all_evaluations().unwrap();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].evaluator_version, 1);
    assert_eq!(evaluations[0].checks_json, None);
    assert_eq!(evaluations[0].key_order, None);
}

#[test]
fn test_reopening_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");
    create_v1_store(&path);

    let first = Database::open(&path).unwrap();
    assert!(!first.reconcile.added.is_empty());
    drop(first);

    let second = Database::open(&path).unwrap();
    assert!(second.reconcile.added.is_empty());
    assert_eq!(second.reconcile.version_before, SCHEMA_VERSION);
    assert_eq!(second.store.counts().unwrap().generated, 1);
}

#[test]
fn test_legacy_evaluations_count_as_first_rubric() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");
    create_v1_store(&path);
    let db = Database::open(&path).unwrap();

    assert!(db.store.pending_evaluations(10, 1).unwrap().is_empty());
    let pending = db.store.pending_evaluations(10, 2).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].pair, PairKey::new(1, 2).unwrap());

    // A v2 record coexists with the legacy one
    let id = db.store.insert_evaluation(&evaluation(pending[0].id, 2, 6.0)).unwrap();
    assert!(id.is_some());
    let by_version = db.store.scores_by_version().unwrap();
    assert_eq!(by_version.get(&1), Some(&vec![4.0]));
    assert_eq!(by_version.get(&2), Some(&vec![6.0]));
    assert_eq!(db.store.evaluations_for_argument(pending[0].id).unwrap().len(), 2);
}

#[test]
fn test_one_argument_per_pair() {
    let db = Database::in_memory().unwrap();
    let pair = PairKey::new(3, 7).unwrap();

    let first = db.store.insert_pair_argument(&argument(pair)).unwrap();
    let second = db.store.insert_pair_argument(&argument(pair)).unwrap();
    assert!(first.is_some());
    assert_eq!(second, None);

    let stored = db.store.argument_for_pair(pair).unwrap().unwrap();
    assert_eq!(stored.usage.total, Some(100));
    assert!(db.store.existing_pairs().unwrap().contains(&pair));
    assert_eq!(db.store.argument_for_pair(PairKey::new(7, 3).unwrap()).unwrap().map(|a| a.id), None);
}

#[test]
fn test_one_evaluation_per_argument_and_version() {
    let db = Database::in_memory().unwrap();
    let id = db
        .store
        .insert_pair_argument(&argument(PairKey::new(1, 2).unwrap()))
        .unwrap()
        .unwrap();

    assert!(db.store.insert_evaluation(&evaluation(id, 2, 5.0)).unwrap().is_some());
    assert_eq!(db.store.insert_evaluation(&evaluation(id, 2, 9.0)).unwrap(), None);
    assert!(db.store.insert_evaluation(&evaluation(id, 3, 7.0)).unwrap().is_some());

    let rows = db.store.evaluations_for_argument(id).unwrap();
    let scores: Vec<(u32, f64)> = rows.iter().map(|r| (r.evaluator_version, r.score)).collect();
    assert_eq!(scores, vec![(2, 5.0), (3, 7.0)]);
    assert_eq!(db.store.counts().unwrap().evaluated, 1);
}

#[test]
fn test_deleting_evaluations_reopens_pending_work() {
    let db = Database::in_memory().unwrap();
    let pair = PairKey::new(2, 1).unwrap();
    let id = db.store.insert_pair_argument(&argument(pair)).unwrap().unwrap();
    db.store.insert_evaluation(&evaluation(id, 2, 5.0)).unwrap();
    assert!(db.store.pending_evaluations(10, 2).unwrap().is_empty());

    assert_eq!(db.store.delete_evaluations_for_pair(pair).unwrap(), 1);
    assert_eq!(db.store.pending_evaluations(10, 2).unwrap().len(), 1);
}

#[test]
fn test_recent_arguments_newest_first() {
    let db = Database::in_memory().unwrap();
    for (x, y) in [(1, 2), (1, 3), (1, 4)] {
        db.store
            .insert_pair_argument(&argument(PairKey::new(x, y).unwrap()))
            .unwrap();
    }
    let recent: Vec<u16> = db
        .store
        .recent_arguments(2)
        .unwrap()
        .iter()
        .map(|a| a.pair.target())
        .collect();
    assert_eq!(recent, vec![4, 3]);

    let progress = db.store.daily_progress().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].generated_count, 3);
    assert_eq!(progress[0].evaluated_count, 0);
}

#[test]
fn test_single_evaluation_store_is_refused_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");
    create_single_evaluation_store(&path);

    let err = Database::open(&path).err().expect("open should fail");
    assert!(err.is_fatal());
    let message = err.to_string();
    assert!(message.contains("pair_evaluations"), "{message}");
    assert!(message.contains("UNIQUE constraint on pair_id alone"), "{message}");

    // The refused store keeps its original shape and rows
    let conn = Connection::open(&path).unwrap();
    let columns = schema::table_columns(&conn, "pair_evaluations").unwrap();
    assert!(!columns.iter().any(|c| c == "evaluator_version"));
    assert_eq!(schema::user_version(&conn).unwrap(), 0);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM pair_evaluations", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}
