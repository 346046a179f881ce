use salesheet_tools::error::StoreError;
use salesheet_tools::io::store::{MemoryWorksheet, WriteMode, Worksheet};
use salesheet_tools::model::{Row, RowGroup};
use salesheet_tools::reconcile::{Reconciler, find_positions, reconcile};
use salesheet_tools::ToolError;

fn row(key: &str, value: &str) -> Row {
    vec![key.to_string(), value.to_string()]
}

fn group(key: &str, values: &[&str]) -> RowGroup {
    RowGroup::new(key, values.iter().map(|value| row(key, value)).collect())
}

fn sheet(rows: &[(&str, &str)]) -> MemoryWorksheet {
    let mut all = vec![row("Key", "Value")];
    all.extend(rows.iter().map(|(key, value)| row(key, value)));
    MemoryWorksheet::with_rows("Sheet1", all)
}

fn keys(sheet: &MemoryWorksheet) -> Vec<String> {
    sheet.rows().map(|row| row[0].clone()).collect()
}

#[test]
fn find_positions_is_one_based_and_exact() {
    let snapshot: Vec<String> = ["Key", "A", "B", "A", "AA"]
        .iter()
        .map(|value| value.to_string())
        .collect();
    assert_eq!(find_positions(&snapshot, "A"), vec![2, 4]);
    assert!(find_positions(&snapshot, "C").is_empty());
}

#[test]
fn replace_keeps_position_when_group_shrinks() {
    let mut rows: Vec<(&str, &str)> = (0..8).map(|_| ("F", "filler")).collect();
    rows.extend([("K", "old-1"), ("K", "old-2"), ("K", "old-3"), ("Z", "tail")]);
    let mut worksheet = sheet(&rows);
    assert_eq!(worksheet.row(10), Some(&row("K", "old-1")));
    assert_eq!(worksheet.row_count(), 13);

    let outcome =
        reconcile(&mut worksheet, 1, vec![group("K", &["new-1", "new-2"])]).expect("reconciled");

    assert_eq!(worksheet.row(10), Some(&row("K", "new-1")));
    assert_eq!(worksheet.row(11), Some(&row("K", "new-2")));
    assert_eq!(worksheet.row(12), Some(&row("Z", "tail")));
    assert_eq!(worksheet.row_count(), 12);
    assert_eq!(outcome.replaced_groups, 1);
    assert_eq!(outcome.replaced_rows_old, 3);
    assert_eq!(outcome.replaced_rows_new, 2);
    assert_eq!(outcome.appended_rows, 0);
    assert_eq!(outcome.net_rows(), -1);
    assert_eq!(outcome.snapshots, 1);
}

#[test]
fn scattered_occurrences_collapse_at_first_position() {
    let mut worksheet = sheet(&[("K", "a"), ("X", "x"), ("K", "b"), ("Y", "y")]);

    reconcile(&mut worksheet, 1, vec![group("K", &["new"])]).expect("reconciled");

    assert_eq!(keys(&worksheet), vec!["Key", "K", "X", "Y"]);
    assert_eq!(worksheet.row(2), Some(&row("K", "new")));
}

#[test]
fn new_keys_append_after_last_row_in_order() {
    let mut worksheet = sheet(&[("A", "a")]);

    let outcome = reconcile(
        &mut worksheet,
        1,
        vec![group("N1", &["1", "2"]), group("N2", &["3"])],
    )
    .expect("reconciled");

    assert_eq!(keys(&worksheet), vec!["Key", "A", "N1", "N1", "N2"]);
    assert_eq!(worksheet.row(3), Some(&row("N1", "1")));
    assert_eq!(worksheet.row(4), Some(&row("N1", "2")));
    assert_eq!(outcome.appended_groups, 2);
    assert_eq!(outcome.appended_rows, 3);
    assert!(outcome.any_change());
    assert!(
        worksheet.stored_rows()[2..]
            .iter()
            .all(|stored| stored.mode == WriteMode::UserEntered)
    );
}

#[test]
fn later_groups_see_positions_shifted_by_earlier_updates() {
    let mut worksheet = sheet(&[("B", "b1"), ("C", "c1"), ("D", "d1"), ("D", "d2")]);

    let outcome = reconcile(
        &mut worksheet,
        1,
        vec![
            group("B", &["b1'", "b2'", "b3'"]),
            group("N", &["n1"]),
            group("D", &["d1'"]),
        ],
    )
    .expect("reconciled");

    assert_eq!(keys(&worksheet), vec!["Key", "B", "B", "B", "C", "D", "N"]);
    assert_eq!(worksheet.row(5), Some(&row("C", "c1")));
    assert_eq!(worksheet.row(6), Some(&row("D", "d1'")));
    assert_eq!(outcome.snapshots, 2);
    assert_eq!(outcome.replaced_rows_old, 3);
    assert_eq!(outcome.replaced_rows_new, 4);
    assert_eq!(outcome.appended_rows, 1);
}

#[test]
fn duplicate_keys_in_batch_keep_last_rows() {
    let mut worksheet = sheet(&[("A", "a")]);

    let outcome = reconcile(
        &mut worksheet,
        1,
        vec![group("N", &["first"]), group("M", &["m"]), group("N", &["second"])],
    )
    .expect("reconciled");

    assert_eq!(keys(&worksheet), vec!["Key", "A", "N", "M"]);
    assert_eq!(worksheet.row(3), Some(&row("N", "second")));
    assert_eq!(outcome.groups, 2);
    assert_eq!(outcome.coalesced_groups, 1);
    assert_eq!(outcome.appended_rows, 2);
}

#[test]
fn unchanged_batch_is_idempotent() {
    let mut worksheet = sheet(&[("A", "a")]);
    let batch = vec![group("K", &["1", "2"]), group("L", &["3"])];

    reconcile(&mut worksheet, 1, batch.clone()).expect("first pass");
    let after_first: Vec<Row> = worksheet.rows().cloned().collect();
    let outcome = reconcile(&mut worksheet, 1, batch).expect("second pass");
    let after_second: Vec<Row> = worksheet.rows().cloned().collect();

    assert_eq!(after_first, after_second);
    assert_eq!(outcome.net_rows(), 0);
    assert_eq!(outcome.appended_rows, 0);
}

#[test]
fn key_column_is_configurable() {
    let mut worksheet = MemoryWorksheet::with_rows(
        "Orders",
        vec![
            vec!["h1".into(), "h2".into(), "Order".into()],
            vec!["x".into(), "y".into(), "SO-1".into()],
        ],
    );
    let replacement = RowGroup::new("SO-1", vec![vec!["x'".into(), "y'".into(), "SO-1".into()]]);

    let outcome = Reconciler::new(&mut worksheet, 3)
        .with_mode(WriteMode::Raw)
        .apply(vec![replacement])
        .expect("reconciled");

    assert_eq!(outcome.replaced_groups, 1);
    assert_eq!(worksheet.row(2).map(|row| row[0].as_str()), Some("x'"));
    assert_eq!(worksheet.stored_rows()[1].mode, WriteMode::Raw);
}

#[test]
fn invalid_key_column_is_a_read_error() {
    let mut worksheet = sheet(&[("A", "a")]);
    let error = reconcile(&mut worksheet, 0, vec![group("A", &["b"])]).expect_err("column 0");
    assert!(matches!(
        error,
        ToolError::StoreRead {
            source: StoreError::InvalidColumn(0),
            ..
        }
    ));
}

/// Worksheet whose inserts fail, to observe partial state.
struct FailingInserts {
    inner: MemoryWorksheet,
}

impl Worksheet for FailingInserts {
    fn title(&self) -> &str {
        self.inner.title()
    }

    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn read_column(&mut self, index: usize) -> Result<Vec<String>, StoreError> {
        self.inner.read_column(index)
    }

    fn delete_row(&mut self, position: usize) -> Result<(), StoreError> {
        self.inner.delete_row(position)
    }

    fn insert_rows(&mut self, _rows: &[Row], _position: usize, _mode: WriteMode) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".to_string()))
    }

    fn append_rows(&mut self, rows: &[Row], mode: WriteMode) -> Result<(), StoreError> {
        self.inner.append_rows(rows, mode)
    }
}

#[test]
fn store_failure_stops_batch_and_keeps_completed_mutations() {
    let mut worksheet = FailingInserts {
        inner: sheet(&[("K", "old-1"), ("K", "old-2"), ("L", "l")]),
    };

    let error = reconcile(
        &mut worksheet,
        1,
        vec![group("K", &["new"]), group("N", &["n"])],
    )
    .expect_err("insert fails");

    match error {
        ToolError::StoreWrite {
            worksheet: title,
            key,
            operation,
            ..
        } => {
            assert_eq!(title, "Sheet1");
            assert_eq!(key, "K");
            assert_eq!(operation, "insert_rows");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Deletions already issued stay applied; the pending append never ran.
    assert_eq!(keys(&worksheet.inner), vec!["Key", "L"]);
}
