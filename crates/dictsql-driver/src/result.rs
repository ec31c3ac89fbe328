//! The result-cursor surface a query returns. Mirrors `sql_result_next_row`
//! / `sql_result_more` / `sql_result_get_field_value{,_binary}`.

/// Outcome of asking a cursor for its next row or its next batch.
#[derive(Debug)]
pub enum RowOutcome {
    /// A row is available; call `ResultCursor::row` to read it.
    Row,
    /// The current batch is exhausted but the backend may have more once
    /// asked (`sql_result_more`); the caller must call `more`/`more_async`.
    More,
    /// No more rows, full stop.
    Done,
    Error(String),
}

/// One fetched row. Columns are addressed positionally, matching the SELECT
/// list order the compiler emitted.
pub trait ResultRow {
    fn field_count(&self) -> usize;
    /// Text form of column `idx`, or `None` for SQL NULL.
    fn get_text(&self, idx: usize) -> Option<&str>;
    /// Raw bytes of column `idx` (used for `HEXBLOB` columns), or `None`
    /// for SQL NULL.
    fn get_binary(&self, idx: usize) -> Option<&[u8]>;
}

pub trait ResultCursor {
    fn next_row(&mut self) -> RowOutcome;
    /// Synchronously fetch the next batch when `next_row` returned `More`.
    fn more(&mut self) -> RowOutcome;
    /// Asynchronously fetch the next batch; the callback receives the
    /// outcome of the fetch (`Row`/`Done`/`Error`, never `More` again until
    /// the caller asks).
    fn more_async(&mut self, callback: Box<dyn FnOnce(RowOutcome)>);
    /// The row last yielded by `next_row`/`more` returning `Row`.
    fn row(&self) -> &dyn ResultRow;
}
