//! Paginated result materialization

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::{Cell, ColumnDescriptor, ResultSet, Row};
use crate::error::{AdminError, ClientError, Result};
use crate::metrics::RESULT_PAGES;
use crate::statement::{ResultPage, StatementClient, WireColumn};
use crate::types::StatementHandle;

/// Upper bound on pages fetched for one statement
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Accumulates result pages into a [`ResultSet`]
///
/// Pure: feeding the same pages in the same order always yields an equal
/// result set.
#[derive(Debug, Default)]
pub struct ResultSetBuilder {
    wire_columns: Option<Vec<WireColumn>>,
    descriptor: Option<Arc<ColumnDescriptor>>,
    rows: Vec<Row>,
    pages: usize,
    reported_total: Option<i64>,
}

impl ResultSetBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages accepted so far
    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Rows accepted so far
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append one page
    ///
    /// The first page that carries column metadata fixes the layout. Later
    /// pages may omit metadata but must not contradict it.
    pub fn push_page(&mut self, page: ResultPage) -> Result<()> {
        let page_number = self.pages + 1;

        if let Some(columns) = page.columns {
            match &self.wire_columns {
                None => {
                    self.descriptor = Some(Arc::new(ColumnDescriptor::from_wire(&columns)));
                    self.wire_columns = Some(columns);
                },
                Some(existing) if !same_layout(existing, &columns) => {
                    return Err(AdminError::materialization(format!(
                        "page {} changes the column layout",
                        page_number
                    )));
                },
                Some(_) => {},
            }
        }

        let descriptor = match &self.descriptor {
            Some(d) => Arc::clone(d),
            None if page.records.is_empty() => {
                self.pages += 1;
                self.reported_total = page.total_rows.or(self.reported_total);
                return Ok(());
            },
            None => {
                return Err(AdminError::materialization(format!(
                    "page {} has rows but no column metadata was received",
                    page_number
                )));
            },
        };

        self.rows.reserve(page.records.len());
        for record in page.records {
            let row_number = self.rows.len() + 1;
            if record.len() != descriptor.len() {
                return Err(AdminError::materialization(format!(
                    "row {} has {} cells, expected {}",
                    row_number,
                    record.len(),
                    descriptor.len()
                )));
            }

            let mut values = Vec::with_capacity(record.len());
            for (field, column) in record.into_iter().zip(descriptor.columns()) {
                let value = Cell::try_from(field)
                    .and_then(|cell| cell.decode(column))
                    .map_err(|e| {
                        let detail = match e {
                            AdminError::Materialization(m) => m,
                            other => other.to_string(),
                        };
                        AdminError::materialization(format!(
                            "row {}, column '{}': {}",
                            row_number, column.name, detail
                        ))
                    })?;
                values.push(value);
            }
            self.rows.push(Row::new(Arc::clone(&descriptor), values));
        }

        self.pages += 1;
        self.reported_total = page.total_rows.or(self.reported_total);
        Ok(())
    }

    /// Finish into a result set
    pub fn finish(self) -> ResultSet {
        ResultSet {
            columns: self
                .descriptor
                .unwrap_or_else(|| Arc::new(ColumnDescriptor::default())),
            rows: self.rows,
            reported_total: self.reported_total,
        }
    }
}

fn same_layout(a: &[WireColumn], b: &[WireColumn]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.name == y.name && x.type_name == y.type_name)
}

/// Follows continuation tokens until the result is exhausted
pub struct Materializer {
    client: Arc<dyn StatementClient>,
    max_pages: usize,
}

impl Materializer {
    /// Materializer over `client`
    pub fn new(client: Arc<dyn StatementClient>) -> Self {
        Self {
            client,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Limit the number of pages fetched per statement
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Fetch and decode every page of `handle`'s result
    ///
    /// A page is requested only after the previous one was decoded, so rows
    /// keep server order. A continuation token seen twice is an error.
    pub async fn materialize(&self, handle: &StatementHandle) -> Result<ResultSet> {
        let mut builder = ResultSetBuilder::new();
        let mut cursor: Option<String> = None;
        let mut seen_tokens: HashSet<String> = HashSet::new();

        loop {
            let mut page = self
                .client
                .fetch_result_page(handle, cursor.as_deref())
                .await
                .map_err(fetch_error)?;
            let next = page.next_token.take().filter(|t| !t.is_empty());

            builder.push_page(page)?;
            debug!(
                statement_id = %handle,
                page = builder.page_count(),
                rows = builder.row_count(),
                "Fetched result page"
            );

            let Some(token) = next else {
                break;
            };
            if !seen_tokens.insert(token.clone()) {
                return Err(AdminError::materialization(format!(
                    "continuation token repeated after page {}",
                    builder.page_count()
                )));
            }
            if builder.page_count() >= self.max_pages {
                return Err(AdminError::materialization(format!(
                    "result exceeds {} pages",
                    self.max_pages
                )));
            }
            cursor = Some(token);
        }

        RESULT_PAGES.observe(builder.page_count() as f64);
        Ok(builder.finish())
    }
}

fn fetch_error(err: ClientError) -> AdminError {
    match err {
        ClientError::Decode(message) => AdminError::Materialization(message),
        other => AdminError::StatementTransport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Value;
    use crate::statement::WireField;

    fn first_page() -> ResultPage {
        ResultPage::with_columns(
            vec![WireColumn::new("id", "int8"), WireColumn::new("cost", "numeric")],
            vec![
                vec![WireField::long(1), WireField::string("10.50")],
                vec![WireField::long(2), WireField::null()],
            ],
        )
        .next("t1")
    }

    #[test]
    fn test_builder_keeps_order_across_pages() {
        let mut builder = ResultSetBuilder::new();
        builder.push_page(first_page()).unwrap();
        builder
            .push_page(ResultPage::continuation(vec![vec![
                WireField::long(3),
                WireField::string("1"),
            ]]))
            .unwrap();
        let result = builder.finish();

        let ids: Vec<i64> = result
            .rows()
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(result.rows()[1].get("cost").unwrap().is_null());
    }

    #[test]
    fn test_builder_is_deterministic() {
        let build = || {
            let mut b = ResultSetBuilder::new();
            b.push_page(first_page()).unwrap();
            b.finish()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let mut builder = ResultSetBuilder::new();
        let page = ResultPage::with_columns(
            vec![WireColumn::new("a", "int4"), WireColumn::new("b", "int4")],
            vec![vec![WireField::long(1)]],
        );
        let err = builder.push_page(page).unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 cells, expected 2"));
    }

    #[test]
    fn test_rows_without_metadata_rejected() {
        let mut builder = ResultSetBuilder::new();
        let err = builder
            .push_page(ResultPage::continuation(vec![vec![WireField::long(1)]]))
            .unwrap_err();
        assert!(matches!(err, AdminError::Materialization(_)));
    }

    #[test]
    fn test_changed_layout_rejected() {
        let mut builder = ResultSetBuilder::new();
        builder.push_page(first_page()).unwrap();
        let conflicting = ResultPage::with_columns(
            vec![WireColumn::new("id", "varchar"), WireColumn::new("cost", "numeric")],
            vec![],
        );
        assert!(builder.push_page(conflicting).is_err());
    }

    #[test]
    fn test_repeated_metadata_accepted() {
        let mut builder = ResultSetBuilder::new();
        builder.push_page(first_page()).unwrap();
        let mut again = first_page();
        again.next_token = None;
        builder.push_page(again).unwrap();
        assert_eq!(builder.row_count(), 4);
    }

    #[test]
    fn test_bad_cell_reports_position() {
        let mut builder = ResultSetBuilder::new();
        let page = ResultPage::with_columns(
            vec![WireColumn::new("cost", "numeric")],
            vec![vec![WireField::string("12.0")], vec![WireField::string("abc")]],
        );
        let err = builder.push_page(page).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("row 2"));
        assert!(message.contains("cost"));
    }

    #[test]
    fn test_empty_first_page_without_metadata() {
        let mut builder = ResultSetBuilder::new();
        builder.push_page(ResultPage::default()).unwrap();
        let result = builder.finish();
        assert!(result.is_empty());
        assert!(result.columns().is_empty());
    }
}
