use std::marker::PhantomData;
use std::time::Duration;

use harvester_core::{Connection, PageInfo};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::request::Requester;
use crate::transport::GraphqlRequest;
use crate::{FailureKind, HarvestEvent, RequestFailure};

/// Name of the cursor variable every paginated query declares.
pub const CURSOR_VARIABLE: &str = "cursor";

#[derive(Debug, Clone, PartialEq)]
pub struct Page<N> {
    /// 1-based position within the walk.
    pub number: usize,
    pub nodes: Vec<N>,
    pub page_info: PageInfo,
}

/// Single-pass walk over one cursor-paginated connection.
///
/// Pages are requested one at a time from [`PaginationWalker::next_page`]; the
/// next request is only issued when the caller asks for it. The cursor lives
/// only as long as the walker, so an interrupted walk restarts from page one.
pub struct PaginationWalker<'r, 'a, N> {
    requester: &'r Requester<'a>,
    item: String,
    query: String,
    variables: Map<String, Value>,
    connection: String,
    cap: Option<usize>,
    page_pause: Duration,
    cursor: Option<String>,
    pages: usize,
    yielded: usize,
    finished: bool,
    _nodes: PhantomData<fn() -> N>,
}

impl<'r, 'a, N: DeserializeOwned> PaginationWalker<'r, 'a, N> {
    /// `connection` is a JSON pointer into `data`, e.g. `/repository/pullRequests`.
    pub fn new(
        requester: &'r Requester<'a>,
        item: impl Into<String>,
        query: impl Into<String>,
        variables: Map<String, Value>,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            requester,
            item: item.into(),
            query: query.into(),
            variables,
            connection: connection.into(),
            cap: None,
            page_pause: Duration::ZERO,
            cursor: None,
            pages: 0,
            yielded: 0,
            finished: false,
            _nodes: PhantomData,
        }
    }

    /// Stop once this many nodes have been yielded; the last page is truncated.
    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_page_pause(mut self, page_pause: Duration) -> Self {
        self.page_pause = page_pause;
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn cap_reached(&self) -> bool {
        self.cap.is_some_and(|cap| self.yielded >= cap)
    }

    /// The next page, `None` once the walk is over. A failure is yielded once and ends the walk.
    pub async fn next_page(&mut self) -> Option<Result<Page<N>, RequestFailure>> {
        if self.finished || self.cap_reached() {
            self.finished = true;
            return None;
        }
        if self.pages > 0 {
            self.requester.pause(&self.item, self.page_pause).await;
        }

        let result = self.fetch().await;
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }

    async fn fetch(&mut self) -> Result<Page<N>, RequestFailure> {
        let mut variables = self.variables.clone();
        variables.insert(
            CURSOR_VARIABLE.to_string(),
            self.cursor.clone().map(Value::String).unwrap_or(Value::Null),
        );
        let request = GraphqlRequest::new(self.query.clone(), Value::Object(variables));
        let data = self.requester.execute(&self.item, &request).await?;

        let raw = data
            .pointer(&self.connection)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| {
                RequestFailure::new(
                    FailureKind::UnexpectedShape,
                    format!("no connection at {}", self.connection),
                )
            })?;
        let connection: Connection<N> = serde_json::from_value(raw)
            .map_err(|err| RequestFailure::new(FailureKind::UnexpectedShape, err.to_string()))?;
        let (page_info, mut nodes) = connection.into_nodes();

        if let Some(cap) = self.cap {
            nodes.truncate(cap.saturating_sub(self.yielded));
        }
        self.pages += 1;
        self.yielded += nodes.len();

        match page_info.next_cursor() {
            Some(cursor) if !self.cap_reached() => self.cursor = Some(cursor.to_string()),
            _ => self.finished = true,
        }

        self.requester.progress().emit(HarvestEvent::PageFetched {
            item: self.item.clone(),
            page: self.pages,
            nodes: nodes.len(),
        });

        Ok(Page {
            number: self.pages,
            nodes,
            page_info,
        })
    }
}
