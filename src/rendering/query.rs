//! Occlusion queries (WebGL 2.0 only).
//!
//! A query wraps a group of draws in a render pass and answers whether any of their samples
//! passed the depth test. WebGL only makes the answer available some time after the draws were
//! issued, so results are delivered through a [QueryResult] future that completes once a later
//! submission (or [RenderDevice::poll]) finds the result available.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use fnv::FnvHashMap;
use futures::channel::oneshot::{channel, Receiver, Sender};
use futures::FutureExt;
use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::{Backend, RenderDevice};
use crate::util::resource_id;

resource_id!(
    /// Identifies an occlusion query registered with a [RenderDevice].
    QueryId
);

/// The result of an occlusion query: `Some(1)` if any sample passed, `Some(0)` if none did.
///
/// Yields `None` if the query was destroyed (or the context lost) before its result arrived.
pub enum QueryResult {
    Ready(Option<u32>),
    Pending(Receiver<u32>),
}

impl Future for QueryResult {
    type Output = Option<u32>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        match &mut *self {
            QueryResult::Ready(result) => Poll::Ready(result.take()),
            QueryResult::Pending(receiver) => receiver.poll_unpin(cx).map(|result| result.ok()),
        }
    }
}

impl From<Receiver<u32>> for QueryResult {
    fn from(receiver: Receiver<u32>) -> Self {
        QueryResult::Pending(receiver)
    }
}

enum QueryState<B>
where
    B: Backend,
{
    Idle,
    Querying(B::Query),
    PendingResult { query: B::Query, submission: u64 },
    Resolved,
}

struct QueryEntry<B>
where
    B: Backend,
{
    state: QueryState<B>,
    result: Option<u32>,
    waiters: Vec<Sender<u32>>,
}

impl<B> QueryEntry<B>
where
    B: Backend,
{
    fn query(&self) -> Option<&B::Query> {
        match &self.state {
            QueryState::Querying(query) | QueryState::PendingResult { query, .. } => Some(query),
            _ => None,
        }
    }
}

pub(crate) struct QueryScheduler<B>
where
    B: Backend,
{
    queries: FnvHashMap<u64, QueryEntry<B>>,
}

impl<B> QueryScheduler<B>
where
    B: Backend,
{
    pub(crate) fn new() -> Self {
        QueryScheduler {
            queries: FnvHashMap::default(),
        }
    }

    fn insert(&mut self, index: u64) {
        self.queries.insert(
            index,
            QueryEntry {
                state: QueryState::Idle,
                result: None,
                waiters: Vec::new(),
            },
        );
    }

    /// Drops the query; its pending waiters are dropped with it, so their futures yield `None`.
    fn remove(&mut self, gl: &B, index: u64) {
        if let Some(entry) = self.queries.remove(&index) {
            if let Some(query) = entry.query() {
                gl.delete_query(query);
            }
        }
    }

    /// Starts counting samples for the query. Returns `false` if the query cannot be issued,
    /// in which case the wrapped draws run untracked.
    fn begin(&mut self, gl: &B, index: u64) -> bool {
        if !gl.version().is_webgl2() {
            log::error!("Occlusion queries require WebGL 2.0; drawing without the query.");

            return false;
        }

        let entry = match self.queries.get_mut(&index) {
            Some(entry) => entry,
            None => {
                log::error!("Occlusion query {} has been destroyed.", index);

                return false;
            }
        };

        match &entry.state {
            QueryState::Querying(_) => {
                log::error!("Occlusion query {} is already active.", index);

                return false;
            }
            QueryState::PendingResult { query, .. } => {
                log::debug!(
                    "Occlusion query {} reissued before its result arrived.",
                    index
                );

                gl.delete_query(query);
            }
            _ => (),
        }

        match gl.create_query() {
            Some(query) => {
                gl.begin_query(Gl::ANY_SAMPLES_PASSED, &query);

                entry.state = QueryState::Querying(query);

                true
            }
            None => {
                log::error!("Failed to create a query object.");

                entry.state = QueryState::Idle;

                false
            }
        }
    }

    fn end(&mut self, gl: &B, index: u64, submission: u64) {
        if let Some(entry) = self.queries.get_mut(&index) {
            if let QueryState::Querying(_) = entry.state {
                gl.end_query(Gl::ANY_SAMPLES_PASSED);

                if let QueryState::Querying(query) =
                    std::mem::replace(&mut entry.state, QueryState::Idle)
                {
                    entry.state = QueryState::PendingResult { query, submission };
                }
            }
        }
    }

    /// Collects the results of queries issued before `submission_count` that have become
    /// available.
    pub(crate) fn poll(&mut self, gl: &B, submission_count: u64) {
        for (index, entry) in self.queries.iter_mut() {
            let query = match &entry.state {
                QueryState::PendingResult { query, submission } if *submission < submission_count => {
                    query
                }
                _ => continue,
            };

            if !gl.query_result_available(query) {
                continue;
            }

            let result = gl.query_result(query);

            gl.delete_query(query);

            log::trace!("Occlusion query {} resolved to {}.", index, result);

            entry.state = QueryState::Resolved;
            entry.result = Some(result);

            for waiter in entry.waiters.drain(..) {
                // The receiver may have been dropped; nobody is waiting then.
                let _ = waiter.send(result);
            }
        }
    }

    fn resolve(&mut self, index: u64) -> QueryResult {
        match self.queries.get_mut(&index) {
            Some(QueryEntry {
                state: QueryState::Resolved,
                result,
                ..
            }) => QueryResult::Ready(*result),
            Some(entry) => {
                let (sender, receiver) = channel();

                entry.waiters.push(sender);

                receiver.into()
            }
            None => QueryResult::Ready(None),
        }
    }

    fn result(&self, index: u64) -> Option<u32> {
        self.queries.get(&index).and_then(|entry| entry.result)
    }

    pub(crate) fn clear(&mut self, gl: &B) {
        for (_, entry) in self.queries.drain() {
            if let Some(query) = entry.query() {
                gl.delete_query(query);
            }
        }
    }

    /// Drops every GL query without deleting it; pending waiters are dropped too.
    pub(crate) fn forget(&mut self) {
        for entry in self.queries.values_mut() {
            if entry.query().is_some() {
                entry.state = QueryState::Idle;
            }

            entry.waiters.clear();
        }
    }
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_query(&mut self) -> QueryId {
        let index = self.next_index();

        self.queries.insert(index);

        QueryId::new(self.id, index)
    }

    /// Destroys the query. Futures still waiting for its result yield `None`.
    pub fn destroy_query(&mut self, id: QueryId) {
        if self.owns(id.context, "query") {
            self.queries.remove(&self.gl, id.index);
        }
    }

    /// Returns a future for the next result of the query.
    ///
    /// If the query has resolved and was not issued again since, the future is ready
    /// immediately with the stored result. Otherwise it completes when a later submission finds
    /// the result of the query's current (or next) issue available. The result never becomes
    /// available during the submission that issued the query.
    pub fn resolve_query(&mut self, id: QueryId) -> QueryResult {
        if !self.owns(id.context, "query") {
            return QueryResult::Ready(None);
        }

        self.queries.resolve(id.index)
    }

    /// The most recent result of the query, if it ever resolved.
    pub fn occlusion_query_result(&self, id: QueryId) -> Option<u32> {
        if id.context != self.id {
            return None;
        }

        self.queries.result(id.index)
    }

    pub(crate) fn begin_occlusion_query(&mut self, id: QueryId) -> bool {
        self.owns(id.context, "query") && self.queries.begin(&self.gl, id.index)
    }

    pub(crate) fn end_occlusion_query(&mut self, id: QueryId) {
        let submission = self.submission_count();

        self.queries.end(&self.gl, id.index, submission);
    }
}
