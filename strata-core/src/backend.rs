use crate::{
    AggregateAction, CountAction, CountResult, DeleteAction, DeleteResult, InsertAction,
    QueryAction, Record, Result, Session, UpdateAction,
};
use futures::stream::BoxStream;
use std::future::Future;

/// Finite, non-restartable stream of records produced by a read action.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// A backend-native unit of work spanning several executor calls.
///
/// `commit` and `rollback` leave the transaction usable for further
/// statements (backends with explicit scoping immediately begin a fresh
/// native transaction on the same session). `close` releases the native
/// session exactly once and may be called repeatedly.
pub trait Transaction: Send {
    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// One storage engine family executing the six canonical actions.
///
/// All operations take the caller's session (for the mandatory security
/// predicates) and an optional active transaction whose native session is
/// reused instead of opening a new one.
pub trait Backend: Send + Sync {
    type Transaction: Transaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;

    fn query(
        &self,
        action: QueryAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<RecordStream>> + Send;

    fn count(
        &self,
        action: CountAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<CountResult>> + Send;

    fn aggregate(
        &self,
        action: AggregateAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Returns the input records in order, each with its generated primary
    /// key assigned, or unchanged when it carried errors.
    fn insert(
        &self,
        action: InsertAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    fn update(
        &self,
        action: UpdateAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    fn delete(
        &self,
        action: DeleteAction,
        session: &Session,
        transaction: Option<&Self::Transaction>,
    ) -> impl Future<Output = Result<DeleteResult>> + Send;
}
