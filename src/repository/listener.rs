use crate::aggregate::PendingEvent;
use crate::store::{Event, Header};

/// Observer told about every successful save.
///
/// Receives the new header, the persisted records and the domain values they
/// were encoded from, in the same order. Runs on the saving thread after the
/// append committed.
pub trait Listener: Send + Sync {
    fn saved(&self, header: &Header, events: &[Event], domain: &[PendingEvent]);
}

impl<F> Listener for F
where
    F: Fn(&Header, &[Event], &[PendingEvent]) + Send + Sync,
{
    fn saved(&self, header: &Header, events: &[Event], domain: &[PendingEvent]) {
        self(header, events, domain)
    }
}
