//! Dedup filter and its lazy classification stream.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::OptOutFlag;
use crate::error::Result;
use crate::stats::{StatsSink, SKIPPED, STORED};
use crate::store::KeyStore;

use super::{request_key, timestamp_value, CrawlRequest, Fingerprinter, Output};

/// Suppresses already-seen requests and records pages that produced data
///
/// Borrows the store for its lifetime; the store itself is opened and
/// closed by whoever owns the crawl run.
pub struct DedupFilter<'s, F> {
    store: &'s mut KeyStore,
    fingerprinter: F,
    opt_out: OptOutFlag,
    stats: Option<Arc<dyn StatsSink>>,
}

impl<'s, F> DedupFilter<'s, F> {
    pub fn new(store: &'s mut KeyStore, fingerprinter: F) -> Self {
        Self {
            store,
            fingerprinter,
            opt_out: OptOutFlag::default(),
            stats: None,
        }
    }

    pub fn with_opt_out(mut self, opt_out: OptOutFlag) -> Self {
        self.opt_out = opt_out;
        self
    }

    pub fn with_stats(mut self, stats: Option<Arc<dyn StatsSink>>) -> Self {
        self.stats = stats;
        self
    }

    /// Classify the outputs produced while processing `origin`'s response
    ///
    /// Lazy: nothing is looked up or stored until the stream is pulled, and
    /// each item's side effects happen exactly once, in input order.
    pub fn classify<'a, R, T, O, I>(
        &'a mut self,
        origin: &'a R,
        outputs: I,
    ) -> Classify<'a, R, T, O, I::IntoIter, F>
    where
        R: CrawlRequest,
        F: Fingerprinter<R>,
        I: IntoIterator<Item = Output<R, T, O>>,
    {
        Classify::new(
            &mut *self.store,
            &self.fingerprinter,
            self.opt_out,
            self.stats.as_deref(),
            origin,
            outputs.into_iter(),
        )
    }

    /// The store this filter reads and writes
    pub fn store(&self) -> &KeyStore {
        self.store
    }
}

/// Lazy, single-pass, order-preserving stream returned by `classify`
///
/// A store failure is yielded as `Err` in place of the item that caused it.
pub struct Classify<'a, R, T, O, I, F> {
    store: &'a mut KeyStore,
    fingerprinter: &'a F,
    opt_out: OptOutFlag,
    stats: Option<&'a dyn StatsSink>,
    origin: &'a R,
    /// Computed on the first record, reused for the rest
    origin_key: Option<Vec<u8>>,
    outputs: I,
    _outputs: PhantomData<fn() -> (T, O)>,
}

impl<'a, R, T, O, I, F> Classify<'a, R, T, O, I, F>
where
    R: CrawlRequest,
    F: Fingerprinter<R>,
{
    pub(crate) fn new(
        store: &'a mut KeyStore,
        fingerprinter: &'a F,
        opt_out: OptOutFlag,
        stats: Option<&'a dyn StatsSink>,
        origin: &'a R,
        outputs: I,
    ) -> Self {
        Self {
            store,
            fingerprinter,
            opt_out,
            stats,
            origin,
            origin_key: None,
            outputs,
            _outputs: PhantomData,
        }
    }

    fn is_seen(&self, request: &R) -> Result<bool> {
        if self.opt_out.exempts(request.meta()) {
            return Ok(false);
        }
        let key = request_key(request, self.fingerprinter);
        let seen = self.store.contains(&key)?;
        if seen {
            info!(key = %String::from_utf8_lossy(&key), "Ignoring already visited request");
        }
        Ok(seen)
    }

    fn store_origin(&mut self) -> Result<()> {
        let (origin, fingerprinter) = (self.origin, self.fingerprinter);
        let key = self
            .origin_key
            .get_or_insert_with(|| request_key(origin, fingerprinter));
        self.store.put(key, &timestamp_value())?;
        debug!(key = %String::from_utf8_lossy(key), "Stored page key");
        Ok(())
    }

    fn inc(&self, counter: &str) {
        if let Some(stats) = self.stats {
            stats.inc_value(counter, 1);
        }
    }
}

impl<'a, R, T, O, I, F> Iterator for Classify<'a, R, T, O, I, F>
where
    R: CrawlRequest,
    F: Fingerprinter<R>,
    I: Iterator<Item = Output<R, T, O>>,
{
    type Item = Result<Output<R, T, O>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let output = self.outputs.next()?;
            return match output {
                Output::Request(request) => match self.is_seen(&request) {
                    Ok(true) => {
                        self.inc(SKIPPED);
                        continue;
                    }
                    Ok(false) => Some(Ok(Output::Request(request))),
                    Err(e) => Some(Err(e)),
                },
                Output::Record(record) => match self.store_origin() {
                    Ok(()) => {
                        self.inc(STORED);
                        Some(Ok(Output::Record(record)))
                    }
                    Err(e) => Some(Err(e)),
                },
                other => Some(Ok(other)),
            };
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.outputs.size_hint().1)
    }
}
