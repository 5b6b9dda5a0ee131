use crate::Sample;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Append-only sample logs, one per request group.
///
/// The set of groups is fixed when the store is created, so recording a sample only locks the log
/// for that sample's group. Virtual users appending to different groups never contend.
#[derive(Debug)]
pub struct MetricStore {
    order: Vec<Arc<str>>,
    groups: HashMap<Arc<str>, Mutex<Vec<Sample>>>,
}

impl MetricStore {
    pub fn new<I, S>(group_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut order = Vec::new();
        let mut groups = HashMap::new();
        for name in group_names {
            let name = name.into();
            if groups.insert(name.clone(), Mutex::new(Vec::new())).is_none() {
                order.push(name);
            }
        }

        Self { order, groups }
    }

    /// Append a sample to its group's log.
    ///
    /// Samples for groups the store was not created with are dropped with a warning.
    pub fn record(&self, sample: Sample) {
        match self.groups.get(&*sample.group) {
            Some(log) => log.lock().push(sample),
            None => log::warn!("Dropping sample for unknown group [{}]", sample.group),
        }
    }

    /// Group names in the order they were registered.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|name| &**name)
    }

    pub fn sample_count(&self) -> usize {
        self.groups.values().map(|log| log.lock().len()).sum()
    }

    /// Copy of the samples recorded so far for one group.
    ///
    /// Prefer [MetricStore::into_samples] once recording has finished, which does not copy.
    pub fn snapshot(&self, group: &str) -> Vec<Sample> {
        self.groups
            .get(group)
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    /// Consume the store once no more samples can be recorded, returning each group's samples in
    /// registration order.
    pub fn into_samples(self) -> Vec<(Arc<str>, Vec<Sample>)> {
        let mut groups = self.groups;
        self.order
            .into_iter()
            .map(|name| {
                let samples = groups
                    .remove(&name)
                    .map(Mutex::into_inner)
                    .unwrap_or_default();
                (name, samples)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationRecord;

    #[test]
    fn concurrent_appends_are_all_kept() {
        let store = Arc::new(MetricStore::new(["login", "contact"]));

        let handles = (0..8)
            .map(|vu_id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for iteration in 0..100 {
                        store.record(OperationRecord::new("login", vu_id, iteration).response(200, 200));
                        store.record(OperationRecord::new("contact", vu_id, iteration).response(200, 200));
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(1600, store.sample_count());
        assert_eq!(800, store.snapshot("login").len());

        let store = Arc::into_inner(store).unwrap();
        let samples = store.into_samples();
        assert_eq!("login", &*samples[0].0);
        assert_eq!("contact", &*samples[1].0);
        assert_eq!(800, samples[1].1.len());
    }

    #[test]
    fn unknown_groups_are_dropped() {
        let store = MetricStore::new(["login"]);
        store.record(OperationRecord::new("other", 0, 0).response(200, 200));

        assert_eq!(0, store.sample_count());
        assert!(store.snapshot("other").is_empty());
    }

    #[test]
    fn duplicate_names_registered_once() {
        let store = MetricStore::new(["login", "login", "contact"]);
        assert_eq!(vec!["login", "contact"], store.group_names().collect::<Vec<_>>());
    }

    #[test]
    fn into_samples_moves_the_recorded_samples() {
        let name: Arc<str> = Arc::from("login");
        let store = MetricStore::new([name.clone()]);
        store.record(OperationRecord::new(name.clone(), 0, 1).response(200, 200));
        store.record(OperationRecord::new(name.clone(), 0, 2).response(500, 200));

        let samples = store.into_samples();

        assert_eq!(1, samples.len());
        assert!(Arc::ptr_eq(&name, &samples[0].0));
        assert_eq!(vec![1, 2], samples[0].1.iter().map(|s| s.iteration).collect::<Vec<_>>());
        assert!(samples[0].1.iter().all(|s| Arc::ptr_eq(&name, &s.group)));
    }
}
