use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gale_core::prelude::{DelegatedShutdownListener, RequestMeta, ShutdownHandle, Transport};
use gale_instruments::MetricStore;

use crate::config::Pacing;
use crate::executor::Executor;
use crate::group::{IterationPlan, RequestGroup};

/// State shared by every virtual user of a run. Read-only apart from the metric store and the
/// count of active virtual users.
pub struct RunnerContext {
    executor: Arc<Executor>,
    transport: Arc<dyn Transport>,
    store: Arc<MetricStore>,
    setup: Vec<RequestGroup>,
    plan: IterationPlan,
    pacing: Pacing,
    stop_handle: ShutdownHandle,
    active_vus: AtomicUsize,
}

impl RunnerContext {
    pub(crate) fn new(
        executor: Arc<Executor>,
        transport: Arc<dyn Transport>,
        store: Arc<MetricStore>,
        setup: Vec<RequestGroup>,
        plan: IterationPlan,
        pacing: Pacing,
        stop_handle: ShutdownHandle,
    ) -> Self {
        Self {
            executor,
            transport,
            store,
            setup,
            plan,
            pacing,
            stop_handle,
            active_vus: AtomicUsize::new(0),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    /// Sent once by each virtual user before its first iteration.
    pub fn setup_groups(&self) -> &[RequestGroup] {
        &self.setup
    }

    pub fn plan(&self) -> &IterationPlan {
        &self.plan
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub(crate) fn stop_listener(&self) -> DelegatedShutdownListener {
        self.stop_handle.new_listener()
    }

    pub fn active_vus(&self) -> usize {
        self.active_vus.load(Ordering::Acquire)
    }

    pub(crate) fn set_active_vus(&self, count: usize) {
        self.active_vus.store(count, Ordering::Release);
    }
}

/// The state of a single virtual user.
pub struct VuContext {
    vu_id: usize,
    iteration: u64,
    runner_context: Arc<RunnerContext>,
    stop_listener: DelegatedShutdownListener,
    retire_listener: DelegatedShutdownListener,
}

impl VuContext {
    pub(crate) fn new(
        vu_id: usize,
        runner_context: Arc<RunnerContext>,
        retire_listener: DelegatedShutdownListener,
    ) -> Self {
        let stop_listener = runner_context.stop_listener();
        Self {
            vu_id,
            iteration: 0,
            runner_context,
            stop_listener,
            retire_listener,
        }
    }

    pub fn vu_id(&self) -> usize {
        self.vu_id
    }

    /// The current iteration, starting at 1 once the first iteration has begun.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub(crate) fn request_meta(&self) -> RequestMeta {
        RequestMeta {
            vu_id: self.vu_id,
            iteration: self.iteration,
            active_vus: self.runner_context.active_vus(),
        }
    }

    /// True once the run is stopping or this virtual user has been retired. The current
    /// iteration is allowed to finish, but no new one should start.
    pub fn should_stop(&self) -> bool {
        self.stop_listener.should_shutdown() || self.retire_listener.should_shutdown()
    }

    /// Sleep for the pacing interval. Returns false if the sleep was cut short.
    pub(crate) fn pace(&self) -> bool {
        let pause = self.runner_context.pacing().next(&mut rand::thread_rng());
        self.runner_context.executor().pause(
            pause,
            self.stop_listener.clone(),
            self.retire_listener.clone(),
        )
    }
}
