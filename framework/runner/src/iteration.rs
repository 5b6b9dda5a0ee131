use gale_instruments::{OperationRecord, Sample};

use crate::context::VuContext;
use crate::group::RequestGroup;

/// Send each group's request in order, one at a time, recording a sample per request.
///
/// A failed check never ends the iteration early. The only thing that does is the graceful stop
/// budget running out, in which case the in-flight request is recorded as a timeout and no
/// further requests are sent.
pub fn run_iteration(groups: &[RequestGroup], ctx: &VuContext) -> Vec<Sample> {
    let runner_context = ctx.runner_context();
    let executor = runner_context.executor();
    let transport = runner_context.transport();

    let mut samples = Vec::with_capacity(groups.len());
    for group in groups {
        if executor.is_abandoned() {
            break;
        }

        let request = group.build_request(ctx.vu_id(), ctx.iteration());
        let meta = ctx.request_meta();
        let record = OperationRecord::new(group.name.clone(), ctx.vu_id(), ctx.iteration());

        let (sample, abandoned) = match executor.execute_in_place(transport.send(&request, meta)) {
            Ok(Ok(response)) => (record.response(response.status, group.expected_status), false),
            Ok(Err(e)) => {
                log::debug!("Request for group [{}] failed: {e}", group.name);
                (record.network_error(), false)
            }
            Err(_) => {
                log::debug!(
                    "Abandoned in-flight request for group [{}] on vu {}",
                    group.name,
                    ctx.vu_id()
                );
                (record.timed_out(), true)
            }
        };

        runner_context.store().record(sample.clone());
        samples.push(sample);

        if abandoned {
            break;
        }
    }

    samples
}

/// The loop of a single virtual user. Sends the setup groups once, as iteration 0, then runs
/// iterations until the run stops, the user is retired or in-flight work is abandoned.
pub(crate) fn run_virtual_user(mut ctx: VuContext) {
    log::debug!("Starting vu {}", ctx.vu_id());

    let runner_context = ctx.runner_context().clone();
    let mut rng = rand::thread_rng();

    if !runner_context.setup_groups().is_empty() && !ctx.should_stop() {
        let samples = run_iteration(runner_context.setup_groups(), &ctx);
        if samples.iter().any(|s| s.is_failure()) {
            log::debug!("vu {} had a failed check during setup", ctx.vu_id());
        }
    }

    loop {
        if ctx.should_stop() || runner_context.executor().is_abandoned() {
            break;
        }

        ctx.next_iteration();
        let groups = runner_context.plan().next_groups(&mut rng);
        let samples = run_iteration(groups, &ctx);
        if let Some(failed) = samples.iter().find(|s| s.is_failure()) {
            log::trace!(
                "vu {} iteration {} had a failed check on [{}]",
                ctx.vu_id(),
                ctx.iteration(),
                failed.group
            );
        }

        if !ctx.pace() {
            break;
        }
    }

    log::debug!("Stopping vu {} after {} iterations", ctx.vu_id(), ctx.iteration());
}
