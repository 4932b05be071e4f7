use std::sync::Arc;

use apalis::cron::CronStream;
use apalis::prelude::*;
use apalis::utils::TokioExecutor;

use crate::{modules::wallet, types};

pub async fn monitor(ctx: Arc<types::Context>) -> Monitor<TokioExecutor> {
    let all_jobs = wallet::job::list(ctx);

    let mut monitor = Monitor::<TokioExecutor>::new();

    for job in all_jobs {
        let run = job.job.clone();
        let worker = WorkerBuilder::new("ewallet::wallet::reconciliation")
            .stream(CronStream::new(job.schedule).into_stream())
            .build_fn(move |_job: types::Job| {
                let run = run.clone();
                async move { run().await }
            });
        monitor = monitor.register_with_count(1, worker);
    }

    monitor
}
