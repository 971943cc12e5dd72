//! Caps how much finished job history a cronjob keeps around.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use tracing::debug;

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

pub const MAX_HISTORY: i32 = 10;

/// (field name, value) of every history limit above [`MAX_HISTORY`].
pub fn excessive_limits(job: &CronJob) -> Vec<(&'static str, i32)> {
    let Some(spec) = job.spec.as_ref() else {
        return Vec::new();
    };
    [
        ("successfulJobsHistoryLimit", spec.successful_jobs_history_limit),
        ("failedJobsHistoryLimit", spec.failed_jobs_history_limit),
    ]
    .into_iter()
    .filter_map(|(field, limit)| limit.filter(|l| *l > MAX_HISTORY).map(|l| (field, l)))
    .collect()
}

pub struct CronJobHistoryLimits;

#[async_trait]
impl Handler<CronJob> for CronJobHistoryLimits {
    async fn handle(&self, _old: Option<&CronJob>, job: &CronJob, ctx: &Context) {
        let namespace = crate::namespace_of(&job.metadata);
        let name = job.metadata.name.as_deref().unwrap_or_default();
        debug!(namespace = %namespace, name = %name, "checking cronjob history limits");

        for (field, limit) in excessive_limits(job) {
            alertf!(
                ctx,
                job,
                "CronJob `{namespace}/{name}` {field} is too high: `{limit}`. Must be {MAX_HISTORY} or under."
            )
            .await;
        }
    }
}

pub fn rule() -> Rule {
    Rule::builder("cronjob-history-limits")
        .watch(wants::cronjobs(), CronJobHistoryLimits)
        .build()
}
