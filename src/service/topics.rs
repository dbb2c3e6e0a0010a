use serde::Serialize;

use crate::{
    catalog::{self, ProcessStep, Topic},
    error::{AppError, AppResult},
};

use super::session::Session;

#[derive(Debug, Clone, Serialize)]
pub struct StepProgress {
    #[serde(flatten)]
    pub step: ProcessStep,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
    pub steps: Vec<StepProgress>,
}

pub fn find_topic(slug: &str) -> AppResult<&'static Topic> {
    catalog::find(slug).ok_or_else(|| AppError::NotFound(format!("unknown topic: {slug}")))
}

/// Step states for `topic`; steps never touched in this session count as not completed.
pub fn progress(session: &Session, topic: &Topic) -> ProgressReport {
    let recorded = session.progress.get(topic.slug);
    let steps: Vec<StepProgress> = topic
        .steps
        .iter()
        .map(|step| StepProgress {
            step: *step,
            completed: recorded
                .and_then(|states| states.get(step.name))
                .copied()
                .unwrap_or(false),
        })
        .collect();

    let completed = steps.iter().filter(|step| step.completed).count();
    let total = steps.len();

    ProgressReport {
        completed,
        total,
        percent: percent(completed, total),
        steps,
    }
}

pub fn set_step(
    session: &mut Session,
    topic: &Topic,
    step_name: &str,
    completed: bool,
) -> AppResult<ProgressReport> {
    let step = topic
        .step(step_name)
        .ok_or_else(|| AppError::BadRequest(format!("unknown step: {step_name}")))?;

    session
        .progress
        .entry(topic.slug.to_string())
        .or_default()
        .insert(step.name.to_string(), completed);

    Ok(progress(session, topic))
}

/// Floored percentage; zero when there is nothing to complete.
pub fn percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed * 100 / total) as u32
}
