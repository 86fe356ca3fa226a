//! Simulated training jobs and fixed evaluation metrics

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{ConfusionMatrix, JobStatus, ModelMetrics, TrainingJob};

/// Hold-out confusion matrix of the deployed model
pub const CONFUSION: ConfusionMatrix = ConfusionMatrix {
    tp: 85,
    fp: 12,
    tn: 890,
    fn_: 13,
};

pub fn model_metrics() -> ModelMetrics {
    let plots = [
        ("pr_png", "/api/models/latest/plots/pr_curve.png"),
        ("calib_png", "/api/models/latest/plots/calibration.png"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    ModelMetrics {
        pr_auc: 0.892,
        mcc: 0.756,
        ece: 0.067,
        confusion: CONFUSION,
        plots,
    }
}

/// accuracy / precision / recall / f1 derived from [`CONFUSION`]
pub fn training_metrics() -> BTreeMap<String, f64> {
    let ConfusionMatrix { tp, fp, tn, fn_ } = CONFUSION;
    let (tp, fp, tn, fn_) = (tp as f64, fp as f64, tn as f64, fn_ as f64);

    let accuracy = (tp + tn) / (tp + fp + tn + fn_);
    let precision = tp / (tp + fp);
    let recall = tp / (tp + fn_);
    let f1 = 2.0 * precision * recall / (precision + recall);

    [
        ("accuracy", accuracy),
        ("precision", precision),
        ("recall", recall),
        ("f1", f1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[derive(Debug, Clone)]
struct JobRecord {
    dataset_id: String,
    created_at: DateTime<Utc>,
}

/// Jobs kept before the oldest is evicted
pub const MAX_JOBS: usize = 1024;

/// In-memory job table; progress is a function of elapsed time
#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    duration: Duration,
    capacity: usize,
}

impl JobRegistry {
    pub fn new(duration_secs: u64) -> Self {
        Self::with_capacity(duration_secs, MAX_JOBS)
    }

    pub fn with_capacity(duration_secs: u64, capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            duration: Duration::seconds(duration_secs.min(i64::MAX as u64) as i64),
            capacity: capacity.max(1),
        }
    }

    pub fn start(&self, dataset_id: &str) -> String {
        let job_id = Uuid::new_v4().to_string();
        let mut jobs = self.jobs.write();

        while jobs.len() >= self.capacity {
            let oldest = jobs
                .iter()
                .min_by_key(|(_, record)| record.created_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    jobs.remove(&id);
                    tracing::debug!("Evicted training job {}", id);
                }
                None => break,
            }
        }

        jobs.insert(
            job_id.clone(),
            JobRecord {
                dataset_id: dataset_id.to_string(),
                created_at: Utc::now(),
            },
        );
        drop(jobs);
        tracing::info!("Training job {} started for dataset {}", job_id, dataset_id);
        job_id
    }

    pub fn status(&self, job_id: &str) -> Option<TrainingJob> {
        let record = self.jobs.read().get(job_id).cloned()?;
        Some(self.snapshot(job_id, &record, Utc::now()))
    }

    fn snapshot(&self, job_id: &str, record: &JobRecord, now: DateTime<Utc>) -> TrainingJob {
        let elapsed = (now - record.created_at).num_milliseconds().max(0);
        let total = self.duration.num_milliseconds();
        let progress = if total <= 0 {
            100
        } else {
            (elapsed.saturating_mul(100) / total).min(100) as u8
        };

        let (status, message) = match progress {
            0 => (JobStatus::Pending, format!("Queued (dataset {})", record.dataset_id)),
            100 => (JobStatus::Completed, "Training completed".to_string()),
            _ => (JobStatus::Running, format!("Training in progress ({}%)", progress)),
        };

        let completed_at = (status == JobStatus::Completed).then(|| record.created_at + self.duration);

        TrainingJob {
            job_id: job_id.to_string(),
            status,
            progress,
            message: Some(message),
            created_at: record.created_at,
            updated_at: completed_at.unwrap_or(now),
            completed_at,
            metrics: completed_at.map(|_| training_metrics()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(created_at: DateTime<Utc>) -> JobRecord {
        JobRecord {
            dataset_id: "d1".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_progress_over_time() {
        let registry = JobRegistry::new(40);
        let t0 = Utc::now();
        let r = record(t0);

        let job = registry.snapshot("j", &r, t0);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);

        let job = registry.snapshot("j", &r, t0 + Duration::seconds(10));
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 25);
        assert!(job.metrics.is_none());

        let job = registry.snapshot("j", &r, t0 + Duration::seconds(90));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.completed_at, Some(t0 + Duration::seconds(40)));
        assert!(job.metrics.as_ref().unwrap().contains_key("f1"));
    }

    #[test]
    fn test_unknown_job() {
        let registry = JobRegistry::new(45);
        assert!(registry.status("nope").is_none());
        let id = registry.start("dataset");
        assert_eq!(registry.status(&id).unwrap().job_id, id);
    }

    #[test]
    fn test_oldest_job_evicted_at_capacity() {
        let registry = JobRegistry::with_capacity(45, 2);
        let first = registry.start("a");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = registry.start("b");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = registry.start("c");

        assert!(registry.status(&first).is_none());
        assert!(registry.status(&second).is_some());
        assert!(registry.status(&third).is_some());
        assert_eq!(registry.jobs.read().len(), 2);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let registry = JobRegistry::new(0);
        let id = registry.start("dataset");
        assert_eq!(registry.status(&id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_metrics_from_confusion() {
        let m = training_metrics();
        assert!((m["accuracy"] - 0.975).abs() < 1e-9);
        assert!((m["precision"] - 85.0 / 97.0).abs() < 1e-9);
        assert_eq!(model_metrics().confusion, CONFUSION);
    }
}
