//! Redis Key manager
//!
//! Every key is namespaced by topic. The layout is shared by all producers
//! and consumers of a topic and must not change.

/// Redis Key manager
#[derive(Debug, Clone)]
pub struct Keys;

impl Keys {
    /// Task id counter (String, INCR)
    /// Example: scheduleCounter_jobs
    pub fn counter(topic: &str) -> String {
        format!("scheduleCounter_{}", topic)
    }

    /// Due index (ZSet, member = task id, score = due timestamp)
    /// Example: sortedTasks_jobs
    pub fn due_index(topic: &str) -> String {
        format!("sortedTasks_{}", topic)
    }

    /// Serialized payload of one task (String)
    /// Example: jobs_task:42
    pub fn payload(topic: &str, task_id: &str) -> String {
        format!("{}_task:{}", topic, task_id)
    }
}
