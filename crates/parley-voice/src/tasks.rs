//! Background task runner for deferred agent requests.
//!
//! Tasks run one at a time in creation order, independent of the live
//! conversation. Each finished task is announced through the event emitter.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use parley_core::{
    AppEvent, AppEventEmitter, ChatPort, Task, TaskId, TaskStatus, truncate_for_log,
};

#[derive(Default)]
struct RunnerState {
    tasks: HashMap<TaskId, Task>,
    /// Creation order, for listing.
    order: Vec<TaskId>,
    queue: VecDeque<TaskId>,
    draining: bool,
}

struct RunnerInner {
    chat: Arc<dyn ChatPort>,
    emitter: Arc<dyn AppEventEmitter>,
    state: Mutex<RunnerState>,
}

/// Single-concurrency FIFO runner of agent invocations.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    pub fn new(chat: Arc<dyn ChatPort>, emitter: Arc<dyn AppEventEmitter>) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                chat,
                emitter,
                state: Mutex::new(RunnerState::default()),
            }),
        }
    }

    /// Queue `message` and return its id immediately.
    pub fn create_task(&self, message: &str) -> TaskId {
        let id = TaskId::new(format!("task-{}", Uuid::new_v4().simple()));
        let task = Task::pending(id.clone(), message);

        let start_worker = {
            let mut state = self.inner.state.lock();
            state.tasks.insert(id.clone(), task);
            state.order.push(id.clone());
            state.queue.push_back(id.clone());
            !std::mem::replace(&mut state.draining, true)
        };
        tracing::info!(task_id = %id, message = %truncate_for_log(message, 50), "Task created");

        if start_worker {
            tokio::spawn(Arc::clone(&self.inner).drain());
        }
        id
    }

    /// Cancel a task that has not started. Returns `false` once it is running
    /// or finished, or if the id is unknown.
    pub fn cancel_task(&self, id: &TaskId) -> bool {
        let mut state = self.inner.state.lock();
        let Some(task) = state.tasks.get_mut(id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            return false;
        }
        task.status = TaskStatus::Cancelled;
        task.completed_at = Some(Utc::now());
        state.queue.retain(|queued| queued != id);
        tracing::info!(task_id = %id, "Task cancelled");
        true
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.inner.state.lock().tasks.get(id).cloned()
    }

    /// Snapshot of every task, oldest first.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// Whether a task is running or waiting.
    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().draining
    }
}

impl RunnerInner {
    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock();
                let next_id = state.queue.pop_front();
                match next_id {
                    Some(id) => state.tasks.get_mut(&id).map(|task| {
                        task.status = TaskStatus::Running;
                        task.started_at = Some(Utc::now());
                        (id, task.message.clone())
                    }),
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            let Some((id, message)) = next else {
                continue;
            };

            tracing::info!(task_id = %id, "Task started");
            let outcome = self.chat.chat(&message, None).await;

            let event = {
                let mut state = self.state.lock();
                let Some(task) = state.tasks.get_mut(&id) else {
                    continue;
                };
                task.completed_at = Some(Utc::now());
                match outcome {
                    Ok(result) => {
                        task.status = TaskStatus::Completed;
                        task.result = Some(result.clone());
                        let duration = task.duration_ms().unwrap_or_default();
                        tracing::info!(task_id = %id, duration_ms = duration, "Task completed");
                        AppEvent::TaskCompleted {
                            task_id: id,
                            result,
                            duration,
                        }
                    }
                    Err(e) => {
                        let error = e.to_string();
                        task.status = TaskStatus::Failed;
                        task.error = Some(error.clone());
                        tracing::warn!(task_id = %id, %error, "Task failed");
                        AppEvent::TaskFailed { task_id: id, error }
                    }
                }
            };
            self.emitter.emit(event);
        }
    }
}
