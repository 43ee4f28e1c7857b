//! Polled timer queue: a plain list of pending callbacks ordered only by their
//! due time check. The host drives it by ticking; callbacks run synchronously
//! through the owning interpreter, at most once per elapsed task per tick.

use std::rc::Rc;
use std::time::{Duration, Instant};

use super::value::{FunctionValue, Value};

pub struct ScheduledTask {
    pub task_id: u32,
    pub due: Instant,
    pub callback: Rc<FunctionValue>,
    pub arguments: Vec<Value>,
}

#[derive(Default)]
pub struct EventLoop {
    tasks: Vec<ScheduledTask>,
    next_task_id: u32,
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_task_id: 1,
        }
    }

    /// Schedules `callback(arguments)` to run once `delay` has elapsed.
    pub fn set_timeout(
        &mut self,
        callback: Rc<FunctionValue>,
        delay: Duration,
        arguments: Vec<Value>,
    ) -> u32 {
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        self.tasks.push(ScheduledTask {
            task_id,
            due: Instant::now() + delay,
            callback,
            arguments,
        });
        task_id
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn cancel(&mut self, task_id: u32) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.task_id != task_id);
        self.tasks.len() != before
    }

    pub fn clear_all_tasks(&mut self) {
        self.tasks.clear();
        self.next_task_id = 1;
    }

    /// Removes and returns every task whose due time has elapsed.
    pub(super) fn take_due(&mut self, now: Instant) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.tasks.len() {
            if now >= self.tasks[index].due {
                due.push(self.tasks.remove(index));
            } else {
                index += 1;
            }
        }
        due
    }
}
